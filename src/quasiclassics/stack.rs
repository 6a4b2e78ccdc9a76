//! A chain of material layers and the passes that solve it.
//!
//! Materials live in an arena and refer to their neighbors by index. One
//! pass solves every material once, left to right, each against a snapshot
//! of its neighbors' current edge states, and updates superconducting gaps
//! afterwards. Passes are repeated until nothing changes anymore.
use super::boundary::Interface;
use super::bvp_driver::{self, NeighborSnapshot};
use super::errors::{QResult, QuasiclassicsError};
use super::material::{Material, MaterialKind};
use crate::numerical::BVP_collocation::BVP_mirk_api::{BvpSolver, SolverSettings};
use log::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct Stack {
    pub materials: Vec<Material>,
}

impl Stack {
    pub fn new() -> Self {
        Stack::default()
    }

    /// add a material and return its index
    pub fn push(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// connect `left` (its right edge) to `right` (its left edge) through `interface`
    pub fn link(&mut self, left: usize, right: usize, interface: Interface) -> QResult<()> {
        self.link_sides(left, right, interface.clone(), interface)
    }

    /// connect with possibly different interface parameters on the two sides
    pub fn link_sides(&mut self, left: usize, right: usize, left_side: Interface, right_side: Interface) -> QResult<()> {
        let n = self.materials.len();
        if left >= n || right >= n || left == right {
            return Err(QuasiclassicsError::config(format!(
                "cannot link materials {} and {} in a stack of {}",
                left, right, n
            )));
        }
        self.materials[left].right = Some(right);
        self.materials[left].interface_right = left_side;
        self.materials[right].left = Some(left);
        self.materials[right].interface_left = right_side;
        Ok(())
    }

    pub fn validate(&self) -> QResult<()> {
        let n = self.materials.len();
        if n == 0 {
            return Err(QuasiclassicsError::config("stack contains no materials"));
        }
        for (k, material) in self.materials.iter().enumerate() {
            material.validate()?;
            if let Some(r) = material.right {
                let neighbor = self.materials.get(r).ok_or_else(|| {
                    QuasiclassicsError::config(format!("material '{}' links to missing index {}", material.name, r))
                })?;
                if neighbor.left != Some(k) {
                    return Err(QuasiclassicsError::config(format!(
                        "link between '{}' and '{}' is not symmetric",
                        material.name, neighbor.name
                    )));
                }
                if neighbor.energies != material.energies {
                    return Err(QuasiclassicsError::config(format!(
                        "'{}' and '{}' use different energy meshes",
                        material.name, neighbor.name
                    )));
                }
            }
            if let Some(l) = material.left {
                let neighbor = self.materials.get(l).ok_or_else(|| {
                    QuasiclassicsError::config(format!("material '{}' links to missing index {}", material.name, l))
                })?;
                if neighbor.right != Some(k) {
                    return Err(QuasiclassicsError::config(format!(
                        "link between '{}' and '{}' is not symmetric",
                        neighbor.name, material.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// material indices in chain order, leftmost chain first
    pub fn chain_order(&self) -> Vec<usize> {
        let n = self.materials.len();
        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let heads = (0..n).filter(|&k| self.materials[k].left.is_none());
        for start in heads.chain(0..n) {
            let mut current = Some(start);
            while let Some(k) = current {
                if k >= n || visited[k] {
                    break;
                }
                visited[k] = true;
                order.push(k);
                current = self.materials[k].right;
            }
        }
        order
    }

    pub fn snapshot(&self, k: usize) -> NeighborSnapshot {
        let material = &self.materials[k];
        NeighborSnapshot::from_neighbors(
            material.left.and_then(|l| self.materials.get(l)),
            material.right.and_then(|r| self.materials.get(r)),
        )
    }

    /// one BVP sweep over the energies of material `k`
    pub fn solve_material<S: BvpSolver + Sync + ?Sized>(&mut self, k: usize, solver: &S, settings: &SolverSettings) -> QResult<()> {
        if k >= self.materials.len() {
            return Err(QuasiclassicsError::config(format!("no material with index {}", k)));
        }
        let snapshot = self.snapshot(k);
        bvp_driver::solve_material(solver, &mut self.materials[k], &snapshot, settings)
    }

    /// One pass over all materials; returns the largest change of the density of
    /// states or of a superconducting gap.
    pub fn update<S: BvpSolver + Sync + ?Sized>(&mut self, solver: &S, settings: &SolverSettings) -> QResult<f64> {
        let mut delta: f64 = 0.0;
        for k in self.chain_order() {
            let before = self.materials[k].density_of_states()?;
            self.solve_material(k, solver, settings)?;
            let after = self.materials[k].density_of_states()?;
            delta = delta.max((after - before).amax());

            let Material {
                kind,
                energies,
                states,
                ..
            } = &mut self.materials[k];
            if let MaterialKind::Superconductor(sc) = kind {
                delta = delta.max(sc.update_gap(energies, states)?);
            }
        }
        Ok(delta)
    }

    /// Repeat `update` until the change drops below `threshold`; returns the number of passes.
    pub fn converge<S: BvpSolver + Sync + ?Sized>(
        &mut self,
        solver: &S,
        settings: &SolverSettings,
        max_passes: usize,
        threshold: f64,
    ) -> QResult<usize> {
        self.validate()?;
        for pass in 1..=max_passes {
            let delta = self.update(solver, settings)?;
            info!("pass {}: max change {:.3e}", pass, delta);
            if delta < threshold {
                return Ok(pass);
            }
        }
        warn!("stack did not settle within {} passes", max_passes);
        Ok(max_passes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::BVP_collocation::BVP_mirk_faer::CollocationSolver;
    use crate::quasiclassics::spin_matrix::C64;
    use crate::quasiclassics::superconductor::Superconductor;

    fn mesh(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 / (n - 1) as f64).collect()
    }

    #[test]
    fn link_is_symmetric() {
        let mut stack = Stack::new();
        let a = stack.push(Material::conductor("A", vec![0.1], mesh(3)));
        let b = stack.push(Material::conductor("B", vec![0.1], mesh(3)));
        stack.link(a, b, Interface::Tunneling { conductance: 0.5 }).unwrap();
        assert_eq!(stack.materials[a].right, Some(b));
        assert_eq!(stack.materials[b].left, Some(a));
        assert_eq!(stack.materials[b].interface_left, Interface::Tunneling { conductance: 0.5 });
        assert!(stack.validate().is_ok());
        assert!(stack.link(a, 7, Interface::Transparent).is_err());
    }

    #[test]
    fn broken_links_are_rejected() {
        let mut stack = Stack::new();
        let a = stack.push(Material::conductor("A", vec![0.1], mesh(3)));
        let b = stack.push(Material::conductor("B", vec![0.1, 0.2], mesh(3)));
        stack.link(a, b, Interface::Transparent).unwrap();
        // different energy meshes
        assert!(stack.validate().is_err());
        stack.materials[b].energies = vec![0.1];
        stack.materials[b].reset_states();
        stack.materials[b].left = None;
        assert!(stack.validate().is_err());
        assert!(Stack::new().validate().is_err());
    }

    #[test]
    fn chain_order_follows_links() {
        let mut stack = Stack::new();
        let c = stack.push(Material::conductor("C", vec![0.1], mesh(3)));
        let a = stack.push(Material::conductor("A", vec![0.1], mesh(3)));
        let b = stack.push(Material::conductor("B", vec![0.1], mesh(3)));
        let lone = stack.push(Material::conductor("D", vec![0.1], mesh(3)));
        stack.link(a, b, Interface::Transparent).unwrap();
        stack.link(b, c, Interface::Transparent).unwrap();
        assert_eq!(stack.chain_order(), vec![a, b, c, lone]);
    }

    #[test]
    fn normal_bilayer_converges_in_one_pass() {
        let energies = vec![0.1, 1.0];
        let mut stack = Stack::new();
        let a = stack.push(Material::conductor("A", energies.clone(), mesh(10)));
        let b = stack.push(Material::conductor("B", energies, mesh(10)));
        stack.link(a, b, Interface::Tunneling { conductance: 0.3 }).unwrap();
        let passes = stack
            .converge(&CollocationSolver, &SolverSettings::default(), 5, 1e-8)
            .unwrap();
        assert_eq!(passes, 1);
    }

    #[test]
    fn bulk_superconductor_keeps_its_gap() {
        let positions = mesh(5);
        let cutoff = 10.0;
        let energies: Vec<f64> = (0..400).map(|i| cutoff * i as f64 / 399.0).collect();
        let sc = Superconductor::new(&positions, C64::new(1.0, 0.0), 0.0, cutoff);
        let mut material = Material::superconductor("S", energies, positions, sc);
        material.scattering = 0.05;
        let mut stack = Stack::new();
        let s = stack.push(material);
        let settings = SolverSettings {
            max_refinement: 4,
            ..SolverSettings::default()
        };
        stack.update(&CollocationSolver, &settings).unwrap();
        let gap = &stack.materials[s].superconductor_params().unwrap().gap;
        for value in &gap.values {
            assert!((value.norm() - 1.0).abs() < 0.1, "|Δ| = {}", value.norm());
        }
    }
}
