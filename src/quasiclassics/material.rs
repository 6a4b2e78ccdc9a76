//! Material layers: parameters, the (energy × position) state grid and the
//! observables derived from it.
use super::boundary::Interface;
use super::diffusion::DiffusionTerms;
use super::errors::{QResult, QuasiclassicsError};
use super::propagator::Propagator;
use super::spin_matrix::{C64, SpinMatrix};
use super::spin_orbit::SpinOrbit;
use super::superconductor::Superconductor;
use nalgebra::{DMatrix, Scalar};
use strum_macros::Display;

#[derive(Debug, Clone, PartialEq, Display)]
pub enum MaterialKind {
    Conductor,
    Superconductor(Superconductor),
    /// exchange field vector, same units as the energies
    Ferromagnet { exchange: [f64; 3] },
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    pub thouless: f64,
    /// inelastic broadening, the imaginary part of the energy
    pub scattering: f64,
    pub depairing: f64,
    pub spinflip: f64,
    pub spinorbit_scattering: f64,
    pub spin_orbit: Option<SpinOrbit>,
    pub energies: Vec<f64>,
    /// normalized positions in [0, 1]
    pub positions: Vec<f64>,
    /// state grid, energies along rows and positions along columns
    pub states: DMatrix<Propagator>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub interface_left: Interface,
    pub interface_right: Interface,
}

impl Material {
    pub fn new(name: &str, kind: MaterialKind, energies: Vec<f64>, positions: Vec<f64>) -> Self {
        let states = DMatrix::from_element(energies.len(), positions.len(), Propagator::normal());
        let mut material = Material {
            name: name.to_string(),
            kind,
            thouless: 1.0,
            scattering: 0.01,
            depairing: 0.0,
            spinflip: 0.0,
            spinorbit_scattering: 0.0,
            spin_orbit: None,
            energies,
            positions,
            states,
            left: None,
            right: None,
            interface_left: Interface::Vacuum,
            interface_right: Interface::Vacuum,
        };
        material.reset_states();
        material
    }

    pub fn conductor(name: &str, energies: Vec<f64>, positions: Vec<f64>) -> Self {
        Material::new(name, MaterialKind::Conductor, energies, positions)
    }

    pub fn superconductor(name: &str, energies: Vec<f64>, positions: Vec<f64>, sc: Superconductor) -> Self {
        Material::new(name, MaterialKind::Superconductor(sc), energies, positions)
    }

    pub fn ferromagnet(name: &str, energies: Vec<f64>, positions: Vec<f64>, exchange: [f64; 3]) -> Self {
        Material::new(name, MaterialKind::Ferromagnet { exchange }, energies, positions)
    }

    /// Normal state everywhere, BCS states for superconductors.
    pub fn reset_states(&mut self) {
        let (ne, np) = (self.energies.len(), self.positions.len());
        self.states = match &self.kind {
            MaterialKind::Superconductor(sc) => DMatrix::from_fn(ne, np, |i, j| {
                sc.initial_state(C64::new(self.energies[i], self.scattering), self.positions[j])
            }),
            _ => DMatrix::from_element(ne, np, Propagator::normal()),
        };
    }

    /// (ε + i·scattering) / thouless for energy index `i`
    pub fn complex_energy(&self, i: usize) -> C64 {
        C64::new(self.energies[i], self.scattering) / self.thouless
    }

    pub fn superconductor_params(&self) -> Option<&Superconductor> {
        match &self.kind {
            MaterialKind::Superconductor(sc) => Some(sc),
            _ => None,
        }
    }

    /// Diffusion-equation terms normalized to the Thouless energy.
    pub fn diffusion_terms(&self) -> DiffusionTerms {
        let scale = 1.0 / self.thouless;
        let (gap, exchange) = match &self.kind {
            MaterialKind::Conductor => (None, None),
            MaterialKind::Superconductor(sc) => (Some(sc.gap.scaled(scale)), None),
            MaterialKind::Ferromagnet { exchange } => (None, Some(SpinMatrix::pauli_vector(*exchange) * scale)),
        };
        DiffusionTerms {
            gap,
            spin_orbit: self.spin_orbit.clone(),
            exchange,
            spinflip: self.spinflip * scale,
            spinorbit_scattering: self.spinorbit_scattering * scale,
            depairing: self.depairing * scale,
        }
    }

    pub fn validate(&self) -> QResult<()> {
        let err = |msg: String| Err(QuasiclassicsError::config(format!("material '{}': {}", self.name, msg)));
        if !(self.thouless > 0.0 && self.thouless.is_finite()) {
            return err(format!("thouless energy must be positive, got {}", self.thouless));
        }
        for (label, value) in [
            ("scattering", self.scattering),
            ("depairing", self.depairing),
            ("spinflip", self.spinflip),
            ("spinorbit_scattering", self.spinorbit_scattering),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return err(format!("{} must be non-negative, got {}", label, value));
            }
        }
        if self.energies.is_empty() || !self.energies.iter().all(|e| e.is_finite()) {
            return err("energy mesh must be non-empty and finite".to_string());
        }
        if self.positions.len() < 2 {
            return err("at least two positions are required".to_string());
        }
        if !self.positions.windows(2).all(|w| w[1] > w[0]) {
            return err("positions must be strictly increasing".to_string());
        }
        if self.positions[0] < 0.0 || self.positions[self.positions.len() - 1] > 1.0 {
            return err("positions must lie in [0, 1]".to_string());
        }
        if self.states.shape() != (self.energies.len(), self.positions.len()) {
            return err(format!(
                "state grid has shape {:?}, expected ({}, {})",
                self.states.shape(),
                self.energies.len(),
                self.positions.len()
            ));
        }
        for interface in [&self.interface_left, &self.interface_right] {
            validate_interface(interface).or_else(err)?;
        }
        match &self.kind {
            MaterialKind::Superconductor(sc) => {
                sc.validate()?;
                if sc.gap.values.len() != self.positions.len() {
                    return err("gap profile must be sampled on the material positions".to_string());
                }
            }
            MaterialKind::Ferromagnet { exchange } => {
                if !exchange.iter().all(|h| h.is_finite()) {
                    return err("exchange field must be finite".to_string());
                }
            }
            MaterialKind::Conductor => {}
        }
        Ok(())
    }

    /// state at the left edge (z = 0) for energy index `i`
    pub fn left_edge(&self, i: usize) -> Propagator {
        self.states[(i, 0)]
    }

    /// state at the right edge (z = 1) for energy index `i`
    pub fn right_edge(&self, i: usize) -> Propagator {
        self.states[(i, self.positions.len() - 1)]
    }

    fn map_states<T: Scalar>(&self, f: impl Fn(&Propagator) -> QResult<T>) -> QResult<DMatrix<T>> {
        let data = self.states.iter().map(f).collect::<QResult<Vec<T>>>()?;
        Ok(DMatrix::from_vec(self.states.nrows(), self.states.ncols(), data))
    }

    pub fn density_of_states(&self) -> QResult<DMatrix<f64>> {
        self.map_states(|p| p.density())
    }

    /// spin-up and spin-down densities of states
    pub fn density_of_states_spin(&self) -> QResult<[DMatrix<f64>; 2]> {
        Ok([
            self.map_states(|p| Ok(p.density_spin()?[0]))?,
            self.map_states(|p| Ok(p.density_spin()?[1]))?,
        ])
    }

    /// singlet pair amplitudes
    pub fn correlations(&self) -> QResult<DMatrix<C64>> {
        self.map_states(|p| p.correlation())
    }

    /// charge, spin x/y/z, heat, spin-heat x/y/z spectral currents
    pub fn currents(&self) -> QResult<Vec<DMatrix<f64>>> {
        let so = self.spin_orbit.as_ref();
        let all = self.map_states(|p| p.current(so))?;
        Ok(split_components(&all))
    }

    pub fn accumulations(&self) -> QResult<Vec<DMatrix<f64>>> {
        let all = self.map_states(|p| p.accumulation())?;
        Ok(split_components(&all))
    }
}

fn split_components(all: &DMatrix<[f64; 8]>) -> Vec<DMatrix<f64>> {
    (0..8).map(|k| all.map(|v| v[k])).collect()
}

fn validate_interface(interface: &Interface) -> Result<(), String> {
    match interface {
        Interface::Tunneling { conductance } if !(*conductance > 0.0) => {
            Err(format!("tunneling conductance must be positive, got {}", conductance))
        }
        Interface::SpinActive(sa) => {
            if !(sa.conductance > 0.0) {
                return Err(format!("spin-active conductance must be positive, got {}", sa.conductance));
            }
            if !(sa.polarization.abs() <= 1.0) {
                return Err(format!("polarization must lie in [-1, 1], got {}", sa.polarization));
            }
            for axis in std::iter::once(sa.magnetization).chain(sa.misalignment) {
                let norm = axis.iter().map(|x| x * x).sum::<f64>().sqrt();
                if (norm - 1.0).abs() > 1e-6 {
                    return Err(format!("interface axis {:?} is not a unit vector", axis));
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quasiclassics::spin_active::SpinActiveInterface;
    use approx::assert_relative_eq;

    fn mesh(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 / (n - 1) as f64).collect()
    }

    #[test]
    fn conductor_starts_normal() {
        let m = Material::conductor("N", vec![0.1, 0.5, 1.0], mesh(5));
        assert_eq!(m.states.shape(), (3, 5));
        let dos = m.density_of_states().unwrap();
        assert!(dos.iter().all(|d| (*d - 1.0).abs() < 1e-15));
        assert!(m.validate().is_ok());
        assert_eq!(m.kind.to_string(), "Conductor");
    }

    #[test]
    fn superconductor_starts_in_bcs_state() {
        let positions = mesh(4);
        let sc = Superconductor::new(&positions, C64::new(1.0, 0.0), 0.0, 30.0);
        let m = Material::superconductor("S", vec![0.0, 3.0], positions, sc);
        let dos = m.density_of_states().unwrap();
        assert!(dos.row(0).iter().all(|d| *d < 0.02));
        assert_relative_eq!(dos[(1, 2)], 3.0 / 8f64.sqrt(), epsilon = 1e-3);
        assert!(m.correlations().unwrap()[(1, 0)].norm() > 0.3);
    }

    #[test]
    fn diffusion_terms_are_normalized() {
        let positions = mesh(3);
        let mut m = Material::ferromagnet("F", vec![0.5], positions, [0.0, 0.0, 2.0]);
        m.thouless = 4.0;
        m.spinflip = 0.8;
        m.depairing = 0.4;
        let terms = m.diffusion_terms();
        assert_eq!(terms.exchange, Some(SpinMatrix::pauli_vector([0.0, 0.0, 0.5])));
        assert_relative_eq!(terms.spinflip, 0.2);
        assert_relative_eq!(terms.depairing, 0.1);
        assert!(terms.gap.is_none());
        assert_eq!(m.complex_energy(0), C64::new(0.125, 0.0025));
    }

    #[test]
    fn observables_have_eight_components() {
        let m = Material::conductor("N", vec![0.1, 0.2], mesh(3));
        let currents = m.currents().unwrap();
        let accumulations = m.accumulations().unwrap();
        assert_eq!(currents.len(), 8);
        assert!(currents.iter().all(|c| c.iter().all(|v| *v == 0.0)));
        assert_relative_eq!(accumulations[0][(0, 0)], 1.0, epsilon = 1e-15);
        let [up, down] = m.density_of_states_spin().unwrap();
        assert_eq!(up, down);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut m = Material::conductor("N", vec![0.1], mesh(3));
        m.thouless = 0.0;
        assert!(matches!(m.validate(), Err(QuasiclassicsError::Configuration(_))));

        let mut m = Material::conductor("N", vec![0.1], vec![0.0, 0.7, 0.5]);
        assert!(m.validate().is_err());
        m.positions = mesh(3);
        m.interface_right = Interface::Tunneling { conductance: -1.0 };
        assert!(m.validate().is_err());
        m.interface_right = Interface::SpinActive(SpinActiveInterface::new(1.0, 1.5, 0.0, [0.0, 0.0, 1.0]));
        assert!(m.validate().is_err());
        m.interface_right = Interface::SpinActive(SpinActiveInterface::new(1.0, 0.5, 0.0, [0.0, 2.0, 0.0]));
        assert!(m.validate().is_err());
        m.interface_right = Interface::SpinActive(SpinActiveInterface::new(1.0, 0.5, 0.0, [0.0, 1.0, 0.0]));
        assert!(m.validate().is_ok());
    }
}
