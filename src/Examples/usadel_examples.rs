use crate::Utils::config::linspace;
use crate::Utils::logger::log_statistics;
use crate::numerical::BVP_collocation::BVP_mirk_api::{CollocationOrder, SolverSettings};
use crate::numerical::BVP_collocation::BVP_mirk_faer::CollocationSolver;
use crate::quasiclassics::boundary::Interface;
use crate::quasiclassics::errors::QResult;
use crate::quasiclassics::material::Material;
use crate::quasiclassics::spin_active::SpinActiveInterface;
use crate::quasiclassics::spin_matrix::C64;
use crate::quasiclassics::spin_orbit::SpinOrbit;
use crate::quasiclassics::stack::Stack;
use crate::quasiclassics::superconductor::Superconductor;
use log::info;

pub fn usadel_examples(example: usize) -> QResult<Stack> {
    let settings = SolverSettings::default();
    let mut stack = Stack::new();
    let (max_passes, threshold) = match example {
        0 => {
            // single normal metal, vacuum on both sides: flat density of states
            let mut n = Material::conductor("N", linspace(1e-6, 3.0, 50), linspace(0.0, 1.0, 50));
            n.thouless = 1.0;
            n.scattering = 0.01;
            stack.push(n);
            (1, 1e-6)
        }
        1 => {
            // SN bilayer through a tunneling interface, self-consistent gap
            let energies = linspace(1e-6, 30.0, 300);
            let positions = linspace(0.0, 1.0, 30);
            let sc = Superconductor::new(&positions, C64::new(1.0, 0.0), 0.01, 30.0);
            let mut s = Material::superconductor("S", energies.clone(), positions.clone(), sc);
            s.thouless = 0.5;
            s.scattering = 0.02;
            let mut n = Material::conductor("N", energies, positions);
            n.scattering = 0.02;
            let s = stack.push(s);
            let n = stack.push(n);
            stack.link(s, n, Interface::Tunneling { conductance: 0.3 })?;
            (10, 1e-4)
        }
        2 => {
            // superconductor / ferromagnet with a spin-active interface
            let energies = linspace(1e-6, 3.0, 60);
            let positions = linspace(0.0, 1.0, 30);
            let sc = Superconductor::new(&positions, C64::new(1.0, 0.0), 0.0, 30.0);
            let s = stack.push(Material::superconductor("S", energies.clone(), positions.clone(), sc));
            let mut f = Material::ferromagnet("F", energies, positions, [0.0, 0.0, 0.5]);
            f.spinflip = 0.01;
            let f = stack.push(f);
            let mut interface = SpinActiveInterface::new(0.3, 0.3, 0.5, [0.0, 0.0, 1.0]);
            interface.misalignment = Some([1.0, 0.0, 0.0]);
            stack.link(s, f, Interface::SpinActive(interface))?;
            (1, 1e-6)
        }
        3 => {
            // ferromagnetic Rashba wire proximitized by a superconductor
            let energies = linspace(1e-6, 3.0, 40);
            let positions = linspace(0.0, 1.0, 40);
            let sc = Superconductor::new(&positions, C64::new(1.0, 0.0), 0.0, 30.0);
            let s = stack.push(Material::superconductor("S", energies.clone(), positions.clone(), sc));
            let mut w = Material::ferromagnet("W", energies, positions, [0.3, 0.0, 0.0]);
            w.spin_orbit = Some(SpinOrbit::rashba_wire(1.0, 0.0));
            let w = stack.push(w);
            stack.link(s, w, Interface::Tunneling { conductance: 0.5 })?;
            (1, 1e-6)
        }
        _ => {
            info!("no example {}, running the normal metal", example);
            return usadel_examples(0);
        }
    };
    let settings = if example == 1 {
        SolverSettings {
            order: CollocationOrder::Fourth,
            tolerance: 1e-5,
            ..settings
        }
    } else {
        settings
    };
    let passes = stack.converge(&CollocationSolver, &settings, max_passes, threshold)?;
    let mut stats = vec![("passes".to_string(), passes.to_string())];
    stats.extend(summarize(&stack)?);
    log_statistics(&format!("EXAMPLE {}", example), &stats);
    Ok(stack)
}

/// min/mean density of states per material and the largest gap
pub fn summarize(stack: &Stack) -> QResult<Vec<(String, String)>> {
    let mut stats = Vec::new();
    for material in &stack.materials {
        let dos = material.density_of_states()?;
        stats.push((format!("{} kind", material.name), material.kind.to_string()));
        stats.push((format!("{} min DOS", material.name), format!("{:.6}", dos.min())));
        stats.push((format!("{} mean DOS", material.name), format!("{:.6}", dos.mean())));
        if let Some(sc) = material.superconductor_params() {
            stats.push((format!("{} max |gap|", material.name), format!("{:.6}", sc.gap.max_abs())));
        }
    }
    Ok(stats)
}
