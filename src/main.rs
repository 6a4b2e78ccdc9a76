#![allow(non_snake_case)]
use RustedUsadel::Examples::usadel_examples::{summarize, usadel_examples};
use RustedUsadel::Utils::config::{RunConfig, load_config};
use RustedUsadel::Utils::logger::{init_logger, log_statistics, save_observable_csv};
use RustedUsadel::numerical::BVP_collocation::BVP_mirk_faer::CollocationSolver;
use RustedUsadel::quasiclassics::errors::{QResult, QuasiclassicsError};
use log::{error, info};
use std::env;

/// usage: `RustedUsadel <config.toml>` or `RustedUsadel <example number>`
fn main() {
    let arg = env::args().nth(1).unwrap_or_else(|| "1".to_string());
    let result = match arg.parse::<usize>() {
        Ok(example) => init_logger("info").and_then(|_| usadel_examples(example).map(|_| ())),
        Err(_) => run_config(&arg),
    };
    if let Err(e) = result {
        error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_config(path: &str) -> QResult<()> {
    let RunConfig {
        settings,
        max_passes,
        threshold,
        mut stack,
        output,
    } = load_config(path)?;
    init_logger(&output.log_level)?;
    info!("loaded {} materials from {}", stack.materials.len(), path);

    let passes = stack.converge(&CollocationSolver, &settings, max_passes, threshold)?;
    let mut stats = vec![("passes".to_string(), passes.to_string())];
    stats.extend(summarize(&stack)?);
    log_statistics("RUN STATISTICS", &stats);

    if let Some(prefix) = &output.csv_prefix {
        for material in &stack.materials {
            let mut observables = vec![("dos".to_string(), material.density_of_states()?)];
            let names = ["charge", "spin_x", "spin_y", "spin_z", "heat", "spinheat_x", "spinheat_y", "spinheat_z"];
            for (name, current) in names.iter().zip(material.currents()?) {
                observables.push((format!("current_{}", name), current));
            }
            for (name, matrix) in observables {
                let filename = format!("{}_{}_{}.csv", prefix, material.name, name);
                save_observable_csv(&matrix, &material.energies, &material.positions, &filename)
                    .map_err(|e| QuasiclassicsError::config(format!("cannot write {}: {}", filename, e)))?;
            }
            info!("observables of '{}' written with prefix {}", material.name, prefix);
        }
    }
    Ok(())
}
