use chrono::Local;
use csv::Writer;
use log::info;
use nalgebra::DMatrix;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::io;
use tabled::{builder::Builder, settings::Style};

use crate::quasiclassics::errors::{QResult, QuasiclassicsError};

pub fn level_filter(level: &str) -> QResult<LevelFilter> {
    match level {
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        _ => Err(QuasiclassicsError::config(format!(
            "loglevel must be debug, info, warn or error, got '{}'",
            level
        ))),
    }
}

/// Terminal logger plus a timestamped log file. A logger installed earlier
/// stays in place.
pub fn init_logger(level: &str) -> QResult<()> {
    let log_option = level_filter(level)?;
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let name = format!("log_{}.txt", date_and_time);
    let file = File::create(&name)
        .map_err(|e| QuasiclassicsError::config(format!("cannot create log file {}: {}", name, e)))?;
    let _ = CombinedLogger::init(vec![
        TermLogger::new(log_option, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(log_option, Config::default(), file),
    ]);
    Ok(())
}

/// Observable grid (energy × position) as csv; the first column holds the energies.
pub fn save_observable_csv(
    matrix: &DMatrix<f64>,
    energies: &[f64],
    positions: &[f64],
    filename: &str,
) -> io::Result<()> {
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);

    let mut headers = Vec::with_capacity(positions.len() + 1);
    headers.push("energy".to_string());
    headers.extend(positions.iter().map(|z| format!("z={}", z)));
    writer.write_record(&headers)?;

    for (i, row) in matrix.row_iter().enumerate() {
        let mut row_data = Vec::with_capacity(row.len() + 1);
        row_data.push(energies[i].to_string());
        row_data.extend(row.iter().map(|&val| val.to_string()));
        writer.write_record(&row_data)?;
    }

    writer.flush()?;
    Ok(())
}

/// log a two-column table of run statistics
pub fn log_statistics(title: &str, stats: &[(String, String)]) -> String {
    let mut builder = Builder::default();
    for (key, value) in stats {
        builder.push_record([key.clone(), value.clone()]);
    }
    let mut table = builder.build();
    table.with(Style::modern_rounded());
    let rendered = table.to_string();
    info!("\n \n {} \n \n {}", title, rendered);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_energy_column_and_position_headers() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("observable_test_{}.csv", std::process::id()));
        let filename = path.to_string_lossy().to_string();
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 0.5, 0.25, 2.0, 1.5, 1.25]);
        save_observable_csv(&m, &[0.1, 0.2], &[0.0, 0.5, 1.0], &filename).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 4);
        assert_eq!(&headers[0], "energy");
        assert_eq!(&headers[2], "z=0.5");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][0], "0.2");
        assert_eq!(rows[1][3].parse::<f64>().unwrap(), 1.25);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn levels() {
        assert_eq!(level_filter("debug").unwrap(), LevelFilter::Debug);
        assert!(level_filter("loud").is_err());
    }

    #[test]
    fn statistics_table_contains_entries() {
        let table = log_statistics("RUN", &[("materials".to_string(), "2".to_string())]);
        assert!(table.contains("materials"));
        assert!(table.contains('2'));
    }
}
