//! TOML run description: solver settings, the energy mesh, materials and the
//! interfaces between consecutive materials.
//!
//! ```toml
//! [solver]
//! order = 4
//! error_control = "defect"
//! tolerance = 1e-6
//!
//! [energies]
//! min = 1e-6
//! max = 3.0
//! points = 50
//!
//! [[material]]
//! name = "S"
//! kind = "superconductor"
//! gap = 1.0
//!
//! [[material]]
//! name = "N"
//! kind = "conductor"
//!
//! [[interface]]
//! kind = "tunneling"
//! conductance = 0.3
//! ```
use crate::numerical::BVP_collocation::BVP_mirk_api::{CollocationOrder, ErrorControl, SolverSettings};
use crate::quasiclassics::boundary::Interface;
use crate::quasiclassics::errors::{QResult, QuasiclassicsError};
use crate::quasiclassics::material::{Material, MaterialKind};
use crate::quasiclassics::spin_active::SpinActiveInterface;
use crate::quasiclassics::spin_matrix::C64;
use crate::quasiclassics::spin_orbit::SpinOrbit;
use crate::quasiclassics::stack::Stack;
use crate::quasiclassics::superconductor::Superconductor;
use toml::{Table, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub log_level: String,
    /// write `<prefix>_<material>_<observable>.csv` files when set
    pub csv_prefix: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            log_level: "info".to_string(),
            csv_prefix: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub settings: SolverSettings,
    pub max_passes: usize,
    pub threshold: f64,
    pub stack: Stack,
    pub output: OutputConfig,
}

pub fn load_config(path: &str) -> QResult<RunConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| QuasiclassicsError::config(format!("cannot read {}: {}", path, e)))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> QResult<RunConfig> {
    let doc = content
        .parse::<Table>()
        .map_err(|e| QuasiclassicsError::config(format!("invalid TOML: {}", e)))?;

    let empty = Table::new();
    let solver = section(&doc, "solver")?.unwrap_or(&empty);
    let settings = parse_solver(solver)?;
    let max_passes = get_usize(solver, "max_passes", 20)?;
    let threshold = get_f64(solver, "threshold", 1e-4)?;

    let energies = parse_energies(section(&doc, "energies")?.unwrap_or(&empty))?;

    let materials = array_of_tables(&doc, "material")?;
    if materials.is_empty() {
        return Err(QuasiclassicsError::config("at least one [[material]] is required"));
    }
    let interfaces = array_of_tables(&doc, "interface")?;
    if interfaces.len() + 1 != materials.len() && !interfaces.is_empty() {
        return Err(QuasiclassicsError::config(format!(
            "{} materials need {} interfaces, got {}",
            materials.len(),
            materials.len() - 1,
            interfaces.len()
        )));
    }

    let mut stack = Stack::new();
    for (k, table) in materials.iter().enumerate() {
        stack.push(parse_material(table, k, &energies)?);
    }
    for (k, table) in interfaces.iter().enumerate() {
        let interface = parse_interface(table)?;
        if interface != Interface::Vacuum {
            stack.link(k, k + 1, interface)?;
        }
    }
    stack.validate()?;

    let output = match section(&doc, "output")? {
        Some(out) => OutputConfig {
            log_level: get_str(out, "log_level")?.unwrap_or("info").to_string(),
            csv_prefix: get_str(out, "csv_prefix")?.map(|s| s.to_string()),
        },
        None => OutputConfig::default(),
    };

    Ok(RunConfig {
        settings,
        max_passes,
        threshold,
        stack,
        output,
    })
}

fn parse_solver(t: &Table) -> QResult<SolverSettings> {
    let defaults = SolverSettings::default();
    let order_value = get_usize(t, "order", defaults.order.order())?;
    let order = CollocationOrder::from_order(order_value)
        .ok_or_else(|| QuasiclassicsError::config(format!("collocation order must be 2, 4 or 6, got {}", order_value)))?;
    let error_control = match get_str(t, "error_control")? {
        Some(name) => ErrorControl::from_name(name)
            .ok_or_else(|| QuasiclassicsError::config(format!("unknown error control '{}'", name)))?,
        None => defaults.error_control,
    };
    let tolerance = get_f64(t, "tolerance", defaults.tolerance)?;
    if !(tolerance > 0.0) {
        return Err(QuasiclassicsError::config(format!("tolerance must be positive, got {}", tolerance)));
    }
    let bc_tolerance = match t.get("bc_tolerance") {
        Some(_) => Some(get_f64(t, "bc_tolerance", tolerance)?),
        None => None,
    };
    Ok(SolverSettings {
        order,
        error_control,
        tolerance,
        bc_tolerance,
        max_refinement: get_usize(t, "max_refinement", defaults.max_refinement)?,
        max_iterations: get_usize(t, "max_iterations", defaults.max_iterations)?,
    })
}

fn parse_energies(t: &Table) -> QResult<Vec<f64>> {
    if let Some(values) = t.get("values") {
        return float_array(values, "energies.values");
    }
    let min = get_f64(t, "min", 1e-6)?;
    let max = get_f64(t, "max", 3.0)?;
    let points = get_usize(t, "points", 50)?;
    if points < 1 || !(max >= min) {
        return Err(QuasiclassicsError::config(format!(
            "invalid energy mesh: min {}, max {}, points {}",
            min, max, points
        )));
    }
    Ok(linspace(min, max, points))
}

fn parse_material(t: &Table, index: usize, energies: &[f64]) -> QResult<Material> {
    let default_name = format!("material{}", index);
    let name = get_str(t, "name")?.unwrap_or(&default_name).to_string();
    let positions = linspace(0.0, 1.0, get_usize(t, "positions", 50)?.max(2));
    let kind = match get_str(t, "kind")?.unwrap_or("conductor") {
        "conductor" | "normal" => MaterialKind::Conductor,
        "superconductor" => {
            let gap = match t.get("gap") {
                Some(v) => complex_value(v, "gap")?,
                None => C64::new(1.0, 0.0),
            };
            let mut sc = Superconductor::new(
                &positions,
                gap,
                get_f64(t, "temperature", 0.0)?,
                get_f64(t, "cutoff", 30.0)?,
            );
            if t.contains_key("coupling") {
                sc.coupling = Some(get_f64(t, "coupling", 0.0)?);
            }
            MaterialKind::Superconductor(sc)
        }
        "ferromagnet" => MaterialKind::Ferromagnet {
            exchange: get_vec3(t, "exchange")?.unwrap_or([0.0, 0.0, 0.0]),
        },
        other => {
            return Err(QuasiclassicsError::config(format!(
                "material '{}': unknown kind '{}'",
                name, other
            )));
        }
    };
    let mut material = Material::new(&name, kind, energies.to_vec(), positions);
    material.thouless = get_f64(t, "thouless", 1.0)?;
    material.scattering = get_f64(t, "scattering", 0.01)?;
    material.depairing = get_f64(t, "depairing", 0.0)?;
    material.spinflip = get_f64(t, "spinflip", 0.0)?;
    material.spinorbit_scattering = get_f64(t, "spinorbit_scattering", 0.0)?;
    if let Some(so) = section(t, "spin_orbit")? {
        let zero = [0.0, 0.0, 0.0];
        material.spin_orbit = Some(SpinOrbit::from_vectors(
            get_vec3(so, "x")?.unwrap_or(zero),
            get_vec3(so, "y")?.unwrap_or(zero),
            get_vec3(so, "z")?.unwrap_or(zero),
        ));
    }
    // scattering changes the initial BCS states
    material.reset_states();
    Ok(material)
}

fn parse_interface(t: &Table) -> QResult<Interface> {
    match get_str(t, "kind")?.unwrap_or("vacuum") {
        "vacuum" => Ok(Interface::Vacuum),
        "transparent" => Ok(Interface::Transparent),
        "tunneling" => Ok(Interface::Tunneling {
            conductance: get_f64(t, "conductance", 0.3)?,
        }),
        "spinactive" => {
            let mut sa = SpinActiveInterface::new(
                get_f64(t, "conductance", 0.3)?,
                get_f64(t, "polarization", 0.0)?,
                get_f64(t, "spinmixing", 0.0)?,
                get_vec3(t, "magnetization")?.unwrap_or([0.0, 0.0, 1.0]),
            );
            sa.second_order = get_f64(t, "second_order", 0.0)?;
            sa.misalignment = get_vec3(t, "misalignment")?;
            Ok(Interface::SpinActive(sa))
        }
        other => Err(QuasiclassicsError::config(format!("unknown interface kind '{}'", other))),
    }
}

pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![a];
    }
    (0..n).map(|i| a + (b - a) * i as f64 / (n - 1) as f64).collect()
}

fn section<'a>(t: &'a Table, key: &str) -> QResult<Option<&'a Table>> {
    match t.get(key) {
        None => Ok(None),
        Some(Value::Table(inner)) => Ok(Some(inner)),
        Some(_) => Err(QuasiclassicsError::config(format!("'{}' must be a table", key))),
    }
}

fn array_of_tables<'a>(t: &'a Table, key: &str) -> QResult<Vec<&'a Table>> {
    match t.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_table()
                    .ok_or_else(|| QuasiclassicsError::config(format!("'{}' entries must be tables", key)))
            })
            .collect(),
        Some(_) => Err(QuasiclassicsError::config(format!("'{}' must be an array of tables", key))),
    }
}

fn number(v: &Value, key: &str) -> QResult<f64> {
    match v {
        Value::Float(f) => Ok(*f),
        Value::Integer(i) => Ok(*i as f64),
        _ => Err(QuasiclassicsError::config(format!("'{}' must be a number", key))),
    }
}

fn get_f64(t: &Table, key: &str, default: f64) -> QResult<f64> {
    t.get(key).map_or(Ok(default), |v| number(v, key))
}

fn get_usize(t: &Table, key: &str, default: usize) -> QResult<usize> {
    match t.get(key) {
        None => Ok(default),
        Some(Value::Integer(i)) if *i >= 0 => Ok(*i as usize),
        Some(_) => Err(QuasiclassicsError::config(format!("'{}' must be a non-negative integer", key))),
    }
}

fn get_str<'a>(t: &'a Table, key: &str) -> QResult<Option<&'a str>> {
    match t.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(QuasiclassicsError::config(format!("'{}' must be a string", key))),
    }
}

fn float_array(v: &Value, key: &str) -> QResult<Vec<f64>> {
    v.as_array()
        .ok_or_else(|| QuasiclassicsError::config(format!("'{}' must be an array", key)))?
        .iter()
        .map(|x| number(x, key))
        .collect()
}

fn get_vec3(t: &Table, key: &str) -> QResult<Option<[f64; 3]>> {
    match t.get(key) {
        None => Ok(None),
        Some(v) => {
            let values = float_array(v, key)?;
            <[f64; 3]>::try_from(values)
                .map(Some)
                .map_err(|_| QuasiclassicsError::config(format!("'{}' must have three components", key)))
        }
    }
}

/// a number or a [re, im] pair
fn complex_value(v: &Value, key: &str) -> QResult<C64> {
    match v {
        Value::Array(_) => match float_array(v, key)?.as_slice() {
            [re, im] => Ok(C64::new(*re, *im)),
            _ => Err(QuasiclassicsError::config(format!("'{}' must be [re, im]", key))),
        },
        _ => Ok(C64::new(number(v, key)?, 0.0)),
    }
}
