use std::fmt;

/// Error types of the propagator engine
#[derive(Debug, Clone, PartialEq)]
pub enum QuasiclassicsError {
    /// a normalization matrix (or another 2x2 inverse) degenerated
    SingularMatrix { context: String },
    /// the BVP solver failed for one energy point
    BvpNonConvergence { energy: f64, reason: String },
    /// invalid material/interface/solver parameters, reported before any solve
    Configuration(String),
}

impl QuasiclassicsError {
    pub fn singular(context: &str) -> Self {
        QuasiclassicsError::SingularMatrix {
            context: context.to_string(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        QuasiclassicsError::Configuration(msg.into())
    }

    /// attach the energy of the failed point to a singular-matrix error
    pub fn at_energy(self, energy: f64) -> Self {
        match self {
            QuasiclassicsError::SingularMatrix { context } => QuasiclassicsError::SingularMatrix {
                context: format!("{} (energy {:.6e})", context, energy),
            },
            other => other,
        }
    }
}

impl fmt::Display for QuasiclassicsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QuasiclassicsError::SingularMatrix { context } => {
                write!(f, "Singular matrix encountered: {}", context)
            }
            QuasiclassicsError::BvpNonConvergence { energy, reason } => write!(
                f,
                "BVP solver did not converge at energy {:.6e}: {}",
                energy, reason
            ),
            QuasiclassicsError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for QuasiclassicsError {}

pub type QResult<T> = Result<T, QuasiclassicsError>;
