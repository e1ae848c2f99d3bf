use std::fmt;

/*
 * Errors produced by the IR libraries. Analyses over a well-formed routine are
 * total, so almost everything here is about rejecting malformed input.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LetheError {
    InvalidInput(String),
    Parse(String),
    SweepLimitExceeded { routine: String, sweeps: usize },
    UnknownPass(String),
    Io(String),
}

pub type LetheResult<T> = Result<T, LetheError>;

impl fmt::Display for LetheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LetheError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            LetheError::Parse(msg) => write!(f, "parse error: {}", msg),
            LetheError::SweepLimitExceeded { routine, sweeps } => write!(
                f,
                "liveness of routine {} did not converge within {} sweeps",
                routine, sweeps
            ),
            LetheError::UnknownPass(name) => write!(f, "unknown pass \"{}\"", name),
            LetheError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for LetheError {}

impl From<std::io::Error> for LetheError {
    fn from(err: std::io::Error) -> Self {
        LetheError::Io(err.to_string())
    }
}

impl From<std::fmt::Error> for LetheError {
    fn from(err: std::fmt::Error) -> Self {
        LetheError::Io(err.to_string())
    }
}
