//! Error type for collector operations

use std::fmt;

/// Result type alias for collector operations
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Errors that can occur while collecting one subsystem's state
///
/// A "valid key, no matching record" outcome is NOT an error; collectors
/// report it as `Ok(None)` from `collect_one`.
#[derive(Debug)]
pub enum CollectorError {
    /// A dependency the collector needs is missing or unreachable
    /// (binary not installed, runtime socket gone, source file absent)
    Unavailable(String),

    /// An external command ran but reported failure
    Command {
        command: String,
        detail: String,
    },

    /// Output of a dependency could not be parsed
    Parse(String),

    /// I/O error (permission denied, read failure, etc.)
    Io(std::io::Error),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorError::Unavailable(msg) => write!(f, "unavailable: {}", msg),
            CollectorError::Command { command, detail } => {
                write!(f, "command `{}` failed: {}", command, detail)
            }
            CollectorError::Parse(msg) => write!(f, "unparsable output: {}", msg),
            CollectorError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectorError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        CollectorError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_subsystem_cause() {
        let err = CollectorError::Unavailable("docker binary not found".to_string());
        assert_eq!(err.to_string(), "unavailable: docker binary not found");

        let err = CollectorError::Command {
            command: "nginx -T".to_string(),
            detail: "exit status 1".to_string(),
        };
        assert_eq!(err.to_string(), "command `nginx -T` failed: exit status 1");
    }
}
