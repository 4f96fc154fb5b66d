use thiserror::Error;

use crate::types::FloorId;

/// Navigation engine error types
///
/// Every variant is an expected, recoverable outcome. Callers match on the
/// variant; nothing in the engine panics on these paths.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    /// Start or goal falls outside the grid, or onto a blocked cell
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Frontier exhausted or expansion cap reached
    #[error("No path found")]
    NoPathFound,

    #[error("No entrance found for room '{room}'")]
    NoEntranceMatched { room: String },

    #[error("No floor data loaded for floor '{floor}'")]
    MissingFloorData { floor: FloorId },

    /// Superseded by a newer request or cancelled explicitly
    #[error("Route request cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for engine operations
pub type NavResult<T> = Result<T, NavError>;

impl NavError {
    /// Short machine-friendly tag, used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            NavError::InvalidEndpoint(_) => "invalid_endpoint",
            NavError::NoPathFound => "no_path_found",
            NavError::NoEntranceMatched { .. } => "no_entrance_matched",
            NavError::MissingFloorData { .. } => "missing_floor_data",
            NavError::Cancelled => "cancelled",
            NavError::InvalidConfig(_) => "invalid_config",
            NavError::Internal(_) => "internal",
        }
    }
}
