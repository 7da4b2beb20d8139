use thiserror::Error;

use crate::model::RacerId;

/// Errors returned by roster mutations.
///
/// A failed mutation never leaves partial state behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("Required field is empty: {field}")]
    Validation { field: &'static str },
    #[error("Racer not found: {0}")]
    RacerNotFound(RacerId),
    #[error("Heat not found: {0}")]
    HeatNotFound(u32),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

/// Coarse error category, for callers that only display the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidOrder,
}

impl RosterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::RacerNotFound(_) | Self::HeatNotFound(_) => ErrorKind::NotFound,
            Self::InvalidOrder(_) => ErrorKind::InvalidOrder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RosterError::Validation { field: "name" }.kind(), ErrorKind::Validation);
        assert_eq!(RosterError::RacerNotFound(Uuid::nil()).kind(), ErrorKind::NotFound);
        assert_eq!(RosterError::HeatNotFound(2).kind(), ErrorKind::NotFound);
        assert_eq!(RosterError::InvalidOrder("x".into()).kind(), ErrorKind::InvalidOrder);
    }

    #[test]
    fn test_error_display() {
        let err = RosterError::HeatNotFound(7);
        assert_eq!(err.to_string(), "Heat not found: 7");
    }
}
