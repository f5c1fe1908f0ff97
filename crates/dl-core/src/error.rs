use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    WhileLoopTimeout,
    DoWhileLoopTimeout,
    ExponentiationTimeout,
    DiceRollTimeout,
    DefinitionError,
    CallError,
    OperationError,
    PrivilegeError,
    StorageError,
    MissingIdentifier,
}

/// Coarse grouping of [`ErrorKind`]s, mirroring the language's exception
/// hierarchy (`ExecutionTimeout`, `FunctionError`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    ExecutionTimeout,
    FunctionError,
    OperationError,
    StorageError,
    MissingIdentifier,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::WhileLoopTimeout => "WhileLoopTimeout",
            Self::DoWhileLoopTimeout => "DoWhileLoopTimeout",
            Self::ExponentiationTimeout => "ExponentiationTimeout",
            Self::DiceRollTimeout => "DiceRollTimeout",
            Self::DefinitionError => "DefinitionError",
            Self::CallError => "CallError",
            Self::OperationError => "OperationError",
            Self::PrivilegeError => "PrivilegeError",
            Self::StorageError => "StorageError",
            Self::MissingIdentifier => "MissingIdentifier",
        }
    }

    pub fn family(self) -> ErrorFamily {
        match self {
            Self::WhileLoopTimeout
            | Self::DoWhileLoopTimeout
            | Self::ExponentiationTimeout
            | Self::DiceRollTimeout => ErrorFamily::ExecutionTimeout,
            Self::DefinitionError | Self::CallError => ErrorFamily::FunctionError,
            Self::OperationError => ErrorFamily::OperationError,
            Self::PrivilegeError | Self::StorageError => ErrorFamily::StorageError,
            Self::MissingIdentifier => ErrorFamily::MissingIdentifier,
        }
    }

    pub fn is_timeout(self) -> bool {
        self.family() == ErrorFamily::ExecutionTimeout
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct DicelangError {
    pub kind: ErrorKind,
    pub message: String,
    /// Iteration count reached when a guarded construct gave up.
    pub iterations: Option<u64>,
    /// Action log captured at the point of failure.
    pub actions: Vec<String>,
}

impl DicelangError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            iterations: None,
            actions: Vec::new(),
        }
    }

    pub fn timeout(kind: ErrorKind, iterations: u64) -> Self {
        let construct = match kind {
            ErrorKind::WhileLoopTimeout => "while loop",
            ErrorKind::DoWhileLoopTimeout => "do-while loop",
            ErrorKind::ExponentiationTimeout => "exponentiation",
            ErrorKind::DiceRollTimeout => "dice roll",
            _ => "guarded construct",
        };
        Self {
            kind,
            message: format!("{} gave up after {} iterations.", construct, iterations),
            iterations: Some(iterations),
            actions: Vec::new(),
        }
    }

    pub fn operation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OperationError, message)
    }

    pub fn definition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DefinitionError, message)
    }

    pub fn call(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CallError, message)
    }

    pub fn privilege(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PrivilegeError, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageError, message)
    }

    pub fn missing_identifier(name: &str) -> Self {
        Self::new(
            ErrorKind::MissingIdentifier,
            format!("\"{}\" is not defined.", name),
        )
    }

    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.actions = actions;
        self
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn timeout_errors_carry_iteration_count() {
        let error = DicelangError::timeout(ErrorKind::WhileLoopTimeout, 1000);
        assert_eq!(error.iterations, Some(1000));
        assert!(error.kind.is_timeout());
        assert_eq!(
            error.to_string(),
            "WhileLoopTimeout: while loop gave up after 1000 iterations."
        );
    }

    #[test]
    fn kinds_map_to_their_family() {
        assert_eq!(ErrorKind::CallError.family(), ErrorFamily::FunctionError);
        assert_eq!(ErrorKind::DefinitionError.family(), ErrorFamily::FunctionError);
        assert_eq!(ErrorKind::PrivilegeError.family(), ErrorFamily::StorageError);
        assert_eq!(
            ErrorKind::DiceRollTimeout.family(),
            ErrorFamily::ExecutionTimeout
        );
        assert!(!ErrorKind::OperationError.is_timeout());
    }

    #[test]
    fn with_actions_replaces_snapshot() {
        let error = DicelangError::operation("bad")
            .with_actions(vec!["1d6: [4] = 4".to_string()]);
        assert_eq!(error.actions, vec!["1d6: [4] = 4".to_string()]);
        assert_eq!(error.kind, ErrorKind::OperationError);
    }
}
