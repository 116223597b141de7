use std::fmt::{self, Display};

/// Errors produced by model constructors and parsing routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownCollector(String),
    InvalidCriticality(String),
    InvalidTransport(String),
    InvalidRole(String),
    InvalidSeverity(String),
    InvalidId(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownCollector(name) => {
                write!(f, "unknown collector kind: {name}")
            }
            ModelError::InvalidCriticality(raw) => {
                write!(f, "invalid criticality tier: {raw}")
            }
            ModelError::InvalidTransport(raw) => {
                write!(f, "invalid transport: {raw}")
            }
            ModelError::InvalidRole(raw) => write!(f, "invalid server role: {raw}"),
            ModelError::InvalidSeverity(raw) => write!(f, "invalid severity: {raw}"),
            ModelError::InvalidId(msg) => write!(f, "invalid id: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
