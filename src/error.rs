use thiserror::Error;

/// Errors raised at construction and index-maintenance boundaries.
///
/// Per-frame numeric degeneracy (zero-length traces, negative discriminants)
/// is never an error; those cases simply produce no hit or no impulse.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollisionError {
    #[error("mass must be positive, got {0}")]
    NonPositiveMass(f32),

    #[error("radius must be positive, got {0}")]
    NonPositiveRadius(f32),

    #[error("elasticity must be non-negative, got {0}")]
    NegativeElasticity(f32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("entity is no longer alive")]
    StaleEntity,

    #[error("entity is already indexed by this tree")]
    AlreadyIndexed,

    #[error("entity is not indexed by this tree")]
    NotIndexed,
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Parsed fine but failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] CollisionError),
}

pub type Result<T, E = CollisionError> = std::result::Result<T, E>;
