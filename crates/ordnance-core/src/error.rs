//! Error types for content and configuration loading.
//!
//! Only loading can fail. Tick-time entry points never return these: they log
//! and fall back to safe defaults instead.

use thiserror::Error;

/// Failure while loading or validating content (blueprints, category
/// expressions, target-type names).
#[derive(Debug, Error)]
pub enum ContentError {
    /// The document is not valid JSON or does not match the schema.
    #[error("malformed content: {0}")]
    Json(#[from] serde_json::Error),

    /// A category name that is not part of the category table.
    #[error("unknown category `{0}`")]
    UnknownCategory(String),

    /// A category expression with a dangling or doubled operator.
    #[error("malformed category expression `{0}`")]
    MalformedCategoryExpression(String),

    /// An impact target-type name outside the closed set.
    #[error("unknown target type `{0}`")]
    UnknownTargetType(String),

    /// A numeric field outside its valid range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human-readable constraint that was violated.
        reason: String,
    },
}

/// Failure while loading simulation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON or does not match the schema.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// `ticks_per_second` must be at least one.
    #[error("ticks_per_second must be positive")]
    ZeroTickRate,

    /// Terrain impact-effect table failed content validation.
    #[error(transparent)]
    Content(#[from] ContentError),
}
