use thiserror::Error;

/// Failures of mapper operations.
///
/// Range-related variants are expected during interactive use; the session
/// recovers from them instead of surfacing them to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapperError {
    #[error("selection overlaps an existing marker")]
    SelectionOverlapsMarker,

    #[error("position {offset} lies inside marker {instance_id}")]
    InsideMarker { offset: usize, instance_id: String },

    #[error("offset {offset} is outside the document text (length {len})")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("stored range is no longer attached to the document")]
    StaleRange,

    #[error("no marker with instance id {0}")]
    UnknownInstance(String),

    #[error("placeholder '{0}' is not awaiting repair")]
    UnknownPlaceholder(String),

    #[error("'{0}' is not a valid schema field")]
    InvalidField(String),

    #[error("placeholders still unresolved: {}", .0.join(", "))]
    Incomplete(Vec<String>),
}
