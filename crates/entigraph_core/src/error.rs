//! Error types for EntiGraph core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in EntiGraph core operations.
///
/// Absence is never an error: reads return `Option` or empty collections.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Value codec or wire-format error.
    #[error("codec error: {0}")]
    Codec(#[from] entigraph_codec::CodecError),

    /// A unique index with the `fail` policy rejected a save.
    #[error(
        "unique constraint violation on {type_name}.{index}: key {key} is held by {existing}, rejected {incoming}"
    )]
    UniqueConstraintViolation {
        /// Entity type owning the index.
        type_name: String,
        /// Name of the unique index.
        index: String,
        /// Rendered key tuple.
        key: String,
        /// Id of the entity currently holding the key.
        existing: String,
        /// Id of the entity that attempted to claim it.
        incoming: String,
    },

    /// The entity type is not registered in the schema.
    #[error("unknown entity type: {type_name}")]
    UnknownType {
        /// The unregistered type name.
        type_name: String,
    },

    /// The relation is not declared on the entity type.
    #[error("unknown relation {relation} on {type_name}")]
    UnknownRelation {
        /// Entity type that was searched.
        type_name: String,
        /// The undeclared relation name.
        relation: String,
    },

    /// The schema descriptor is inconsistent.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },

    /// A relation value does not fit its declaration.
    #[error("invalid relation {type_name}.{relation}: {message}")]
    InvalidRelation {
        /// Entity type owning the relation.
        type_name: String,
        /// Relation name.
        relation: String,
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state or configuration.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Creates an unknown relation error.
    pub fn unknown_relation(type_name: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            type_name: type_name.into(),
            relation: relation.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid relation error.
    pub fn invalid_relation(
        type_name: impl Into<String>,
        relation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRelation {
            type_name: type_name.into(),
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by a unique index rejecting a key.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueConstraintViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigraph_codec::CodecError;

    #[test]
    fn error_display() {
        let err = CoreError::unknown_relation("User", "chats");
        assert_eq!(err.to_string(), "unknown relation chats on User");

        let err = CoreError::invalid_relation("Message", "chat", "chunk on to-one");
        assert_eq!(
            err.to_string(),
            "invalid relation Message.chat: chunk on to-one"
        );
    }

    #[test]
    fn codec_errors_convert() {
        let err: CoreError = CodecError::invalid_structure("not a map").into();
        assert!(matches!(err, CoreError::Codec(_)));
        assert!(err.to_string().contains("not a map"));
    }

    #[test]
    fn unique_violation_flag() {
        let err = CoreError::UniqueConstraintViolation {
            type_name: "User".into(),
            index: "by_username".into(),
            key: "(\"ada\")".into(),
            existing: "u1".into(),
            incoming: "u2".into(),
        };
        assert!(err.is_unique_violation());
        assert!(!CoreError::unknown_type("Ghost").is_unique_violation());
    }
}
