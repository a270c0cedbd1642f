//! Relation engine error types
//!
//! Every engine operation returns these synchronously; nothing is swallowed
//! and nothing is retried internally.

use sea_orm::DbErr;
use thiserror::Error;

use crate::common::db_errors::DbErrorKind;

#[derive(Error, Debug)]
pub enum RelationError {
    /// The (left, right, language, workspace) tuple already exists
    #[error("Relation {left} -> {right} already exists (language {language}, workspace {workspace})")]
    DuplicateRelation {
        left: i32,
        right: i32,
        language: i32,
        workspace: i32,
    },

    /// Remove or positional insert referenced a relation that does not exist
    #[error("Relation {left} -> {right} not found (language {language}, workspace {workspace})")]
    NotFound {
        left: i32,
        right: i32,
        language: i32,
        workspace: i32,
    },

    /// Reorder named a right id that is not currently related
    #[error("Record {right} is not related to {left}")]
    UnknownMember { left: i32, right: i32 },

    /// A cascade could not determine a valid retarget; nothing was committed
    #[error("Unresolved cascade on record {record}: {reason}")]
    UnresolvedCascade { record: i32, reason: String },

    #[error("Record {0} not found")]
    RecordNotFound(i32),

    #[error("Record {record} already has a localization in language {language}")]
    AlreadyLocalized { record: i32, language: i32 },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl RelationError {
    /// Caller-side errors (bad ids, conflicting requests)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelationError::DuplicateRelation { .. }
                | RelationError::UnknownMember { .. }
                | RelationError::AlreadyLocalized { .. }
                | RelationError::InvalidOperation(_)
                | RelationError::UnresolvedCascade { .. }
        ) || self.is_not_found()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RelationError::NotFound { .. } | RelationError::RecordNotFound(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RelationError::DuplicateRelation { .. } | RelationError::AlreadyLocalized { .. } => {
                "CONFLICT"
            }
            RelationError::NotFound { .. } | RelationError::RecordNotFound(_) => "NOT_FOUND",
            RelationError::UnknownMember { .. } => "UNKNOWN_MEMBER",
            RelationError::UnresolvedCascade { .. } => "UNRESOLVED_CASCADE",
            RelationError::InvalidOperation(_) => "INVALID_OPERATION",
            RelationError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            RelationError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Map a failed relation insert, surfacing unique violations as duplicates
    /// and foreign-key violations as rows pointing at missing records
    pub fn from_insert(err: DbErr, left: i32, right: i32, language: i32, workspace: i32) -> Self {
        match DbErrorKind::from_db_err(&err) {
            DbErrorKind::UniqueViolation => RelationError::DuplicateRelation {
                left,
                right,
                language,
                workspace,
            },
            DbErrorKind::ForeignKeyViolation => RelationError::InvalidOperation(format!(
                "relation {} -> {} references a record that does not exist",
                left, right
            )),
            DbErrorKind::Other => RelationError::Database(err),
        }
    }
}
