//! Database error categorization
//!
//! Relation inserts use this to tell constraint failures apart from other
//! database errors.
//!
//! ```rust
//! use relkeeper::common::db_errors::DbErrorKind;
//! use sea_orm::{DbErr, RuntimeErr};
//!
//! let err = DbErr::Exec(RuntimeErr::Internal("FOREIGN KEY constraint failed".to_string()));
//! assert_eq!(DbErrorKind::from_db_err(&err), DbErrorKind::ForeignKeyViolation);
//! ```

use sea_orm::{DbErr, SqlErr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    Other,
}

impl DbErrorKind {
    pub fn from_db_err(err: &DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => return Self::UniqueViolation,
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => return Self::ForeignKeyViolation,
            _ => {}
        }

        match err {
            DbErr::Exec(_) | DbErr::Query(_) => {
                let msg_lower = err.to_string().to_lowercase();
                if msg_lower.contains("unique") || msg_lower.contains("duplicate") {
                    Self::UniqueViolation
                } else if msg_lower.contains("foreign key") {
                    Self::ForeignKeyViolation
                } else {
                    Self::Other
                }
            }
            _ => Self::Other,
        }
    }
}
