//! Domain-specific error types for relkeeper
//!
//! # Error Categories
//!
//! - **RelationError**: relation store, planner, cascade and verifier errors
//! - **SitemapError**: sitemap configuration, provider and template errors
//!
//! ```rust
//! use relkeeper::errors::RelationError;
//!
//! let err = RelationError::UnknownMember { left: 297, right: 31 };
//! assert!(err.is_client_error());
//! assert_eq!(err.error_code(), "UNKNOWN_MEMBER");
//! ```

pub mod relation;
pub mod sitemap;

pub use relation::RelationError;
pub use sitemap::SitemapError;

/// Result type alias for relation engine operations
pub type RelationResult<T> = Result<T, RelationError>;

/// Result type alias for sitemap rendering
pub type SitemapResult<T> = Result<T, SitemapError>;
