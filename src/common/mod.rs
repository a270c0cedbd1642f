//! Cross-cutting helpers: database error categorisation and template setup.

pub mod db_errors;
pub mod handlebars;

pub use handlebars::{get_handlebars, write_string_to_file};
