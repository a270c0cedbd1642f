pub mod records;
pub mod relations;

pub use records::{RecordKind, RecordStatus};
