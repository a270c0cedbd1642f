//! Scenario harness for the many-to-many fixture
//!
//! Loads the fixture with stable ids, runs named actions or YAML scenarios
//! against a `RelationEngine`, and checks the resolved relations.

pub mod actions;
pub mod fixtures;
pub mod scenario;

pub use actions::{perform, ActionOutcome, NamedAction};
pub use fixtures::Fixture;
pub use scenario::{RecordRef, Scenario, ScenarioReport, Step};
