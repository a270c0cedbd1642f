pub mod cascade_resolver;
pub mod consistency_verifier;
pub mod entity_repository;
pub mod mutation_planner;
pub mod relation_store;

pub use cascade_resolver::{CascadeResolver, CopyOutcome};
pub use consistency_verifier::{
    ConsistencyReport, ConsistencyVerifier, ContentView, PageView, ResolvedEntity, Violation,
};
pub use entity_repository::{EntityRepository, NewRecord};
pub use mutation_planner::{MutationPlan, MutationPlanner, PlannedWrite, RecordEdit};
pub use relation_store::{Position, RelationContext, RelationStore};
