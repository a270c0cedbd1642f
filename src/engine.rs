use std::sync::Arc;

use anyhow::Result;
use sea_orm::DatabaseConnection;

use crate::config::EngineConfig;
use crate::database::open_database;
use crate::services::{
    CascadeResolver, ConsistencyVerifier, EntityRepository, MutationPlanner, RelationStore,
};

/// Shared engine handle exposing the relation services to the CLI,
/// the scenario harness and the sitemap providers.
#[derive(Clone)]
pub struct RelationEngine {
    db: DatabaseConnection,
    config: Arc<EngineConfig>,
    repository: Arc<EntityRepository>,
    store: Arc<RelationStore>,
    planner: Arc<MutationPlanner>,
    cascade: Arc<CascadeResolver>,
    verifier: Arc<ConsistencyVerifier>,
}

impl RelationEngine {
    pub fn new(db: DatabaseConnection, config: EngineConfig) -> Self {
        let repository = Arc::new(EntityRepository::new(db.clone()));
        let store = Arc::new(RelationStore::new(db.clone()));
        let planner = Arc::new(MutationPlanner::new(db.clone(), config.relations.clone()));
        let cascade = Arc::new(CascadeResolver::new(
            db.clone(),
            config.localization.clone(),
            config.copy.clone(),
        ));
        let verifier = Arc::new(ConsistencyVerifier::new(
            db.clone(),
            config.localization.clone(),
        ));

        Self {
            db,
            config: Arc::new(config),
            repository,
            store,
            planner,
            cascade,
            verifier,
        }
    }

    /// Open (and migrate) the configured database, then build the engine
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let db = open_database(config.database.path.as_deref()).await?;
        Ok(Self::new(db, config))
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> Arc<EntityRepository> {
        self.repository.clone()
    }

    pub fn store(&self) -> Arc<RelationStore> {
        self.store.clone()
    }

    pub fn planner(&self) -> Arc<MutationPlanner> {
        self.planner.clone()
    }

    pub fn cascade(&self) -> Arc<CascadeResolver> {
        self.cascade.clone()
    }

    pub fn verifier(&self) -> Arc<ConsistencyVerifier> {
        self.verifier.clone()
    }
}
