use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::actions::{perform, NamedAction};
use super::fixtures::Fixture;
use crate::engine::RelationEngine;
use crate::services::{Position, RecordEdit, RelationContext};

/// A record id, or an alias captured from an earlier step (`$newContentId`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordRef {
    Id(i32),
    Alias(String),
}

impl RecordRef {
    fn resolve(&self, aliases: &HashMap<String, i32>) -> Result<i32> {
        match self {
            RecordRef::Id(id) => Ok(*id),
            RecordRef::Alias(alias) => {
                let key = alias.trim_start_matches('$');
                aliases
                    .get(key)
                    .copied()
                    .ok_or_else(|| anyhow!("Unknown record alias '{}'", alias))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Action {
        name: NamedAction,
    },
    AddRelation {
        left: RecordRef,
        right: RecordRef,
        #[serde(default)]
        position: Position,
        #[serde(flatten)]
        context: RelationContext,
    },
    RemoveRelation {
        left: RecordRef,
        right: RecordRef,
        #[serde(flatten)]
        context: RelationContext,
    },
    SetRelations {
        left: RecordRef,
        rights: Vec<RecordRef>,
        #[serde(flatten)]
        context: RelationContext,
    },
    Reorder {
        left: RecordRef,
        rights: Vec<RecordRef>,
        #[serde(flatten)]
        context: RelationContext,
    },
    Rename {
        record: RecordRef,
        title: String,
    },
    Delete {
        record: RecordRef,
    },
    Restore {
        record: RecordRef,
    },
    Copy {
        record: RecordRef,
        #[serde(default)]
        page: Option<RecordRef>,
        #[serde(default)]
        workspace_id: i32,
        #[serde(default, rename = "as")]
        alias: Option<String>,
    },
    CopyPage {
        page: RecordRef,
        #[serde(default)]
        target: Option<RecordRef>,
        #[serde(default)]
        workspace_id: i32,
        #[serde(default, rename = "as")]
        alias: Option<String>,
    },
    Localize {
        record: RecordRef,
        language_id: i32,
        #[serde(default)]
        workspace_id: i32,
        #[serde(default, rename = "as")]
        alias: Option<String>,
    },
    Move {
        record: RecordRef,
        page: RecordRef,
    },
}

/// Ordered titles `record` must resolve to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationExpectation {
    pub record: RecordRef,
    #[serde(default)]
    pub language_id: i32,
    #[serde(default)]
    pub workspace_id: i32,
    pub titles: Vec<String>,
}

/// Content headers (and optionally categories) a rendered page must show
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExpectation {
    pub page: RecordRef,
    #[serde(default)]
    pub language_id: i32,
    #[serde(default)]
    pub workspace_id: i32,
    #[serde(default)]
    pub title: Option<String>,
    pub headers: Vec<String>,
    /// Header -> ordered category titles
    #[serde(default)]
    pub categories: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Defaults to the many-to-many fixture
    #[serde(default)]
    pub fixture: Option<Fixture>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub expect: Vec<RelationExpectation>,
    #[serde(default)]
    pub expect_pages: Vec<PageExpectation>,
    /// Error code the last step must fail with, if any
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub failures: Vec<String>,
    pub aliases: HashMap<String, i32>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load the fixture, run every step, then check the expectations.
    ///
    /// A step failing with an engine error stops the run; when the scenario
    /// names `expect_error` that failure is the expected outcome.
    pub async fn run(&self, engine: &RelationEngine) -> Result<ScenarioReport> {
        info!("Running scenario '{}'", self.name);
        let fixture = self.fixture.clone().unwrap_or_else(Fixture::many_to_many);
        fixture.load(engine).await?;

        let mut aliases = HashMap::new();
        let mut failures = Vec::new();
        let mut step_error = None;
        for (index, step) in self.steps.iter().enumerate() {
            if let Err(err) = run_step(engine, step, &mut aliases).await {
                step_error = Some((index, err));
                break;
            }
        }

        match (&self.expect_error, step_error) {
            (Some(code), Some((index, err))) => {
                let actual = err
                    .downcast_ref::<crate::errors::RelationError>()
                    .map(|e| e.error_code());
                if actual != Some(code.as_str()) {
                    failures.push(format!(
                        "step {} failed with '{}', expected error {}",
                        index, err, code
                    ));
                }
            }
            (Some(code), None) => failures.push(format!("expected error {} but all steps passed", code)),
            (None, Some((index, err))) => {
                failures.push(format!("step {} failed: {}", index, err));
            }
            (None, None) => {}
        }

        for expectation in &self.expect {
            let record = expectation.record.resolve(&aliases)?;
            let titles = engine
                .verifier()
                .resolve_titles(record, expectation.language_id, expectation.workspace_id)
                .await?;
            if titles != expectation.titles {
                failures.push(format!(
                    "record {} in language {} resolved to {:?}, expected {:?}",
                    record, expectation.language_id, titles, expectation.titles
                ));
            }
        }

        for expectation in &self.expect_pages {
            let page_id = expectation.page.resolve(&aliases)?;
            let page = engine
                .verifier()
                .resolve_page(page_id, expectation.language_id, expectation.workspace_id)
                .await?;
            if let Some(title) = &expectation.title {
                if &page.title != title {
                    failures.push(format!("page {} titled '{}', expected '{}'", page_id, page.title, title));
                }
            }
            let headers: Vec<&str> = page.contents.iter().map(|c| c.header.as_str()).collect();
            if headers != expectation.headers.iter().map(String::as_str).collect::<Vec<_>>() {
                failures.push(format!(
                    "page {} shows {:?}, expected {:?}",
                    page_id, headers, expectation.headers
                ));
            }
            for (header, expected) in &expectation.categories {
                let actual = page.content_by_header(header).map(|c| c.category_titles());
                let wanted: Vec<&str> = expected.iter().map(String::as_str).collect();
                if actual.as_deref() != Some(wanted.as_slice()) {
                    failures.push(format!(
                        "'{}' on page {} has categories {:?}, expected {:?}",
                        header, page_id, actual, expected
                    ));
                }
            }
        }

        if failures.is_empty() {
            info!("Scenario '{}' passed", self.name);
        } else {
            warn!("Scenario '{}' failed: {:?}", self.name, failures);
        }

        Ok(ScenarioReport {
            name: self.name.clone(),
            failures,
            aliases,
        })
    }
}

fn resolve_all(refs: &[RecordRef], aliases: &HashMap<String, i32>) -> Result<Vec<i32>> {
    refs.iter().map(|r| r.resolve(aliases)).collect()
}

async fn run_step(
    engine: &RelationEngine,
    step: &Step,
    aliases: &mut HashMap<String, i32>,
) -> Result<()> {
    match step {
        Step::Action { name } => {
            let outcome = perform(engine, *name).await?;
            aliases.extend(outcome.record_ids);
        }
        Step::AddRelation {
            left,
            right,
            position,
            context,
        } => {
            engine
                .planner()
                .add_relation(left.resolve(aliases)?, right.resolve(aliases)?, *context, *position)
                .await?;
        }
        Step::RemoveRelation {
            left,
            right,
            context,
        } => {
            engine
                .planner()
                .remove_relation(left.resolve(aliases)?, right.resolve(aliases)?, *context)
                .await?;
        }
        Step::SetRelations {
            left,
            rights,
            context,
        } => {
            let rights = resolve_all(rights, aliases)?;
            engine
                .planner()
                .replace_relations(left.resolve(aliases)?, &rights, *context)
                .await?;
        }
        Step::Reorder {
            left,
            rights,
            context,
        } => {
            let rights = resolve_all(rights, aliases)?;
            engine
                .planner()
                .reorder_relations(left.resolve(aliases)?, &rights, *context)
                .await?;
        }
        Step::Rename { record, title } => {
            let edit = RecordEdit {
                title: Some(title.clone()),
                relations: None,
            };
            engine
                .planner()
                .edit_record(record.resolve(aliases)?, edit, RelationContext::LIVE)
                .await?;
        }
        Step::Delete { record } => {
            engine.cascade().delete(record.resolve(aliases)?).await?;
        }
        Step::Restore { record } => {
            engine.cascade().restore(record.resolve(aliases)?).await?;
        }
        Step::Copy {
            record,
            page,
            workspace_id,
            alias,
        } => {
            let page = page.as_ref().map(|p| p.resolve(aliases)).transpose()?;
            let outcome = engine
                .cascade()
                .copy(record.resolve(aliases)?, page, *workspace_id)
                .await?;
            if let Some(alias) = alias {
                aliases.insert(alias.clone(), outcome.root);
            }
        }
        Step::CopyPage {
            page,
            target,
            workspace_id,
            alias,
        } => {
            let target = target.as_ref().map(|t| t.resolve(aliases)).transpose()?;
            let outcome = engine
                .cascade()
                .copy_page(page.resolve(aliases)?, target, *workspace_id)
                .await?;
            if let Some(alias) = alias {
                aliases.insert(alias.clone(), outcome.root);
            }
        }
        Step::Localize {
            record,
            language_id,
            workspace_id,
            alias,
        } => {
            let localized = engine
                .cascade()
                .localize(record.resolve(aliases)?, *language_id, *workspace_id)
                .await?;
            if let Some(alias) = alias {
                aliases.insert(alias.clone(), localized.id);
            }
        }
        Step::Move { record, page } => {
            engine
                .cascade()
                .move_to_page(record.resolve(aliases)?, page.resolve(aliases)?)
                .await?;
        }
    }
    Ok(())
}
