use std::path::Path;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use relkeeper::common::write_string_to_file;
use relkeeper::config::EngineConfig;
use relkeeper::database::{migrate_database, MigrateDirection};
use relkeeper::engine::RelationEngine;
use relkeeper::harness::{Fixture, Scenario};
use relkeeper::services::RelationContext;
use relkeeper::sitemap::{SitemapRegistry, SitemapRequest, XmlSitemapRenderer};

const DEFAULT_CONFIG: &str = "relkeeper.yaml";

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// Engine configuration; `relkeeper.yaml` is used when present
    #[clap(short, long, global = true)]
    config: Option<String>,
    /// Database path, overrides the configuration
    #[clap(short, long, global = true)]
    database: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    Fixture {
        #[clap(subcommand)]
        command: FixtureCommands,
    },
    /// Run YAML scenarios, each against a fresh in-memory database
    Scenario {
        #[clap(required = true)]
        files: Vec<String>,
    },
    /// Print the resolved relations of a record
    Resolve {
        record: i32,
        #[clap(long, default_value = "0")]
        language: i32,
        #[clap(long, default_value = "0")]
        workspace: i32,
    },
    /// Print the rendered view of a page
    Page {
        page: i32,
        #[clap(long, default_value = "0")]
        language: i32,
        #[clap(long, default_value = "0")]
        workspace: i32,
    },
    /// Check ordering invariants of a record's relations
    Verify {
        record: i32,
        #[clap(long, default_value = "0")]
        language: i32,
        #[clap(long, default_value = "0")]
        workspace: i32,
    },
    Sitemap {
        #[clap(long)]
        base_url: String,
        /// Sitemap key; the index is rendered when omitted
        #[clap(long)]
        sitemap: Option<String>,
        #[clap(long, default_value = "0")]
        page: usize,
        #[clap(long)]
        page_type: Option<u32>,
        #[clap(long)]
        sitemap_type: Option<String>,
        #[clap(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init,
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
    },
}

#[derive(Subcommand, Debug)]
enum FixtureCommands {
    /// Load the many-to-many fixture into the database
    Load,
}

fn load_config(path: Option<&str>) -> Result<Option<EngineConfig>> {
    match path {
        Some(path) => Ok(Some(EngineConfig::load(path)?)),
        None if Path::new(DEFAULT_CONFIG).exists() => Ok(Some(EngineConfig::load(DEFAULT_CONFIG)?)),
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let config = load_config(args.config.as_deref())?;
    let engine_config = || {
        let mut config = config.clone().unwrap_or_default();
        if args.database.is_some() {
            config.database.path = args.database.clone();
        }
        config
    };

    match args.command {
        Commands::Db { command } => match command {
            DbCommands::Init => {
                let config = engine_config();
                info!("Initializing database: {:?}", config.database.path);
                migrate_database(config.database.path.as_deref(), MigrateDirection::Up).await?;
            }
            DbCommands::Migrate { direction } => {
                let config = engine_config();
                info!("Running database migration: {:?}", direction);
                migrate_database(config.database.path.as_deref(), direction).await?;
            }
        },
        Commands::Fixture { command } => match command {
            FixtureCommands::Load => {
                let engine = RelationEngine::connect(engine_config()).await?;
                Fixture::many_to_many().load(&engine).await?;
            }
        },
        Commands::Scenario { files } => {
            let mut failed = 0;
            for file in &files {
                let scenario = Scenario::load(file)?;
                let mut scenario_config = config.clone().unwrap_or_else(Fixture::config);
                scenario_config.database.path = Some(":memory:".to_string());
                let engine = RelationEngine::connect(scenario_config).await?;

                let report = scenario.run(&engine).await?;
                if report.passed() {
                    println!("PASS {} ({})", report.name, file);
                } else {
                    failed += 1;
                    println!("FAIL {} ({})", report.name, file);
                    for failure in &report.failures {
                        println!("  - {}", failure);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} scenarios failed", failed, files.len());
            }
        }
        Commands::Resolve {
            record,
            language,
            workspace,
        } => {
            let engine = RelationEngine::connect(engine_config()).await?;
            let resolved = engine.verifier().resolve(record, language, workspace).await?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Commands::Page {
            page,
            language,
            workspace,
        } => {
            let engine = RelationEngine::connect(engine_config()).await?;
            let view = engine.verifier().resolve_page(page, language, workspace).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Verify {
            record,
            language,
            workspace,
        } => {
            let engine = RelationEngine::connect(engine_config()).await?;
            let report = engine
                .verifier()
                .verify(record, RelationContext::new(language, workspace))
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_consistent() {
                warn!("Record {} has {} violations", record, report.violations.len());
            }
        }
        Commands::Sitemap {
            base_url,
            sitemap,
            page,
            page_type,
            sitemap_type,
            output,
        } => {
            let engine = RelationEngine::connect(engine_config()).await?;
            let registry = SitemapRegistry::with_records_provider(engine.db().clone());
            let renderer = XmlSitemapRenderer::new(engine.config().sitemap.clone(), registry)?;
            let request = SitemapRequest {
                base_url,
                sitemap,
                page,
                page_type,
            };
            let xml = renderer.render(&request, sitemap_type.as_deref()).await?;
            match output {
                Some(path) => {
                    write_string_to_file(&path, &xml)?;
                    info!("Wrote sitemap to {}", path);
                }
                None => print!("{}", xml),
            }
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("handlebars=off,{}", log_level)))
        .without_time()
        .init();
}
