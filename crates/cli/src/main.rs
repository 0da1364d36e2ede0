//! Administrative CLI for softdel.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde_json::Value;
use softdel_cascade::{CascadeEngine, CascadeError, CatalogGraph, DeleteMode, RelationGraph};
use softdel_core::config::AppConfig;
use softdel_core::{EntityRef, RelationVariant};
use softdel_metadata::{LedgerRepo, MetadataError, MetadataStore, RecordRepo};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "softdelctl")]
#[command(about = "Administrative CLI for softdel")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "SOFTDEL_CONFIG",
        default_value = "config/softdel.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert a new record
    Insert {
        /// Record type
        entity_type: String,
        /// Record id
        id: i64,
        /// Attribute as KEY=VALUE. VALUE is read as JSON, else as a string.
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, Value)>,
    },
    /// Print a record as JSON
    Show { entity_type: String, id: i64 },
    /// Delete a record and its active dependents
    Delete {
        entity_type: String,
        id: i64,
        /// Remove the row instead of marking it deleted (no cascade)
        #[arg(long, default_value_t = false)]
        irreversible: bool,
    },
    /// List a record's dependents per relation
    Dependents {
        entity_type: String,
        id: i64,
        /// Relation variant: active, deleted, archived or all
        #[arg(long, default_value = "active")]
        variant: RelationVariant,
    },
    /// Cascade ledger commands
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },
    /// Check metadata store connectivity
    Health,
}

#[derive(Subcommand, Debug)]
enum LedgerCommands {
    /// List booked cascade roots
    List,
    /// Check whether a record has been booked as a cascade root
    Check { entity_type: String, id: i64 },
}

fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty attribute name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Load configuration from an optional TOML file, overridden by `SOFTDEL_`
/// environment variables (`__` separates nested keys).
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if Path::new(path).exists() {
        tracing::debug!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    figment
        .merge(Env::prefixed("SOFTDEL_").split("__"))
        .extract()
        .context("failed to load configuration")
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn MetadataStore>> {
    config
        .validate()
        .map_err(|e| anyhow!("invalid configuration: {e}"))?;
    let catalog = Arc::new(config.catalog.build().context("invalid catalog")?);
    softdel_metadata::from_config(&config.metadata, catalog)
        .await
        .context("failed to initialize metadata store")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let store = open_store(&config).await?;

    match cli.command {
        Commands::Insert {
            entity_type,
            id,
            set,
        } => handle_insert(&store, &entity_type, id, set).await,
        Commands::Show { entity_type, id } => handle_show(&store, &entity_type, id).await,
        Commands::Delete {
            entity_type,
            id,
            irreversible,
        } => handle_delete(&store, EntityRef::new(entity_type, id), irreversible).await,
        Commands::Dependents {
            entity_type,
            id,
            variant,
        } => handle_dependents(&store, EntityRef::new(entity_type, id), variant).await,
        Commands::Ledger { command } => handle_ledger_command(&store, command).await,
        Commands::Health => {
            store
                .health_check()
                .await
                .context("metadata store health check failed")?;
            println!("Metadata store is healthy.");
            Ok(())
        }
    }
}

async fn handle_insert(
    store: &Arc<dyn MetadataStore>,
    entity_type: &str,
    id: i64,
    set: Vec<(String, Value)>,
) -> Result<()> {
    let schema = store
        .catalog()
        .get(entity_type)
        .ok_or_else(|| anyhow!("unknown entity type '{entity_type}'"))?;
    let mut record = schema.new_record(id);
    record.attributes.extend(set);

    match store.insert_record(&record).await {
        Ok(()) => {
            println!("Inserted {}", record.entity_ref());
            Ok(())
        }
        Err(MetadataError::Validation(errors)) => bail!(
            errors.human_readable(Some(&format!("Could not insert {}:", record.entity_ref())))
        ),
        Err(e) => Err(e).context("failed to insert record"),
    }
}

async fn handle_show(store: &Arc<dyn MetadataStore>, entity_type: &str, id: i64) -> Result<()> {
    let record = store
        .find_record(entity_type, id)
        .await?
        .ok_or_else(|| anyhow!("{entity_type}#{id} not found"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn handle_delete(
    store: &Arc<dyn MetadataStore>,
    entity: EntityRef,
    irreversible: bool,
) -> Result<()> {
    let mut record = store
        .find_record(&entity.entity_type, entity.id)
        .await?
        .ok_or_else(|| anyhow!("{entity} not found"))?;

    let mode = if irreversible {
        DeleteMode::Irreversible
    } else {
        DeleteMode::Reversible
    };
    let engine = CascadeEngine::from_store(store.clone());

    match engine.delete(&mut record, mode).await {
        Ok(()) if irreversible => println!("Removed {entity}"),
        Ok(()) => println!("Deleted {entity} and its active dependents"),
        Err(CascadeError::ValidationFailed {
            entity: failed,
            errors,
        }) => bail!(errors.human_readable(Some(&format!(
            "Could not delete {entity}: {failed} failed validation."
        )))),
        Err(e) => return Err(e).with_context(|| format!("failed to delete {entity}")),
    }
    Ok(())
}

fn flag(value: Option<bool>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

async fn handle_dependents(
    store: &Arc<dyn MetadataStore>,
    entity: EntityRef,
    variant: RelationVariant,
) -> Result<()> {
    let record = store
        .find_record(&entity.entity_type, entity.id)
        .await?
        .ok_or_else(|| anyhow!("{entity} not found"))?;

    let records: Arc<dyn RecordRepo> = store.clone();
    let graph = CatalogGraph::new(store.catalog().clone(), records);
    let relations = graph.relations_of(&record, variant).await?;

    if relations.is_empty() {
        println!("{} declares no relations.", entity.entity_type);
        return Ok(());
    }

    for dependents in relations {
        let accessor = variant.accessor(&dependents.relation);
        if dependents.records.is_empty() {
            println!("{accessor}: (none)");
            continue;
        }
        println!("{accessor}:");
        for dependent in dependents.records {
            println!(
                "  {:<32} deleted={:<6} archived={}",
                dependent.entity_ref().to_string(),
                flag(dependent.deleted),
                flag(dependent.archived)
            );
        }
    }
    Ok(())
}

async fn handle_ledger_command(
    store: &Arc<dyn MetadataStore>,
    command: LedgerCommands,
) -> Result<()> {
    match command {
        LedgerCommands::List => {
            let entries = store.list_ledger_entries().await?;
            if entries.is_empty() {
                println!("No ledger entries found.");
                return Ok(());
            }
            println!("{:<32} {:<10} Booked", "Root", "Archive");
            println!("{}", "-".repeat(72));
            for entry in entries {
                println!(
                    "{:<32} {:<10} {}",
                    entry.entity_ref().to_string(),
                    entry.in_archive,
                    entry.created_at
                );
            }
        }
        LedgerCommands::Check { entity_type, id } => {
            let entity = EntityRef::new(entity_type, id);
            match store
                .get_ledger_entry(&entity.entity_type, entity.id)
                .await?
            {
                Some(entry) => println!(
                    "{entity} booked at {} (archive: {})",
                    entry.created_at, entry.in_archive
                ),
                None => println!("{entity} is not booked"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn write_config(dir: &TempDir) -> String {
        let db_path = dir.path().join("softdel.db");
        let config = format!(
            r#"
[metadata]
type = "sqlite"
path = "{}"

[[catalog.entities]]
entity_type = "orders"
relations = [{{ name = "items", target = "order_items", foreign_key = "order_id" }}]

[[catalog.entities]]
entity_type = "order_items"
rules = [{{ rule = "required", field = "sku" }}]
"#,
            db_path.display()
        );
        let config_path = dir.path().join("softdel.toml");
        std::fs::write(&config_path, config).unwrap();
        config_path.display().to_string()
    }

    fn cli(config: &str, args: &[&str]) -> Cli {
        let mut argv = vec!["softdelctl", "--config", config];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("order_id=1").unwrap(),
            ("order_id".to_string(), Value::from(1))
        );
        assert_eq!(
            parse_assignment("sku=A-1").unwrap(),
            ("sku".to_string(), Value::from("A-1"))
        );
        assert_eq!(
            parse_assignment("note=a=b").unwrap(),
            ("note".to_string(), Value::from("a=b"))
        );
        assert!(parse_assignment("missing").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_cli_parses_commands() {
        let parsed = Cli::try_parse_from([
            "softdelctl",
            "insert",
            "order_items",
            "10",
            "--set",
            "order_id=1",
            "--set",
            "sku=A-1",
        ])
        .unwrap();
        match parsed.command {
            Commands::Insert { entity_type, id, set } => {
                assert_eq!(entity_type, "order_items");
                assert_eq!(id, 10);
                assert_eq!(set.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let parsed =
            Cli::try_parse_from(["softdelctl", "dependents", "orders", "1", "--variant", "all"])
                .unwrap();
        assert!(matches!(
            parsed.command,
            Commands::Dependents {
                variant: RelationVariant::All,
                ..
            }
        ));

        assert!(
            Cli::try_parse_from(["softdelctl", "dependents", "orders", "1", "--variant", "gone"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["softdelctl", "delete", "orders", "x"]).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempdir().unwrap();
        let path = write_config(&dir);
        let config = load_config(&path).unwrap();
        let catalog = config.catalog.build().unwrap();
        assert_eq!(catalog.relations_of("orders").len(), 1);
        assert!(catalog.get("order_items").is_some());
    }

    #[tokio::test]
    async fn test_insert_then_delete_cascades() {
        let dir = tempdir().unwrap();
        let config = write_config(&dir);

        run(cli(&config, &["insert", "orders", "1"])).await.unwrap();
        run(cli(
            &config,
            &["insert", "order_items", "10", "--set", "order_id=1", "--set", "sku=A-1"],
        ))
        .await
        .unwrap();
        run(cli(&config, &["delete", "orders", "1"])).await.unwrap();
        run(cli(&config, &["ledger", "check", "orders", "1"]))
            .await
            .unwrap();

        let store = open_store(&load_config(&config).unwrap()).await.unwrap();
        let item = store.find_record("order_items", 10).await.unwrap().unwrap();
        assert_eq!(item.deleted, Some(true));
        assert!(store.ledger_contains("orders", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_reports_validation_errors() {
        let dir = tempdir().unwrap();
        let config = write_config(&dir);

        let err = run(cli(
            &config,
            &["insert", "order_items", "11", "--set", "order_id=1"],
        ))
        .await
        .unwrap_err();
        assert!(err.to_string().contains("sku cannot be blank."));
    }

    #[tokio::test]
    async fn test_delete_missing_record_fails() {
        let dir = tempdir().unwrap();
        let config = write_config(&dir);

        let err = run(cli(&config, &["delete", "orders", "404"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("orders#404 not found"));
    }
}
