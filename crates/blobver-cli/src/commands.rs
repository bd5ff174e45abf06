use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use blobver_server::{BlobverConfig, BlobverServer};
use blobver_types::LogicalKey;
use blobver_versioned::{Expected, SnapshotSource, VersionedStore, WriteOutcome};
use colored::Colorize;
use serde_json::{json, Value};

use crate::cli::*;

const DEFAULT_CONFIG_FILE: &str = "blobver.toml";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Read(args) => cmd_read(&config, &cli.prefix, args, &cli.format).await,
        Command::Write(args) => cmd_write(&config, &cli.prefix, args, &cli.format).await,
        Command::Versions(args) => cmd_versions(&config, &cli.prefix, args, &cli.format).await,
        Command::Prune(args) => cmd_prune(&config, &cli.prefix, args, &cli.format).await,
        Command::Seed(args) => cmd_seed(&config, &cli.prefix, args, &cli.format).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BlobverConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => PathBuf::from(DEFAULT_CONFIG_FILE),
        None => return Ok(BlobverConfig::default()),
    };
    BlobverConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

fn open_store(config: &BlobverConfig, prefix: &str, legacy: Option<String>) -> anyhow::Result<VersionedStore> {
    let mut versioned = config.versioned(prefix);
    versioned.legacy_pathname = legacy;
    let store = config.object_backend()?.versioned(versioned)?;
    if !store.is_configured() {
        bail!("object store is not configured (set {} or choose another backend)", config.http.token_env);
    }
    Ok(store)
}

fn parse_key(key: &str) -> anyhow::Result<LogicalKey> {
    LogicalKey::new(key).with_context(|| format!("invalid key {key:?}"))
}

/// Read a JSON array from `file`, or stdin when `None`.
fn read_items(file: Option<&Path>) -> anyhow::Result<Vec<Value>> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
            text
        }
    };
    match serde_json::from_str::<Value>(&text).context("parsing JSON input")? {
        Value::Array(items) => Ok(items),
        other => bail!("expected a JSON array, got {}", kind_of(&other)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_expected(expect: Option<&str>) -> Expected {
    match expect {
        None => Expected::Any,
        Some("absent") => Expected::Absent,
        Some(pathname) => Expected::Version(pathname.to_string()),
    }
}

async fn cmd_serve(mut config: BlobverConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!("blobver server on {} (backend: {:?})", config.bind_addr.to_string().bold(), config.backend);
    BlobverServer::new(config)?.serve().await?;
    Ok(())
}

async fn cmd_read(config: &BlobverConfig, prefix: &str, args: ReadArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let store = open_store(config, prefix, args.legacy)?;
    let snapshot = store.read_latest::<Value>(&key).await?;
    let source = match &snapshot.source {
        SnapshotSource::Empty => None,
        SnapshotSource::Versioned(info) => Some(info.pathname().to_string()),
        SnapshotSource::Legacy(blob) => Some(blob.pathname.clone()),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot.items)?),
        OutputFormat::Text => {
            match source {
                Some(source) if snapshot.is_legacy() => println!("{} {}", "legacy:".yellow(), source),
                Some(source) => println!("{} {}", "version:".green(), source),
                None => println!("{}", "no versions".dimmed()),
            }
            println!("{} items", snapshot.items.len().to_string().bold());
            for item in &snapshot.items {
                println!("  {item}");
            }
        }
    }
    Ok(())
}

fn print_outcome(outcome: &WriteOutcome, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let value = match outcome {
                WriteOutcome::Persisted { version, prune } => json!({
                    "persisted": true,
                    "version": version.pathname(),
                    "prune": prune,
                }),
                WriteOutcome::Skipped { reason } => json!({ "persisted": false, "reason": reason }),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => match outcome {
            WriteOutcome::Persisted { version, prune } => {
                println!("{} Wrote {}", "✓".green().bold(), version.pathname().yellow());
                for deleted in &prune.deleted {
                    println!("  {} {}", "pruned:".dimmed(), deleted);
                }
                if let Some(failure) = &prune.failure {
                    println!("  {} {}", "prune failed:".red(), failure);
                }
            }
            WriteOutcome::Skipped { reason } => {
                println!("{} Write skipped: {}", "!".yellow().bold(), reason);
            }
        },
    }
    Ok(())
}

async fn cmd_write(config: &BlobverConfig, prefix: &str, args: WriteArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let items = read_items(args.file.as_deref())?;
    let store = open_store(config, prefix, None)?;
    let outcome = store
        .write_new_version(&key, &items, &parse_expected(args.expect.as_deref()))
        .await?;
    print_outcome(&outcome, format)
}

async fn cmd_seed(config: &BlobverConfig, prefix: &str, args: SeedArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let items = read_items(Some(args.file.as_path()))?;
    let store = open_store(config, prefix, None)?;
    let expected = if args.force { Expected::Any } else { Expected::Absent };
    let outcome = store
        .write_new_version(&key, &items, &expected)
        .await
        .with_context(|| format!("seeding {key} (use --force to write over existing versions)"))?;
    print_outcome(&outcome, format)
}

async fn cmd_versions(config: &BlobverConfig, prefix: &str, args: KeyArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let store = open_store(config, prefix, None)?;
    let versions = store.versions(&key).await?;

    match format {
        OutputFormat::Json => {
            let rows: Vec<Value> = versions
                .iter()
                .map(|v| {
                    json!({
                        "pathname": v.pathname(),
                        "stamp": v.name.stamp(),
                        "uploadedAt": v.blob.uploaded_at,
                        "size": v.blob.size,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if versions.is_empty() {
                println!("No versions of {}.", key.to_string().bold());
            }
            for (i, v) in versions.iter().enumerate() {
                let marker = if i == 0 { "*".green().bold() } else { " ".normal() };
                println!(
                    "{} {}  {}  {} bytes",
                    marker,
                    v.pathname().yellow(),
                    v.blob.uploaded_at.to_rfc3339().dimmed(),
                    v.blob.size
                );
            }
        }
    }
    Ok(())
}

async fn cmd_prune(config: &BlobverConfig, prefix: &str, args: KeyArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let store = open_store(config, prefix, None)?;
    let report = store.prune(&key).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!(
                "{} Prune: {} removed, {} kept.",
                "✓".green(),
                report.deleted.len().to_string().bold(),
                report.retained.len()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_flag() {
        assert_eq!(parse_expected(None), Expected::Any);
        assert_eq!(parse_expected(Some("absent")), Expected::Absent);
        assert_eq!(
            parse_expected(Some("topics-store/topics-1.json")),
            Expected::Version("topics-store/topics-1.json".into())
        );
    }

    #[test]
    fn read_items_requires_array() {
        let dir = tempfile::tempdir().unwrap();
        let array = dir.path().join("a.json");
        std::fs::write(&array, r#"[{"id":"x"}, 2]"#).unwrap();
        assert_eq!(read_items(Some(array.as_path())).unwrap().len(), 2);

        let object = dir.path().join("o.json");
        std::fs::write(&object, r#"{"id":"x"}"#).unwrap();
        let err = read_items(Some(object.as_path())).unwrap_err();
        assert!(err.to_string().contains("an object"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/blobver.toml"))).is_err());
    }

    #[tokio::test]
    async fn fs_backend_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BlobverConfig::default();
        config.backend = blobver_server::BackendKind::Fs;
        config.fs.root = dir.path().to_path_buf();

        let store = open_store(&config, "topics-store/", None).unwrap();
        let key = parse_key("topics").unwrap();
        let items = vec![json!({ "id": "a" })];
        store.write_new_version(&key, &items, &Expected::Absent).await.unwrap();

        let reopened = open_store(&config, "topics-store/", None).unwrap();
        let snapshot = reopened.read_latest::<Value>(&key).await.unwrap();
        assert_eq!(snapshot.items, items);
    }
}
