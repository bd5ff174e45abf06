use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "blobver",
    about = "Versioned JSON collections on immutable blob storage",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file. Defaults to ./blobver.toml when present.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Namespace of the collection's version blobs.
    #[arg(long, global = true, default_value = "topics-store/")]
    pub prefix: String,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print the current collection of a key
    Read(ReadArgs),
    /// Write a JSON array as the new version of a key
    Write(WriteArgs),
    /// List the stored versions of a key, newest first
    Versions(KeyArgs),
    /// Delete versions beyond the retention window
    Prune(KeyArgs),
    /// Upload an initial collection for a key that has no versions yet
    Seed(SeedArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override the configured bind address.
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ReadArgs {
    pub key: String,
    /// Fixed-name blob to fall back to when the key has no versions.
    #[arg(long)]
    pub legacy: Option<String>,
}

#[derive(Args)]
pub struct WriteArgs {
    pub key: String,
    /// JSON array to write. Reads stdin when omitted.
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    /// Only write if the latest version is this pathname, or `absent`.
    #[arg(long)]
    pub expect: Option<String>,
}

#[derive(Args)]
pub struct SeedArgs {
    /// JSON array to upload.
    #[arg(short, long)]
    pub file: PathBuf,
    #[arg(long, default_value = "topics")]
    pub key: String,
    /// Write even if the key already has versions.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_read() {
        let cli = Cli::try_parse_from(["blobver", "read", "topics"]).unwrap();
        assert_eq!(cli.prefix, "topics-store/");
        if let Command::Read(args) = cli.command {
            assert_eq!(args.key, "topics");
            assert!(args.legacy.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_read_with_prefix_and_legacy() {
        let cli = Cli::try_parse_from(["blobver", "--prefix", "users-store/", "read", "users", "--legacy", "users.json"]).unwrap();
        assert_eq!(cli.prefix, "users-store/");
        if let Command::Read(args) = cli.command {
            assert_eq!(args.legacy.as_deref(), Some("users.json"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_write_from_file() {
        let cli = Cli::try_parse_from(["blobver", "write", "topics", "-f", "topics.json", "--expect", "absent"]).unwrap();
        if let Command::Write(args) = cli.command {
            assert_eq!(args.file, Some(PathBuf::from("topics.json")));
            assert_eq!(args.expect.as_deref(), Some("absent"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_write_from_stdin() {
        let cli = Cli::try_parse_from(["blobver", "write", "topics"]).unwrap();
        if let Command::Write(args) = cli.command {
            assert!(args.file.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_versions_and_prune() {
        let cli = Cli::try_parse_from(["blobver", "versions", "prefectures"]).unwrap();
        assert!(matches!(cli.command, Command::Versions(_)));
        let cli = Cli::try_parse_from(["blobver", "prune", "prefectures"]).unwrap();
        assert!(matches!(cli.command, Command::Prune(_)));
    }

    #[test]
    fn parse_seed() {
        let cli = Cli::try_parse_from(["blobver", "seed", "--file", "initial.json"]).unwrap();
        if let Command::Seed(args) = cli.command {
            assert_eq!(args.key, "topics");
            assert!(!args.force);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["blobver", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:8080".parse().unwrap()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["blobver", "--verbose", "versions", "k"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["blobver", "--format", "json", "read", "k"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::try_parse_from(["blobver", "-c", "/etc/blobver.toml", "read", "k"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/blobver.toml")));
    }
}
