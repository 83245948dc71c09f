//! CLI argument definitions using clap
//!
//! Commands:
//! - shard-restore restore --src <bucket-uri> [--dst <path>] [--hostname <name>]
//!
//! Every flag can also be set through its `RESTORE_*` environment variable;
//! an explicit flag wins.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::observability::LogFormat;

/// shard-restore - Restore a worker's shard data from bucket backups
#[derive(Parser, Debug)]
#[command(name = "shard-restore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Restore this worker's shard from the latest backup generation
    Restore(RestoreArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RestoreArgs {
    /// Bucket URI (s3://, gs://, azblob:// or file://) with optional prefix and options
    #[arg(long, env = "RESTORE_BUCKET")]
    pub src: String,

    /// Destination root holding recovery folders
    #[arg(long, env = "RESTORE_DESTINATION", default_value = "/data/persistence/backup")]
    pub dst: PathBuf,

    /// Worker name; defaults to $HOSTNAME, then /etc/hostname
    #[arg(long, env = "RESTORE_HOSTNAME")]
    pub hostname: Option<String>,

    /// Credential secret name; empty uses ambient provider credentials
    #[arg(long, env = "RESTORE_SECRET_NAME", default_value = "")]
    pub secret_name: String,

    /// Restore identifier recorded in the completion lock name
    #[arg(long, env = "RESTORE_ID", default_value = "")]
    pub restore_id: String,

    /// Directory where secrets are mounted, one subdirectory per secret
    #[arg(long, env = "RESTORE_SECRETS_DIR", default_value = "/etc/restore/secrets")]
    pub secrets_dir: PathBuf,

    /// Abort the restore after this many seconds
    #[arg(long, env = "RESTORE_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Log output format
    #[arg(long, env = "RESTORE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "RESTORE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restore_args(argv: &[&str]) -> RestoreArgs {
        let mut full = vec!["shard-restore", "restore"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Restore(args) => args,
        }
    }

    #[test]
    fn test_defaults() {
        let args = restore_args(&["--src", "s3://backups"]);
        assert_eq!(args.src, "s3://backups");
        assert_eq!(args.dst, PathBuf::from("/data/persistence/backup"));
        assert_eq!(args.secrets_dir, PathBuf::from("/etc/restore/secrets"));
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_explicit_flags() {
        let args = restore_args(&[
            "--src",
            "gs://b/prefix",
            "--dst",
            "/tmp/d",
            "--hostname",
            "hz-2",
            "--secret-name",
            "bucket-creds",
            "--restore-id",
            "r1",
            "--timeout-secs",
            "30",
            "--log-format",
            "text",
        ]);
        assert_eq!(args.hostname.as_deref(), Some("hz-2"));
        assert_eq!(args.secret_name, "bucket-creds");
        assert_eq!(args.restore_id, "r1");
        assert_eq!(args.timeout_secs, Some(30));
        assert_eq!(args.log_format, LogFormat::Text);
    }

    #[test]
    fn test_src_is_required() {
        let result = Cli::try_parse_from(["shard-restore", "restore", "--dst", "/tmp/d"]);
        if std::env::var_os("RESTORE_BUCKET").is_none() {
            assert!(result.is_err());
        }
    }
}
