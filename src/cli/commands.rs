//! CLI command implementations
//!
//! The restore command owns the process wiring: logging, the Tokio runtime
//! that drives object store I/O, signal and deadline cancellation, the
//! driver registry and the credential source. The coordinator itself runs
//! synchronously on the main thread.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::credentials::SecretDirectory;
use crate::observability::init_logging;
use crate::restore::{RestoreCoordinator, RestoreRequest};
use crate::store::DriverRegistry;

use super::args::{Command, RestoreArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Fallback source of the worker name
pub const HOSTNAME_FILE: &str = "/etc/hostname";

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Restore(args) => restore(args),
    }
}

/// Restore this worker's shard
///
/// Writes one JSON outcome object to stdout on success and on restore
/// failure. Exit status is binary.
pub fn restore(args: RestoreArgs) -> CliResult<()> {
    init_logging(args.log_format, &args.log_level)?;

    let runtime = build_runtime()?;
    let cancel = CancellationToken::new();
    runtime.spawn(cancel_on_signal(cancel.clone()));
    if let Some(secs) = args.timeout_secs {
        runtime.spawn(cancel_after(Duration::from_secs(secs), cancel.clone()));
    }

    let hostname = env::var("HOSTNAME").ok();
    let worker_name = resolve_worker_name(
        args.hostname.as_deref(),
        hostname.as_deref(),
        Path::new(HOSTNAME_FILE),
    )?;

    let request = RestoreRequest {
        bucket_uri: args.src,
        destination: args.dst,
        worker_name,
        secret_name: args.secret_name,
        restore_id: args.restore_id,
    };
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        worker = %request.worker_name,
        destination = %request.destination.display(),
        restore_id = %request.restore_id,
        "starting restore"
    );

    let registry = DriverRegistry::with_default_drivers(runtime.handle().clone());
    let secrets = SecretDirectory::new(args.secrets_dir);
    let coordinator = RestoreCoordinator::new(&registry, &secrets, cancel);

    match coordinator.run(&request) {
        Ok(outcome) => write_response(serde_json::to_value(&outcome)?),
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "restore failed");
            write_error(e.code().as_str(), &e.to_string())?;
            Err(CliError::restore_failed(&e))
        }
    }
}

fn build_runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .thread_name("shard-restore-io")
        .enable_all()
        .build()
        .map_err(|e| CliError::io_error(format!("Failed to start async runtime: {}", e)))
}

/// Pick the worker name: explicit flag, then `$HOSTNAME`, then the hostname file
fn resolve_worker_name(
    explicit: Option<&str>,
    hostname_env: Option<&str>,
    hostname_file: &Path,
) -> CliResult<String> {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    if let Some(name) = explicit.and_then(non_empty) {
        return Ok(name);
    }
    if let Some(name) = hostname_env.and_then(non_empty) {
        return Ok(name);
    }

    let contents = fs::read_to_string(hostname_file).map_err(|e| {
        CliError::config_error(format!(
            "No worker name given and {} is unreadable: {}",
            hostname_file.display(),
            e
        ))
    })?;
    non_empty(&contents).ok_or_else(|| {
        CliError::config_error(format!(
            "No worker name given and {} is empty",
            hostname_file.display()
        ))
    })
}

/// Cancel the restore on SIGINT or SIGTERM
async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(not(unix))]
    async fn wait_for_terminate() {
        std::future::pending().await
    }

    #[cfg(unix)]
    async fn wait_for_terminate() {
        use tokio::signal::unix;

        match unix::signal(unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                tracing::warn!("received SIGTERM");
            }
            Err(e) => {
                tracing::warn!(error = %e, "unable to register for SIGTERM signals");
                std::future::pending().await
            }
        }
    }

    async fn wait_for_interrupt() {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::warn!("received SIGINT"),
            Err(e) => {
                tracing::warn!(error = %e, "unable to register for SIGINT signals");
                std::future::pending().await
            }
        }
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        _ = wait_for_terminate() => (),
        _ = wait_for_interrupt() => (),
    }
    cancel.cancel();
}

/// Cancel the restore once `deadline` elapses
async fn cancel_after(deadline: Duration, cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(deadline) => {
            tracing::warn!(timeout_secs = deadline.as_secs(), "restore deadline elapsed");
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_name_wins() {
        let name = resolve_worker_name(Some("hz-1"), Some("other-2"), Path::new("/nonexistent"));
        assert_eq!(name.unwrap(), "hz-1");
    }

    #[test]
    fn test_hostname_env_fallback() {
        let name = resolve_worker_name(Some("  "), Some("pod-4\n"), Path::new("/nonexistent"));
        assert_eq!(name.unwrap(), "pod-4");
    }

    #[test]
    fn test_hostname_file_fallback() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("hostname");
        fs::write(&file, "cluster-7\n").unwrap();

        let name = resolve_worker_name(None, None, &file).unwrap();
        assert_eq!(name, "cluster-7");
    }

    #[test]
    fn test_no_name_source() {
        let temp = TempDir::new().unwrap();
        let err = resolve_worker_name(None, Some(""), &temp.path().join("missing")).unwrap_err();
        assert_eq!(err.code_str(), "RESTORE_CLI_CONFIG_ERROR");

        let file = temp.path().join("hostname");
        fs::write(&file, "\n").unwrap();
        assert!(resolve_worker_name(None, None, &file).is_err());
    }

    #[test]
    fn test_deadline_cancels_token() {
        let runtime = build_runtime().unwrap();
        let cancel = CancellationToken::new();

        runtime.block_on(cancel_after(Duration::from_millis(10), cancel.clone()));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_signal_task_exits_when_cancelled() {
        let runtime = build_runtime().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        runtime.block_on(cancel_on_signal(cancel.clone()));
        assert!(cancel.is_cancelled());
    }
}
