//! CLI assembly: merge config overrides, run the wrapper, report fatal outcomes.
use relaylog_core::config::{self, AppConfig};
use relaylog_core::error::CliError;
use relaylog_core::{run_wrapper, FatalReason};

use crate::commands::cli::Args;

pub fn load_config(args: &Args) -> Result<AppConfig, CliError> {
    let mut cfg = match args.config.as_deref() {
        Some(path) => config::load_from_path(path),
        None => config::load_default(),
    }
    .map_err(|e| CliError::Config(e.to_string()))?;

    apply_overrides(&mut cfg, args);
    cfg.validate().map_err(CliError::Config)?;
    Ok(cfg)
}

/// CLI flags take precedence over files and environment.
pub fn apply_overrides(cfg: &mut AppConfig, args: &Args) {
    if let Some(host) = &args.host {
        cfg.collector.host = host.clone();
    }
    if let Some(port) = args.port {
        cfg.collector.port = port;
    }
    if let Some(ms) = args.connect_timeout_ms {
        cfg.collector.connect_timeout_ms = ms;
    }
    if let Some(size) = args.buffer_size {
        cfg.delivery.buffer_size = size;
    }
    if let Some(secs) = args.retry_interval {
        cfg.delivery.retry_interval_secs = secs;
    }
    if let Some(name) = &args.app_name {
        cfg.record.app_name = name.clone();
    }
}

#[tracing::instrument(name = "cli.run_app", skip_all)]
pub async fn run_app(args: &Args, cfg: &AppConfig) -> Result<i32, CliError> {
    if args.command.is_empty() {
        return Err(CliError::MissingCommand);
    }
    tracing::debug!(
        collector.host = %cfg.collector.host,
        collector.port = cfg.collector.port,
        buffer_size = cfg.delivery.buffer_size,
        retry_interval_secs = cfg.delivery.retry_interval_secs,
        "starting wrapper"
    );

    let outcome = run_wrapper(&args.command, cfg).await?;

    // Diagnostics already went through tracing when console logging is on.
    let console_logging = cfg.logging.enabled && cfg.logging.console;
    if let (Some(fatal), false) = (outcome.fatal, console_logging) {
        eprintln!("relaylog: {}", describe_fatal(fatal, cfg));
    }
    Ok(outcome.exit_code())
}

pub fn describe_fatal(fatal: FatalReason, cfg: &AppConfig) -> String {
    let endpoint = format!("{}:{}", cfg.collector.host, cfg.collector.port);
    match fatal {
        FatalReason::BootstrapExhausted => format!(
            "failed to connect to collector ({endpoint}) within {} seconds; child terminated",
            cfg.delivery.bootstrap_window_secs
        ),
        FatalReason::DrainTimeout => {
            format!("flushing logs to collector ({endpoint}) timed out; giving up")
        }
        FatalReason::WorkerFailed => "delivery task ended unexpectedly".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn trailing_command_keeps_its_own_flags() {
        let args = Args::try_parse_from([
            "relaylog",
            "--host",
            "logs.example",
            "--retry-interval",
            "2",
            "ls",
            "-la",
            "--host",
            "inner",
        ])
        .unwrap();
        assert_eq!(args.host.as_deref(), Some("logs.example"));
        assert_eq!(args.retry_interval, Some(2));
        assert_eq!(args.command, vec!["ls", "-la", "--host", "inner"]);
    }

    #[test]
    fn no_command_parses_to_empty() {
        let args = Args::try_parse_from(["relaylog", "--port", "6514"]).unwrap();
        assert!(args.command.is_empty());
        assert_eq!(args.port, Some(6514));
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let args = Args::try_parse_from([
            "relaylog",
            "--port",
            "1514",
            "--buffer-size",
            "1",
            "--app-name",
            "worker",
            "true",
        ])
        .unwrap();
        let mut cfg = AppConfig::default();
        apply_overrides(&mut cfg, &args);

        assert_eq!(cfg.collector.host, "localhost");
        assert_eq!(cfg.collector.port, 1514);
        assert_eq!(cfg.delivery.buffer_size, 1);
        assert_eq!(cfg.delivery.retry_interval_secs, 5);
        assert_eq!(cfg.record.app_name, "worker");
    }

    #[test]
    fn zero_buffer_size_is_a_config_error() {
        let args = Args::try_parse_from(["relaylog", "--buffer-size", "0", "true"]).unwrap();
        let mut cfg = AppConfig::default();
        apply_overrides(&mut cfg, &args);
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn missing_command_is_rejected() {
        let args = Args::try_parse_from(["relaylog"]).unwrap();
        let err = run_app(&args, &AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, CliError::MissingCommand));
        assert_eq!(err.to_string(), "No command provided to run.");
    }

    #[test]
    fn fatal_descriptions_name_the_collector() {
        let cfg = AppConfig::default();
        let msg = describe_fatal(FatalReason::BootstrapExhausted, &cfg);
        assert!(msg.contains("localhost:514"));
        assert!(msg.contains("30 seconds"));
        assert!(describe_fatal(FatalReason::DrainTimeout, &cfg).contains("giving up"));
    }
}
