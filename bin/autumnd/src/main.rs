//! ---
//! autumn_section: "05-binaries"
//! autumn_subsection: "binary"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Binary entrypoint for the Autumn daemon."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::{Context, Result};
use autumn_common::{
    init_tracing, parse_assignment, ConfigurationResolver, LogFormat, LoggingConfig,
    OverrideProperties, Properties,
};
use autumn_service::{ModuleRef, ServiceOrchestrator};
use autumn_web::{enabled_web_services, WebModule};
use clap::{Parser, ValueEnum};
use tokio::runtime::Builder;
use tokio::signal;
use tracing::{info, warn};

const DEFAULT_CONFIGURATION: &str = "/autumn.properties";
const SERVICE_THREAD_NAME: &str = "autumn-service";

#[derive(Debug, Parser)]
#[command(author, version, about = "Autumn service daemon", long_about = None)]
struct Cli {
    #[arg(
        long = "config",
        value_name = "NAME",
        default_value = DEFAULT_CONFIGURATION,
        help = "Configuration bundle to declare; repeat for several"
    )]
    configs: Vec<String>,

    #[arg(
        short = 'D',
        long = "define",
        value_name = "KEY=VALUE",
        value_parser = parse_assignment,
        help = "Override property applied before configuration is resolved"
    )]
    defines: Vec<(String, String)>,

    #[arg(long, value_enum, env = "AUTUMN_LOG_FORMAT", help = "Override the log output format")]
    log_format: Option<CliLogFormat>,

    #[arg(long, value_name = "N", help = "Worker threads for the service runtime")]
    worker_threads: Option<usize>,

    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 30,
        help = "Seconds to wait for services to become healthy and to stop"
    )]
    timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliLogFormat {
    Json,
    Pretty,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Json => LogFormat::StructuredJson,
            CliLogFormat::Pretty => LogFormat::Pretty,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = OverrideProperties::global();
    for (key, value) in &cli.defines {
        overrides.set(key.as_str(), value.as_str());
    }

    let resolver = ConfigurationResolver::system();
    let mut logging = logging_config(&resolver, &cli.configs)?;
    if let Some(format) = cli.log_format {
        logging.format = format.into();
    }
    init_tracing("autumnd", &logging)?;

    let mut builder = Builder::new_multi_thread();
    builder.thread_name(SERVICE_THREAD_NAME).enable_all();
    if let Some(threads) = cli.worker_threads {
        builder.worker_threads(threads);
    }
    let runtime = builder
        .build()
        .context("failed to build service runtime")?;

    let web_services = enabled_web_services(&resolver)?;
    info!(
        configurations = ?cli.configs,
        overrides = overrides.len(),
        web_services = web_services.len(),
        "declaring application"
    );

    let mut orchestrator =
        ServiceOrchestrator::with_resolver(resolver).with_runtime(runtime.handle().clone());
    orchestrator
        .add_configurations(cli.configs.iter().map(String::as_str))?
        .add_module(ModuleRef::of::<WebModule>())?
        .add_services(web_services)?;
    orchestrator.start()?;

    let timeout = Duration::from_secs(cli.timeout);
    runtime.block_on(async {
        match orchestrator.await_healthy(timeout).await {
            Ok(()) => info!("daemon running; waiting for termination signal"),
            Err(err) => warn!(error = %err, states = ?orchestrator.service_states(), "services did not all become healthy"),
        }

        signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
        info!("ctrl-c received; shutting down");
        orchestrator.stop();
        if let Err(err) = orchestrator.await_stopped(timeout).await {
            warn!(error = %err, "services did not stop cleanly");
        }
        Ok::<_, anyhow::Error>(())
    })?;

    runtime.shutdown_timeout(Duration::from_secs(5));
    Ok(())
}

/// Logging settings come from the declared bundles so that they apply before
/// the orchestrator itself starts logging.
fn logging_config(resolver: &ConfigurationResolver, configs: &[String]) -> Result<LoggingConfig> {
    let mut composite = Properties::new();
    for name in configs {
        composite.merge_absent(&resolver.resolve_bundle(name));
    }
    Ok(LoggingConfig::resolve(resolver, &composite)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_declare_the_standard_bundle() {
        let cli = Cli::try_parse_from(["autumnd"]).expect("defaults parse");
        assert_eq!(cli.configs, vec![DEFAULT_CONFIGURATION.to_owned()]);
        assert!(cli.defines.is_empty());
        assert_eq!(cli.timeout, 30);
    }

    #[test]
    fn repeated_configs_and_defines_are_collected() {
        let cli = Cli::try_parse_from([
            "autumnd",
            "--config",
            "/app.properties",
            "--config",
            "/web.properties",
            "-D",
            "application.http.port=9090",
            "--define",
            "empty=",
            "--log-format",
            "pretty",
        ])
        .expect("valid arguments");
        assert_eq!(cli.configs, vec!["/app.properties", "/web.properties"]);
        assert_eq!(
            cli.defines,
            vec![
                ("application.http.port".to_owned(), "9090".to_owned()),
                ("empty".to_owned(), String::new()),
            ]
        );
        assert_eq!(cli.log_format, Some(CliLogFormat::Pretty));
    }

    #[test]
    fn malformed_define_is_rejected() {
        assert!(Cli::try_parse_from(["autumnd", "-D", "no-separator"]).is_err());
        assert!(Cli::try_parse_from(["autumnd", "-D", "=value"]).is_err());
    }
}
