//! Command line runtime
//!
//! Loads a scenario descriptor, builds the transport for the chosen protocol, runs the scenario
//! to completion and writes the report.
use crate::error::RuntimeError;
use crate::report::{self, ReportFormat};
use clap::{Parser, ValueEnum};
use stampede::{HttpTransport, RpcTransport, Scenario, Transport};
use stampede_core::{RunStatistics, ScenarioConfig};
use std::path::PathBuf;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_RPC_TARGET: &str = "http://localhost:50051";
pub const DEFAULT_HTTP_TARGET: &str = "http://localhost:3001/api/naive";
pub const DEFAULT_LOG_FILTER: &str = "stampede=info";

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Protocol {
    /// Persistent HTTP/2 channel per client, one unary call per iteration
    #[default]
    Rpc,
    /// One JSON POST per iteration over a shared client
    Http,
}

impl Protocol {
    pub fn default_target(&self) -> &'static str {
        match self {
            Protocol::Rpc => DEFAULT_RPC_TARGET,
            Protocol::Http => DEFAULT_HTTP_TARGET,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "stampede", version, about = "Stage-driven load generator")]
pub struct StampedeCli {
    /// Scenario descriptor (.json or .toml)
    #[arg(short, long)]
    pub scenario: PathBuf,

    /// Endpoint under test. Defaults depend on the protocol.
    #[arg(short, long)]
    pub target: Option<String>,

    #[arg(short, long, value_enum, default_value_t = Protocol::Rpc)]
    pub protocol: Protocol,

    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Log filter, e.g. `stampede=debug`. Overrides RUST_LOG.
    #[arg(short, long)]
    pub log: Option<String>,
}

/// Runs a single scenario from the command line or from code.
///
/// # Example
///
/// ```no_run
/// use stampede_runtime::{Protocol, StampedeRuntime};
///
/// #[tokio::main]
/// async fn main() {
///     let stats = StampedeRuntime::new()
///         .scenario_file("scenarios/thundering_herd.toml")
///         .protocol(Protocol::Http)
///         .run()
///         .await;
///     println!("{stats:?}");
/// }
/// ```
#[derive(Debug, Default)]
pub struct StampedeRuntime {
    scenario_file: Option<PathBuf>,
    scenario: Option<ScenarioConfig>,
    target: Option<String>,
    protocol: Protocol,
    format: ReportFormat,
    report: Option<PathBuf>,
}

impl StampedeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the default CLI arguments.
    ///
    /// ```text
    /// $ stampede --scenario flash_sale.json --protocol rpc --target http://localhost:50051
    /// $ stampede -s herd.toml -p http -f json -r herd.json
    /// ```
    pub fn with_args(self) -> Self {
        self.with_cli(StampedeCli::parse())
    }

    pub fn with_cli(mut self, cli: StampedeCli) -> Self {
        self.scenario_file = Some(cli.scenario);
        self.target = cli.target;
        self.protocol = cli.protocol;
        self.format = cli.format;
        self.report = cli.report;
        self
    }

    pub fn scenario_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.scenario_file = Some(path.into());
        self
    }

    /// Run this descriptor instead of loading one from disk.
    pub fn scenario(mut self, config: ScenarioConfig) -> Self {
        self.scenario = Some(config);
        self
    }

    pub fn target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn report(mut self, path: impl Into<PathBuf>) -> Self {
        self.report = Some(path.into());
        self
    }

    /// Load and validate the descriptor. Nothing is sent if this fails.
    pub fn load(&self) -> Result<ScenarioConfig, RuntimeError> {
        match (&self.scenario, &self.scenario_file) {
            (Some(config), _) => {
                config.validate()?;
                Ok(config.clone())
            }
            (None, Some(path)) => Ok(ScenarioConfig::load(path)?),
            (None, None) => Err(RuntimeError::NoScenario),
        }
    }

    #[instrument(name = "stampede", skip_all, fields(protocol = ?self.protocol))]
    pub async fn run(self) -> Result<RunStatistics, RuntimeError> {
        let config = self.load()?;
        let target = self
            .target
            .as_deref()
            .unwrap_or(self.protocol.default_target());
        info!("Loaded scenario {} against {target}", config.name);

        let stats = match self.protocol {
            Protocol::Rpc => run_with(config, RpcTransport::new(target)?).await?,
            Protocol::Http => run_with(config, HttpTransport::new(target)?).await?,
        };

        report::write(&stats, self.format, self.report.as_deref())?;
        if let Some(path) = &self.report {
            info!("Report written to {}", path.display());
        }

        Ok(stats)
    }
}

async fn run_with<T: Transport>(
    config: ScenarioConfig,
    transport: T,
) -> Result<RunStatistics, RuntimeError> {
    Ok(Scenario::new(config, transport)?.await)
}
