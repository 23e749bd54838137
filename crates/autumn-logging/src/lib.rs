//! ---
//! autumn_section: "03-logging"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Structured lifecycle logging helpers."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_test_writer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Service the event concerns.
    pub service: Option<&'a str>,
    /// Configuration module the event concerns.
    pub module: Option<&'a str>,
    /// Orchestration phase (`start`, `stop`, `configure`, ...).
    pub phase: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a service name.
    pub fn with_service(mut self, service: &'a str) -> Self {
        self.service = Some(service);
        self
    }

    /// Attach a module name.
    pub fn with_module(mut self, module: &'a str) -> Self {
        self.module = Some(module);
        self
    }

    /// Attach an orchestration phase.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// Outcome recorded by [`log_lifecycle_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The transition completed.
    Success,
    /// The transition was skipped because it had already happened.
    Skipped,
    /// The transition failed or was aborted.
    Fault,
}

impl LifecycleOutcome {
    /// Stable lowercase label used in the `outcome` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Skipped => "skipped",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event. Faults log at error level, skipped
/// transitions at debug, everything else at info.
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    let service = ctx.service.unwrap_or("");
    let module = ctx.module.unwrap_or("");
    let phase = ctx.phase.unwrap_or("");
    match outcome {
        LifecycleOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            service,
            module,
            phase,
            "{message}"
        ),
        LifecycleOutcome::Skipped => tracing::debug!(
            event,
            outcome = outcome.as_str(),
            service,
            module,
            phase,
            "{message}"
        ),
        LifecycleOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            service,
            module,
            phase,
            "{message}"
        ),
    }
}
