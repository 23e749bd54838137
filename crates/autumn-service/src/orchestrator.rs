//! ---
//! autumn_section: "02-service-orchestration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Bootstrap state machine composing configuration, modules and services."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use autumn_common::{ConfigurationResolver, Properties};
use autumn_logging::{log_lifecycle_event, LifecycleOutcome, LogContext};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::container::{Binder, Configuration, InjectError, Injector, ModuleRef};
use crate::group::{GroupError, ServiceGroup, ServiceState};
use crate::lifecycle::{LifecycleError, LifecycleManager};
use crate::resource::{Declared, ResourceSet};
use crate::service::ServiceRef;

/// Errors surfaced by [`ServiceOrchestrator`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Declarations were offered after the orchestrator started.
    #[error("application is already started")]
    AlreadyStarted,
    /// The orchestrator was stopped and cannot be started again.
    #[error("application was stopped and cannot be restarted")]
    Stopped,
    /// No tokio runtime was configured or current.
    #[error("no async runtime available to run services")]
    NoRuntime,
    /// A module failed while composing the container.
    #[error("unable to compose the injection container")]
    Container(#[from] InjectError),
    /// A lifecycle listener failed.
    #[error("unable to start the lifecycle manager")]
    Lifecycle(#[from] LifecycleError),
    /// A declared service could not be constructed.
    #[error("unable to instantiate service {service}")]
    Instantiation {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },
    /// The service group rejected a request or did not settle in time.
    #[error(transparent)]
    Group(#[from] GroupError),
}

/// Coarse lifecycle of an orchestrator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Unstarted,
    Running,
    Stopped,
}

struct Running {
    group: ServiceGroup,
    lifecycle: LifecycleManager,
    injector: Injector,
}

/// Accumulates configuration sources, modules and services, then runs the
/// services as one group between [`start`](Self::start) and [`stop`](Self::stop).
///
/// `start` and `stop` are synchronous: they compose the container, run the
/// lifecycle hooks and build every service on the caller's thread, and only
/// the services' own start and stop routines run in the background.
pub struct ServiceOrchestrator {
    configurations: ResourceSet<String>,
    modules: ResourceSet<ModuleRef>,
    services: ResourceSet<ServiceRef>,
    resolver: Arc<ConfigurationResolver>,
    runtime: Option<Handle>,
    running: Option<Running>,
    retired: Option<ServiceGroup>,
    stopped: bool,
}

impl ServiceOrchestrator {
    /// Orchestrator using [`ConfigurationResolver::system`].
    pub fn new() -> Self {
        Self::with_resolver(ConfigurationResolver::system())
    }

    pub fn with_resolver(resolver: ConfigurationResolver) -> Self {
        Self {
            configurations: ResourceSet::new("configuration"),
            modules: ResourceSet::new("module"),
            services: ResourceSet::new("service"),
            resolver: Arc::new(resolver),
            runtime: None,
            running: None,
            retired: None,
            stopped: false,
        }
    }

    /// Run services on `runtime` instead of the runtime current at `start`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn add_configuration(
        &mut self,
        name: impl Declared<String>,
    ) -> Result<&mut Self, OrchestratorError> {
        self.ensure_unstarted()?;
        self.configurations.add(name);
        Ok(self)
    }

    pub fn add_configurations<I>(&mut self, names: I) -> Result<&mut Self, OrchestratorError>
    where
        I: IntoIterator,
        I::Item: Declared<String>,
    {
        self.ensure_unstarted()?;
        self.configurations.add_all(names);
        Ok(self)
    }

    pub fn add_module(
        &mut self,
        module: impl Declared<ModuleRef>,
    ) -> Result<&mut Self, OrchestratorError> {
        self.ensure_unstarted()?;
        self.modules.add(module);
        Ok(self)
    }

    pub fn add_modules<I>(&mut self, modules: I) -> Result<&mut Self, OrchestratorError>
    where
        I: IntoIterator,
        I::Item: Declared<ModuleRef>,
    {
        self.ensure_unstarted()?;
        self.modules.add_all(modules);
        Ok(self)
    }

    pub fn add_service(
        &mut self,
        service: impl Declared<ServiceRef>,
    ) -> Result<&mut Self, OrchestratorError> {
        self.ensure_unstarted()?;
        self.services.add(service);
        Ok(self)
    }

    pub fn add_services<I>(&mut self, services: I) -> Result<&mut Self, OrchestratorError>
    where
        I: IntoIterator,
        I::Item: Declared<ServiceRef>,
    {
        self.ensure_unstarted()?;
        self.services.add_all(services);
        Ok(self)
    }

    fn ensure_unstarted(&self) -> Result<(), OrchestratorError> {
        if self.running.is_some() || self.stopped {
            return Err(OrchestratorError::AlreadyStarted);
        }
        Ok(())
    }

    /// Compose the container, run lifecycle hooks, build every declared
    /// service and issue the group start.
    ///
    /// Calling this while running does nothing. A failure leaves the
    /// orchestrator unstarted with lifecycle hooks closed, so it may be retried.
    pub fn start(&mut self) -> Result<(), OrchestratorError> {
        let ctx = LogContext::new().with_phase("start");
        if self.running.is_some() {
            log_lifecycle_event(
                Some(&ctx),
                "orchestrator.start",
                "orchestrator already started",
                LifecycleOutcome::Skipped,
            );
            return Ok(());
        }
        if self.stopped {
            return Err(OrchestratorError::Stopped);
        }
        let runtime = match &self.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::try_current().map_err(|_| OrchestratorError::NoRuntime)?,
        };

        info!(
            configurations = self.configurations.len(),
            modules = self.modules.len(),
            services = self.services.len(),
            "starting service orchestrator"
        );

        match self.launch(runtime) {
            Ok(running) => {
                self.running = Some(running);
                log_lifecycle_event(
                    Some(&ctx),
                    "orchestrator.start",
                    "services starting",
                    LifecycleOutcome::Success,
                );
                Ok(())
            }
            Err(err) => {
                log_lifecycle_event(
                    Some(&ctx),
                    "orchestrator.start",
                    &format!("{err}"),
                    LifecycleOutcome::Fault,
                );
                Err(err)
            }
        }
    }

    fn launch(&self, runtime: Handle) -> Result<Running, OrchestratorError> {
        let bundles: Vec<Properties> = self
            .configurations
            .iter()
            .map(|name| self.resolver.resolve_bundle(name))
            .collect();
        let configuration = Configuration::compose(self.resolver.clone(), &bundles);
        debug!(keys = configuration.composite().len(), "configuration composed");

        let mut binder = Binder::new(configuration);
        for module in self.modules.iter() {
            binder.install_ref(module)?;
        }
        let (injector, mut lifecycle) = binder.build();
        lifecycle.start(&injector)?;

        let mut instances = Vec::with_capacity(self.services.len());
        for service in self.services.iter() {
            match injector.instantiate(service) {
                Ok(instance) => instances.push(instance),
                Err(source) => {
                    lifecycle.close();
                    return Err(OrchestratorError::Instantiation {
                        service: service.type_name(),
                        source,
                    });
                }
            }
        }

        let group = ServiceGroup::new(instances, runtime);
        if let Err(err) = group.start_async() {
            lifecycle.close();
            return Err(err.into());
        }
        Ok(Running {
            group,
            lifecycle,
            injector,
        })
    }

    /// Issue the group stop and close lifecycle hooks. Does nothing unless running.
    pub fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            debug!("orchestrator not running; stop ignored");
            return;
        };
        running.group.stop_async();
        running.lifecycle.close();
        self.retired = Some(running.group);
        self.stopped = true;
        log_lifecycle_event(
            Some(&LogContext::new().with_phase("stop")),
            "orchestrator.stop",
            "services stopping",
            LifecycleOutcome::Success,
        );
    }

    pub fn state(&self) -> OrchestratorState {
        if self.running.is_some() {
            OrchestratorState::Running
        } else if self.stopped {
            OrchestratorState::Stopped
        } else {
            OrchestratorState::Unstarted
        }
    }

    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// Injector of the running orchestrator.
    pub fn injector(&self) -> Option<&Injector> {
        self.running.as_ref().map(|running| &running.injector)
    }

    pub fn service_states(&self) -> Vec<(String, ServiceState)> {
        self.group().map(ServiceGroup::states).unwrap_or_default()
    }

    /// Wait for every service to run. Returns immediately when not running.
    pub async fn await_healthy(&self, timeout: Duration) -> Result<(), OrchestratorError> {
        match &self.running {
            Some(running) => Ok(running.group.await_healthy(timeout).await?),
            None => Ok(()),
        }
    }

    /// Wait for every service to terminate. Returns immediately when nothing ran.
    pub async fn await_stopped(&self, timeout: Duration) -> Result<(), OrchestratorError> {
        match self.group() {
            Some(group) => Ok(group.await_stopped(timeout).await?),
            None => Ok(()),
        }
    }

    fn group(&self) -> Option<&ServiceGroup> {
        self.running
            .as_ref()
            .map(|running| &running.group)
            .or(self.retired.as_ref())
    }

    pub fn configurations(&self) -> Arc<[String]> {
        self.configurations.snapshot()
    }

    pub fn modules(&self) -> Arc<[ModuleRef]> {
        self.modules.snapshot()
    }

    pub fn services(&self) -> Arc<[ServiceRef]> {
        self.services.snapshot()
    }

    pub fn resolver(&self) -> &ConfigurationResolver {
        &self.resolver
    }
}

impl Default for ServiceOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceOrchestrator")
            .field("state", &self.state())
            .field("configurations", &self.configurations)
            .field("modules", &self.modules)
            .field("services", &self.services)
            .finish()
    }
}
