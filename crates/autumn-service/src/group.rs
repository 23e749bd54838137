//! ---
//! autumn_section: "02-service-orchestration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Concurrent runner starting and stopping services as one unit."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use autumn_logging::{log_lifecycle_event, LifecycleOutcome, LogContext};
use futures::future::join_all;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::service::Service;

/// Observable state of one managed service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    New,
    Starting,
    Running,
    Stopping,
    Terminated,
    Failed(String),
}

impl ServiceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Terminated | ServiceState::Failed(_))
    }

    fn has_settled_start(&self) -> bool {
        !matches!(self, ServiceState::New | ServiceState::Starting)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GroupError {
    /// Start was already issued, or the group was stopped.
    #[error("service group was already started")]
    AlreadyStarted,
    /// A service did not reach `Running`.
    #[error("service {service} is not healthy: {state:?}")]
    Unhealthy { service: String, state: ServiceState },
    /// Services were still transitioning when the wait expired.
    #[error("timed out after {waited:?} waiting for {pending:?}")]
    Timeout {
        waited: Duration,
        pending: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Stopped,
}

struct Managed {
    name: String,
    service: Arc<dyn Service>,
    state: watch::Sender<ServiceState>,
    // Serializes start and stop so a stop waits for an in-flight start.
    transition: tokio::sync::Mutex<()>,
}

impl Managed {
    fn new(service: Arc<dyn Service>) -> Self {
        let (state, _) = watch::channel(ServiceState::New);
        Self {
            name: service.name().to_owned(),
            service,
            state,
            transition: tokio::sync::Mutex::new(()),
        }
    }

    fn current(&self) -> ServiceState {
        self.state.borrow().clone()
    }

    fn set(&self, state: ServiceState) {
        debug!(service = %self.name, state = ?state, "service state changed");
        self.state.send_replace(state);
    }

    async fn start(self: Arc<Self>) {
        let _transition = self.transition.lock().await;
        if self.current() != ServiceState::New {
            return;
        }
        self.set(ServiceState::Starting);
        let ctx = LogContext::new().with_service(&self.name).with_phase("start");
        match self.service.start().await {
            Ok(()) => {
                self.set(ServiceState::Running);
                log_lifecycle_event(
                    Some(&ctx),
                    "service.start",
                    "service running",
                    LifecycleOutcome::Success,
                );
            }
            Err(err) => {
                let reason = format!("{err:#}");
                log_lifecycle_event(Some(&ctx), "service.start", &reason, LifecycleOutcome::Fault);
                self.set(ServiceState::Failed(reason));
            }
        }
    }

    async fn stop(self: Arc<Self>) {
        let _transition = self.transition.lock().await;
        let ctx = LogContext::new().with_service(&self.name).with_phase("stop");
        match self.current() {
            ServiceState::New => {
                self.set(ServiceState::Terminated);
                log_lifecycle_event(
                    Some(&ctx),
                    "service.stop",
                    "service stopped before starting",
                    LifecycleOutcome::Skipped,
                );
            }
            ServiceState::Running => {
                self.set(ServiceState::Stopping);
                match self.service.stop().await {
                    Ok(()) => {
                        self.set(ServiceState::Terminated);
                        log_lifecycle_event(
                            Some(&ctx),
                            "service.stop",
                            "service terminated",
                            LifecycleOutcome::Success,
                        );
                    }
                    Err(err) => {
                        let reason = format!("{err:#}");
                        log_lifecycle_event(Some(&ctx), "service.stop", &reason, LifecycleOutcome::Fault);
                        self.set(ServiceState::Failed(reason));
                    }
                }
            }
            _ => {}
        }
    }
}

/// Starts and stops a fixed set of services concurrently on a tokio runtime.
///
/// Each service gets its own task per transition. Start and stop are each
/// issued at most once.
pub struct ServiceGroup {
    services: Vec<Arc<Managed>>,
    runtime: Handle,
    phase: Mutex<Phase>,
}

impl ServiceGroup {
    pub fn new(services: Vec<Arc<dyn Service>>, runtime: Handle) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|service| Arc::new(Managed::new(service)))
                .collect(),
            runtime,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Spawn a start task per service and return without waiting.
    pub fn start_async(&self) -> Result<(), GroupError> {
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Idle {
                return Err(GroupError::AlreadyStarted);
            }
            *phase = Phase::Started;
        }
        debug!(services = self.services.len(), "starting service group");
        for managed in &self.services {
            self.runtime.spawn(managed.clone().start());
        }
        Ok(())
    }

    /// Spawn a stop task per service. Returns `false` when stop was already issued.
    pub fn stop_async(&self) -> bool {
        {
            let mut phase = self.phase.lock();
            if *phase == Phase::Stopped {
                return false;
            }
            *phase = Phase::Stopped;
        }
        debug!(services = self.services.len(), "stopping service group");
        for managed in &self.services {
            self.runtime.spawn(managed.clone().stop());
        }
        true
    }

    /// Snapshot of `(service name, state)` in declaration order.
    pub fn states(&self) -> Vec<(String, ServiceState)> {
        self.services
            .iter()
            .map(|managed| (managed.name.clone(), managed.current()))
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.services
            .iter()
            .all(|managed| managed.current() == ServiceState::Running)
    }

    /// Wait until every service is running. Fails as soon as all services have
    /// settled and one of them is not running.
    pub async fn await_healthy(&self, timeout: Duration) -> Result<(), GroupError> {
        let settled = self.wait_all(timeout, ServiceState::has_settled_start).await?;
        match settled
            .into_iter()
            .find(|(_, state)| *state != ServiceState::Running)
        {
            Some((service, state)) => Err(GroupError::Unhealthy { service, state }),
            None => Ok(()),
        }
    }

    /// Wait until every service is terminated or failed.
    pub async fn await_stopped(&self, timeout: Duration) -> Result<(), GroupError> {
        self.wait_all(timeout, ServiceState::is_terminal)
            .await
            .map(|_| ())
    }

    async fn wait_all(
        &self,
        timeout: Duration,
        done: fn(&ServiceState) -> bool,
    ) -> Result<Vec<(String, ServiceState)>, GroupError> {
        let waits = self.services.iter().map(|managed| {
            let mut receiver = managed.state.subscribe();
            let name = managed.name.clone();
            async move {
                let state = match receiver.wait_for(done).await {
                    Ok(state) => state.clone(),
                    Err(_) => ServiceState::Failed("state channel closed".to_owned()),
                };
                (name, state)
            }
        });
        match tokio::time::timeout(timeout, join_all(waits)).await {
            Ok(states) => Ok(states),
            Err(_) => Err(GroupError::Timeout {
                waited: timeout,
                pending: self
                    .services
                    .iter()
                    .filter(|managed| !done(&managed.current()))
                    .map(|managed| managed.name.clone())
                    .collect(),
            }),
        }
    }
}

impl fmt::Debug for ServiceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceGroup")
            .field("states", &self.states())
            .field("phase", &*self.phase.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    #[derive(Default)]
    struct Counting {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: bool,
        delay: Duration,
    }

    #[async_trait]
    impl Service for Counting {
        fn name(&self) -> &str {
            if self.fail_start {
                "broken"
            } else {
                "counting"
            }
        }

        async fn start(&self) -> anyhow::Result<()> {
            sleep(self.delay).await;
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                anyhow::bail!("refusing to start");
            }
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn group_of(services: &[Arc<Counting>]) -> ServiceGroup {
        ServiceGroup::new(
            services
                .iter()
                .map(|service| service.clone() as Arc<dyn Service>)
                .collect(),
            Handle::current(),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn starts_and_stops_every_service_once() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let group = group_of(&[a.clone(), b.clone()]);

        group.start_async().expect("first start");
        assert_eq!(group.start_async(), Err(GroupError::AlreadyStarted));
        group
            .await_healthy(Duration::from_secs(2))
            .await
            .expect("services run");
        assert!(group.is_healthy());

        assert!(group.stop_async());
        assert!(!group.stop_async());
        group
            .await_stopped(Duration::from_secs(2))
            .await
            .expect("services stop");

        for service in [&a, &b] {
            assert_eq!(service.starts.load(Ordering::SeqCst), 1);
            assert_eq!(service.stops.load(Ordering::SeqCst), 1);
        }
        assert!(group
            .states()
            .iter()
            .all(|(_, state)| *state == ServiceState::Terminated));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_start_is_reported_as_unhealthy() {
        let broken = Arc::new(Counting {
            fail_start: true,
            ..Counting::default()
        });
        let group = group_of(&[Arc::new(Counting::default()), broken]);
        group.start_async().expect("start issued");

        let err = group
            .await_healthy(Duration::from_secs(2))
            .await
            .expect_err("one service fails");
        assert!(matches!(
            err,
            GroupError::Unhealthy { ref service, state: ServiceState::Failed(_) } if service == "broken"
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_waits_for_in_flight_start() {
        let slow = Arc::new(Counting {
            delay: Duration::from_millis(200),
            ..Counting::default()
        });
        let group = group_of(&[slow.clone()]);
        group.start_async().expect("start issued");
        sleep(Duration::from_millis(50)).await;
        group.stop_async();

        group
            .await_stopped(Duration::from_secs(2))
            .await
            .expect("stop completes");
        assert_eq!(slow.starts.load(Ordering::SeqCst), 1);
        assert_eq!(slow.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stopping_an_unstarted_group_terminates_without_starting() {
        let idle = Arc::new(Counting::default());
        let group = group_of(&[idle.clone()]);
        assert!(group.stop_async());
        group
            .await_stopped(Duration::from_secs(1))
            .await
            .expect("terminated");
        assert_eq!(group.start_async(), Err(GroupError::AlreadyStarted));
        assert_eq!(idle.starts.load(Ordering::SeqCst), 0);
        assert_eq!(idle.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn await_healthy_times_out_when_never_started() {
        let group = group_of(&[Arc::new(Counting::default())]);
        let err = group
            .await_healthy(Duration::from_millis(50))
            .await
            .expect_err("nothing was started");
        assert!(matches!(err, GroupError::Timeout { ref pending, .. } if pending == &["counting"]));
    }
}
