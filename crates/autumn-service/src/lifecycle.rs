//! ---
//! autumn_section: "02-service-orchestration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Pre-instantiation lifecycle hooks."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::any::type_name;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::container::Injector;
use crate::service::short_type_name;

/// Hook run after the container is composed and before any service exists.
pub trait LifecycleListener: Send + Sync {
    fn name(&self) -> &str {
        short_type_name(type_name::<Self>())
    }

    fn on_start(&self, injector: &Injector) -> anyhow::Result<()>;

    /// Release whatever `on_start` acquired. Only called after a successful `on_start`.
    fn on_close(&self) {}
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A listener failed; listeners that had already started were closed.
    #[error("lifecycle listener {listener} failed to start")]
    Hook {
        listener: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Closed,
}

/// Runs registered listeners in order on start and in reverse on close.
pub struct LifecycleManager {
    listeners: Vec<Arc<dyn LifecycleListener>>,
    started: usize,
    phase: Phase,
}

impl LifecycleManager {
    pub fn new(listeners: Vec<Arc<dyn LifecycleListener>>) -> Self {
        Self {
            listeners,
            started: 0,
            phase: Phase::Idle,
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Start every listener. On failure the listeners already started are
    /// closed in reverse order and the manager cannot be started again.
    pub fn start(&mut self, injector: &Injector) -> Result<(), LifecycleError> {
        if self.phase != Phase::Idle {
            debug!("lifecycle manager already started");
            return Ok(());
        }
        self.phase = Phase::Started;
        for index in 0..self.listeners.len() {
            let listener = self.listeners[index].clone();
            debug!(listener = listener.name(), "starting lifecycle listener");
            if let Err(source) = listener.on_start(injector) {
                let listener = listener.name().to_owned();
                warn!(listener = %listener, error = %source, "lifecycle listener failed; rolling back");
                self.close();
                return Err(LifecycleError::Hook { listener, source });
            }
            self.started += 1;
        }
        Ok(())
    }

    /// Close started listeners in reverse order. Repeated calls do nothing.
    pub fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.phase = Phase::Closed;
        for listener in self.listeners[..self.started].iter().rev() {
            debug!(listener = listener.name(), "closing lifecycle listener");
            listener.on_close();
        }
        self.started = 0;
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("listeners", &self.listeners.len())
            .field("started", &self.started)
            .field("phase", &self.phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Binder, Configuration};
    use autumn_common::{ConfigurationResolver, Properties, ResourceLoader};
    use parking_lot::Mutex;

    struct Recorder {
        label: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl LifecycleListener for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn on_start(&self, _: &Injector) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("{} refused", self.label);
            }
            self.log.lock().push(format!("start {}", self.label));
            Ok(())
        }

        fn on_close(&self) {
            self.log.lock().push(format!("close {}", self.label));
        }
    }

    fn injector() -> Injector {
        let config = Configuration::new(
            Arc::new(ConfigurationResolver::new(ResourceLoader::default())),
            Properties::new(),
        );
        Binder::new(config).build().0
    }

    fn manager(specs: &[(&'static str, bool)], log: &Arc<Mutex<Vec<String>>>) -> LifecycleManager {
        LifecycleManager::new(
            specs
                .iter()
                .map(|(label, fail)| {
                    Arc::new(Recorder {
                        label: *label,
                        fail: *fail,
                        log: log.clone(),
                    }) as Arc<dyn LifecycleListener>
                })
                .collect(),
        )
    }

    #[test]
    fn starts_in_order_and_closes_in_reverse_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut lifecycle = manager(&[("a", false), ("b", false)], &log);
        lifecycle.start(&injector()).expect("listeners start");
        lifecycle.start(&injector()).expect("second start is ignored");
        lifecycle.close();
        lifecycle.close();
        assert_eq!(*log.lock(), vec!["start a", "start b", "close b", "close a"]);
    }

    #[test]
    fn failure_rolls_back_started_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut lifecycle = manager(&[("a", false), ("b", true), ("c", false)], &log);
        let err = lifecycle.start(&injector()).expect_err("b fails");
        assert!(matches!(err, LifecycleError::Hook { ref listener, .. } if listener == "b"));
        assert_eq!(*log.lock(), vec!["start a", "close a"]);
    }
}
