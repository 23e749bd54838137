//! ---
//! autumn_section: "02-service-orchestration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Process bootstrap and lifecycle orchestration."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
//! Process bootstrap for Autumn.
//!
//! Callers declare configuration bundles, modules and services on a
//! [`ServiceOrchestrator`] and then start it. Starting composes the declared
//! bundles into one [`Configuration`], lets every [`Module`] bind values into
//! the container, runs [`LifecycleListener`] hooks, builds each declared
//! [`Service`] through the [`Injector`] and hands them to a [`ServiceGroup`].

pub mod container;
pub mod group;
pub mod lifecycle;
pub mod orchestrator;
pub mod resource;
pub mod service;

pub use container::{Binder, Configuration, InjectError, Injector, Module, ModuleRef};
pub use group::{GroupError, ServiceGroup, ServiceState};
pub use lifecycle::{LifecycleError, LifecycleListener, LifecycleManager};
pub use orchestrator::{OrchestratorError, OrchestratorState, ServiceOrchestrator};
pub use resource::{Declared, ResourceSet};
pub use service::{Inject, Service, ServiceRef};

pub use async_trait::async_trait;
