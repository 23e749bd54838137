//! ---
//! autumn_section: "04-web"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "HTTP consumer of the Autumn orchestrator."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
//! HTTP service for Autumn applications.
//!
//! Declare [`WebModule`] and the services returned by
//! [`enabled_web_services`] on a `ServiceOrchestrator` to serve
//! `/monitor/ping` plus any [`WebRoutes`] bound by application modules.

pub mod module;
pub mod server;
pub mod settings;

pub use module::{enabled_web_services, WebModule};
pub use server::{HttpService, WebRoutes, PING_PATH};
pub use settings::{HttpSettings, PROPERTY_NAME};
