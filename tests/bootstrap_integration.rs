//! ---
//! autumn_section: "15-testing-qa-runbook"
//! autumn_subsection: "integration-tests"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "End-to-end bootstrap of the web consumer through the orchestrator."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use autumn_common::{ConfigurationResolver, MapEnvironment, OverrideProperties, ResourceLoader};
use autumn_service::{
    Binder, InjectError, Module, ModuleRef, OrchestratorState, ServiceOrchestrator,
};
use autumn_web::{enabled_web_services, WebModule, WebRoutes, PING_PATH};
use axum::routing::get;
use axum::Router;
use tempfile::tempdir;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct GreetingModule;

impl Module for GreetingModule {
    fn configure(&self, binder: &mut Binder) -> Result<(), InjectError> {
        let greeting = binder.configuration().get_or("app.greeting", "hello");
        let routes = Router::new().route("/greeting", get(move || async move { greeting }));
        binder.bind(WebRoutes(routes))
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("ephemeral port")
        .port()
}

fn write_bundles(dir: &Path, web: &str) {
    fs::write(dir.join("app.properties"), "app.greeting=bonjour\n").expect("write app bundle");
    fs::write(dir.join("web.properties"), web).expect("write web bundle");
}

fn resolver(dir: &Path, overrides: OverrideProperties) -> ConfigurationResolver {
    ConfigurationResolver::new(ResourceLoader::new([dir]))
        .with_environment(MapEnvironment::new())
        .with_overrides(overrides)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn web_consumer_serves_ping_until_stopped() {
    let dir = tempdir().expect("tempdir");
    write_bundles(
        dir.path(),
        "application.http.enabled=true\napplication.http.port=1\napplication.http.bind=127.0.0.1\napplication.http.context.path=/app\n",
    );
    let port = free_port();
    let overrides = OverrideProperties::new();
    overrides.set("application.http.port", port.to_string());
    let resolver = resolver(dir.path(), overrides);

    let services = enabled_web_services(&resolver).expect("web flags parse");
    assert_eq!(services.len(), 1);

    let mut orchestrator = ServiceOrchestrator::with_resolver(resolver);
    orchestrator
        .add_configuration("/app.properties")
        .and_then(|o| o.add_modules([ModuleRef::of::<WebModule>(), ModuleRef::of::<GreetingModule>()]))
        .and_then(|o| o.add_services(services))
        .expect("declarations accepted");
    orchestrator.start().expect("start");
    orchestrator.await_healthy(TIMEOUT).await.expect("http healthy");

    let client = reqwest::Client::new();
    let ping = client
        .get(format!("http://127.0.0.1:{port}{PING_PATH}"))
        .send()
        .await
        .expect("ping reachable");
    assert_eq!(ping.status(), reqwest::StatusCode::OK);
    assert_eq!(ping.text().await.expect("body"), "200");

    let greeting = client
        .get(format!("http://127.0.0.1:{port}/app/greeting"))
        .send()
        .await
        .expect("greeting reachable")
        .text()
        .await
        .expect("body");
    assert_eq!(greeting, "bonjour");

    orchestrator.stop();
    orchestrator.await_stopped(TIMEOUT).await.expect("http stopped");
    assert_eq!(orchestrator.state(), OrchestratorState::Stopped);
    assert!(reqwest::Client::new()
        .get(format!("http://127.0.0.1:{port}{PING_PATH}"))
        .send()
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_web_consumer_runs_no_services() {
    let dir = tempdir().expect("tempdir");
    write_bundles(dir.path(), "application.http.enabled=false\n");
    let resolver = resolver(dir.path(), OverrideProperties::new());

    let services = enabled_web_services(&resolver).expect("web flags parse");
    assert!(services.is_empty());

    let mut orchestrator = ServiceOrchestrator::with_resolver(resolver);
    orchestrator
        .add_module(ModuleRef::of::<WebModule>())
        .and_then(|o| o.add_services(services))
        .expect("declarations accepted");
    orchestrator.start().expect("start");
    orchestrator.await_healthy(TIMEOUT).await.expect("nothing to wait for");
    assert!(orchestrator.service_states().is_empty());
    orchestrator.stop();
}
