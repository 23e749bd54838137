//! ---
//! autumn_section: "02-service-orchestration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Typed registry composed from declared modules at start time."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
//! Typed injection container.
//!
//! Modules are explicit composition functions: each receives a [`Binder`],
//! may install other modules (each concrete module type runs at most once)
//! and registers singletons keyed by type and optional name. The resulting
//! [`Injector`] is read-only and shared by everything built at start time.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use autumn_common::{ConfigError, ConfigurationResolver, Properties};
use autumn_logging::{autumn_debug, LogContext};
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;
use tracing::debug;

use crate::lifecycle::{LifecycleListener, LifecycleManager};
use crate::service::{short_type_name, Service, ServiceRef};

/// Errors raised while composing modules or resolving bindings.
#[derive(Debug, Error)]
pub enum InjectError {
    /// A binding with the same type and name was registered twice.
    #[error("duplicate binding for {type_name}{}", named_suffix(.name))]
    DuplicateBinding {
        type_name: &'static str,
        name: Option<String>,
    },
    /// No binding exists for the requested type and name.
    #[error("no binding for {type_name}{}", named_suffix(.name))]
    MissingBinding {
        type_name: &'static str,
        name: Option<String>,
    },
    /// A required configuration property resolved to nothing.
    #[error("missing required property '{0}'")]
    MissingProperty(String),
    /// A configuration property was present but invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A module failed while configuring its bindings.
    #[error("module {module} failed to configure")]
    Module {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl InjectError {
    /// Attribute a failure raised inside `M::configure` to module `M`.
    pub fn module<M, E>(source: E) -> Self
    where
        M: Module,
        E: Into<anyhow::Error>,
    {
        Self::Module {
            module: short_type_name(type_name::<M>()),
            source: source.into(),
        }
    }
}

fn named_suffix(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" named '{name}'"),
        None => String::new(),
    }
}

/// A wiring unit that binds configuration-derived values into the container.
pub trait Module: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        short_type_name(type_name::<Self>())
    }

    /// Invoked once per container composition.
    fn configure(&self, binder: &mut Binder) -> Result<(), InjectError>;
}

/// Declaration of a module. References to the same concrete type are equal,
/// so the first declared instance of a type is the one installed.
#[derive(Clone)]
pub struct ModuleRef {
    id: TypeId,
    type_name: &'static str,
    module: Arc<dyn Module>,
}

impl ModuleRef {
    pub fn of<M>() -> Self
    where
        M: Module + Default,
    {
        Self::new(M::default())
    }

    pub fn new<M: Module>(module: M) -> Self {
        Self {
            id: TypeId::of::<M>(),
            type_name: type_name::<M>(),
            module: Arc::new(module),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn name(&self) -> &'static str {
        self.module.name()
    }
}

impl PartialEq for ModuleRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModuleRef {}

impl Hash for ModuleRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleRef").field(&self.type_name).finish()
    }
}

/// Configuration visible to modules and services: every declared bundle
/// composed into one mapping and resolved with environment and override
/// precedence.
#[derive(Debug, Clone)]
pub struct Configuration {
    resolver: Arc<ConfigurationResolver>,
    composite: Arc<Properties>,
}

impl Configuration {
    pub fn new(resolver: Arc<ConfigurationResolver>, composite: Properties) -> Self {
        Self {
            resolver,
            composite: Arc::new(composite),
        }
    }

    /// Compose `bundles` in order. On key collisions the earliest bundle wins.
    pub fn compose<'a, I>(resolver: Arc<ConfigurationResolver>, bundles: I) -> Self
    where
        I: IntoIterator<Item = &'a Properties>,
    {
        let mut composite = Properties::new();
        for bundle in bundles {
            composite.merge_absent(bundle);
        }
        Self::new(resolver, composite)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.resolver.resolve_value(key, &self.composite, None)
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.resolver.resolve_or(key, &self.composite, default)
    }

    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.resolver.resolve_parsed(key, &self.composite)
    }

    pub fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.resolver.resolve_flag(key, &self.composite, default)
    }

    pub fn composite(&self) -> &Properties {
        &self.composite
    }

    pub fn resolver(&self) -> &ConfigurationResolver {
        &self.resolver
    }
}

type BindingKey = (TypeId, Option<String>);

struct Binding {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Collects bindings and lifecycle listeners while modules configure.
pub struct Binder {
    configuration: Configuration,
    bindings: IndexMap<BindingKey, Binding>,
    installed: IndexSet<TypeId>,
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl Binder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            bindings: IndexMap::new(),
            installed: IndexSet::new(),
            listeners: Vec::new(),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Resolver for modules that materialize their own bundles.
    pub fn resolver(&self) -> &ConfigurationResolver {
        self.configuration.resolver()
    }

    pub fn install<M>(&mut self) -> Result<(), InjectError>
    where
        M: Module + Default,
    {
        if self.installed.contains(&TypeId::of::<M>()) {
            return Ok(());
        }
        self.install_ref(&ModuleRef::of::<M>())
    }

    /// Configure `module` unless a module of the same type was already installed.
    pub fn install_ref(&mut self, module: &ModuleRef) -> Result<(), InjectError> {
        let ctx = LogContext::new()
            .with_module(module.name())
            .with_phase("configure");
        if !self.installed.insert(module.id) {
            autumn_debug!(context = ctx, "module already installed");
            return Ok(());
        }
        autumn_debug!(context = ctx, "configuring module");
        module.module.configure(self)
    }

    pub fn bind<T>(&mut self, value: T) -> Result<(), InjectError>
    where
        T: Send + Sync + 'static,
    {
        self.bind_shared(Arc::new(value))
    }

    pub fn bind_shared<T>(&mut self, value: Arc<T>) -> Result<(), InjectError>
    where
        T: Send + Sync + 'static,
    {
        self.insert::<T>(None, value)
    }

    pub fn bind_named<T>(&mut self, name: impl Into<String>, value: T) -> Result<(), InjectError>
    where
        T: Send + Sync + 'static,
    {
        self.insert::<T>(Some(name.into()), Arc::new(value))
    }

    pub fn add_lifecycle_listener(&mut self, listener: impl LifecycleListener + 'static) {
        self.listeners.push(Arc::new(listener));
    }

    fn insert<T>(&mut self, name: Option<String>, value: Arc<T>) -> Result<(), InjectError>
    where
        T: Send + Sync + 'static,
    {
        let key = (TypeId::of::<T>(), name);
        if self.bindings.contains_key(&key) {
            return Err(InjectError::DuplicateBinding {
                type_name: type_name::<T>(),
                name: key.1,
            });
        }
        debug!(binding = type_name::<T>(), name = ?key.1, "binding registered");
        self.bindings.insert(
            key,
            Binding {
                type_name: type_name::<T>(),
                value,
            },
        );
        Ok(())
    }

    /// Freeze the collected bindings.
    pub fn build(self) -> (Injector, LifecycleManager) {
        let injector = Injector {
            inner: Arc::new(InjectorInner {
                configuration: self.configuration,
                bindings: self.bindings,
            }),
        };
        (injector, LifecycleManager::new(self.listeners))
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("bindings", &self.bindings.len())
            .field("installed", &self.installed.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

struct InjectorInner {
    configuration: Configuration,
    bindings: IndexMap<BindingKey, Binding>,
}

/// Read-only view over composed bindings and configuration.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Injector {
    pub fn get<T>(&self) -> Result<Arc<T>, InjectError>
    where
        T: Send + Sync + 'static,
    {
        self.lookup::<T>(None)
    }

    pub fn get_named<T>(&self, name: &str) -> Result<Arc<T>, InjectError>
    where
        T: Send + Sync + 'static,
    {
        self.lookup::<T>(Some(name.to_owned()))
    }

    pub fn try_get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.get::<T>().ok()
    }

    fn lookup<T>(&self, name: Option<String>) -> Result<Arc<T>, InjectError>
    where
        T: Send + Sync + 'static,
    {
        let key = (TypeId::of::<T>(), name);
        self.inner
            .bindings
            .get(&key)
            .and_then(|binding| binding.value.clone().downcast::<T>().ok())
            .ok_or(InjectError::MissingBinding {
                type_name: type_name::<T>(),
                name: key.1,
            })
    }

    pub fn configuration(&self) -> &Configuration {
        &self.inner.configuration
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.inner.configuration.get(key)
    }

    pub fn property_or(&self, key: &str, default: &str) -> String {
        self.inner.configuration.get_or(key, default)
    }

    pub fn require_property(&self, key: &str) -> Result<String, InjectError> {
        self.property(key)
            .ok_or_else(|| InjectError::MissingProperty(key.to_owned()))
    }

    pub fn parse_property<T>(&self, key: &str) -> Result<Option<T>, InjectError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        Ok(self.inner.configuration.parse(key)?)
    }

    /// Build a live instance of the declared service.
    pub fn instantiate(&self, service: &ServiceRef) -> anyhow::Result<Arc<dyn Service>> {
        debug!(service = service.short_name(), "instantiating service");
        service.construct(self)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings: Vec<&str> = self
            .inner
            .bindings
            .values()
            .map(|binding| binding.type_name)
            .collect();
        f.debug_struct("Injector").field("bindings", &bindings).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autumn_common::{MapEnvironment, OverrideProperties, ResourceLoader};

    fn configuration(pairs: &[(&str, &str)]) -> Configuration {
        let resolver = ConfigurationResolver::new(ResourceLoader::default())
            .with_environment(MapEnvironment::new())
            .with_overrides(OverrideProperties::new());
        Configuration::new(Arc::new(resolver), pairs.iter().copied().collect())
    }

    #[derive(Debug, PartialEq)]
    struct Greeting(String);

    #[derive(Default)]
    struct GreetingModule;

    impl Module for GreetingModule {
        fn configure(&self, binder: &mut Binder) -> Result<(), InjectError> {
            let text = binder.configuration().get_or("greeting", "hello");
            binder.bind(Greeting(text))
        }
    }

    #[derive(Default)]
    struct AppModule;

    impl Module for AppModule {
        fn configure(&self, binder: &mut Binder) -> Result<(), InjectError> {
            binder.install::<GreetingModule>()?;
            binder.install::<GreetingModule>()?;
            binder.bind_named("region", String::from("eu"))
        }
    }

    #[test]
    fn modules_install_once_and_bind_values() {
        let mut binder = Binder::new(configuration(&[("greeting", "hi")]));
        binder
            .install_ref(&ModuleRef::of::<AppModule>())
            .expect("modules configure");
        binder
            .install_ref(&ModuleRef::of::<GreetingModule>())
            .expect("repeat install is skipped");
        let (injector, _) = binder.build();

        assert_eq!(
            *injector.get::<Greeting>().expect("bound"),
            Greeting("hi".into())
        );
        assert_eq!(
            injector
                .get_named::<String>("region")
                .expect("named binding")
                .as_str(),
            "eu"
        );
        assert!(matches!(
            injector.get::<String>(),
            Err(InjectError::MissingBinding { name: None, .. })
        ));
    }

    #[test]
    fn duplicate_bindings_are_rejected() {
        let mut binder = Binder::new(configuration(&[]));
        binder.bind(7_u16).expect("first binding");
        let err = binder.bind(8_u16).expect_err("duplicate");
        assert!(matches!(err, InjectError::DuplicateBinding { name: None, .. }));
        binder.bind_named("a", 1_u16).expect("named binding is distinct");
        assert!(binder.bind_named("a", 2_u16).is_err());
    }

    #[derive(Default)]
    struct SeedModule;

    impl Module for SeedModule {
        fn configure(&self, binder: &mut Binder) -> Result<(), InjectError> {
            let raw = binder.configuration().get_or("seed", "none");
            let seed = raw.parse::<u64>().map_err(|err| {
                InjectError::module::<Self, _>(anyhow::anyhow!("seed {raw:?}: {err}"))
            })?;
            binder.bind(seed)
        }
    }

    #[test]
    fn module_failures_name_the_module() {
        let mut binder = Binder::new(configuration(&[("seed", "abc")]));
        let err = binder.install::<SeedModule>().expect_err("seed is not numeric");
        assert!(matches!(err, InjectError::Module { module: "SeedModule", .. }));
        assert!(err.to_string().contains("SeedModule"));

        let mut binder = Binder::new(configuration(&[("seed", "42")]));
        binder.install::<SeedModule>().expect("numeric seed");
        let (injector, _) = binder.build();
        assert_eq!(*injector.get::<u64>().expect("seed bound"), 42);
    }

    #[test]
    fn compose_prefers_earlier_bundles() {
        let first: Properties = [("port", "1")].into_iter().collect();
        let second: Properties = [("port", "2"), ("host", "h")].into_iter().collect();
        let resolver = Arc::new(
            ConfigurationResolver::new(ResourceLoader::default())
                .with_environment(MapEnvironment::new())
                .with_overrides(OverrideProperties::new()),
        );
        let config = Configuration::compose(resolver, [&first, &second]);
        assert_eq!(config.get("port").as_deref(), Some("1"));
        assert_eq!(config.get("host").as_deref(), Some("h"));
    }

    #[test]
    fn property_helpers_report_missing_and_invalid_values() {
        let (injector, _) = Binder::new(configuration(&[("port", "x")])).build();
        assert!(matches!(
            injector.require_property("absent"),
            Err(InjectError::MissingProperty(key)) if key == "absent"
        ));
        assert!(matches!(
            injector.parse_property::<u16>("port"),
            Err(InjectError::Config(_))
        ));
        assert_eq!(injector.property_or("absent", "d"), "d");
    }
}
