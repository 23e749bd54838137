//! ---
//! autumn_section: "02-service-orchestration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Service contract and declarative service references."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use crate::container::Injector;

/// A long-running unit managed by the service group.
///
/// Both routines must be idempotent; the group calls each at most once, but
/// services are also free to be driven directly.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    fn name(&self) -> &str {
        short_type_name(type_name::<Self>())
    }

    async fn start(&self) -> anyhow::Result<()>;

    async fn stop(&self) -> anyhow::Result<()>;
}

/// Constructor seam used by the container to build a service.
pub trait Inject: Sized {
    fn inject(injector: &Injector) -> anyhow::Result<Self>;
}

type Factory = fn(&Injector) -> anyhow::Result<Arc<dyn Service>>;

/// Declaration of a service type, instantiated only when the orchestrator starts.
///
/// Two references to the same concrete type are equal.
#[derive(Clone, Copy)]
pub struct ServiceRef {
    id: TypeId,
    type_name: &'static str,
    factory: Factory,
}

impl ServiceRef {
    pub fn of<S>() -> Self
    where
        S: Service + Inject,
    {
        Self {
            id: TypeId::of::<S>(),
            type_name: type_name::<S>(),
            factory: construct::<S>,
        }
    }

    /// Fully qualified type name of the declared service.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    pub(crate) fn construct(&self, injector: &Injector) -> anyhow::Result<Arc<dyn Service>> {
        (self.factory)(injector)
    }
}

fn construct<S>(injector: &Injector) -> anyhow::Result<Arc<dyn Service>>
where
    S: Service + Inject,
{
    Ok(Arc::new(S::inject(injector)?))
}

impl PartialEq for ServiceRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceRef {}

impl Hash for ServiceRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceRef").field(&self.type_name).finish()
    }
}

/// Last path segment of a type name, ignoring generic arguments.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl Inject for Idle {
        fn inject(_: &Injector) -> anyhow::Result<Self> {
            Ok(Idle)
        }
    }

    #[async_trait]
    impl Service for Idle {
        async fn start(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Other;

    impl Inject for Other {
        fn inject(_: &Injector) -> anyhow::Result<Self> {
            Ok(Other)
        }
    }

    #[async_trait]
    impl Service for Other {
        fn name(&self) -> &str {
            "other"
        }

        async fn start(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn references_compare_by_type() {
        assert_eq!(ServiceRef::of::<Idle>(), ServiceRef::of::<Idle>());
        assert_ne!(ServiceRef::of::<Idle>(), ServiceRef::of::<Other>());
        assert_eq!(ServiceRef::of::<Idle>().short_name(), "Idle");
    }

    #[test]
    fn default_name_is_the_type_name() {
        assert_eq!(Idle.name(), "Idle");
        assert_eq!(Other.name(), "other");
    }

    #[test]
    fn short_names_strip_paths_and_generics() {
        assert_eq!(short_type_name("a::b::Web<c::D>"), "Web");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
