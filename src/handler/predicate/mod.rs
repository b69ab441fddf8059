//! Route predicates and the factories that build them.
//!
//! # Responsibilities
//! - Define the asynchronous `RoutePredicate` capability
//! - Combine a route's predicates with short-circuit AND
//! - Register named `PredicateFactory` implementations and build predicates
//!   from `PredicateDefinition` arguments
//!
//! # Design Decisions
//! - Factories are typed (`PredicateFactory::Config`); the registry stores
//!   them behind the object-safe `DynPredicateFactory`, which binds the
//!   arguments before calling `apply`
//! - Lookup is one `HashMap` access by name; registering a duplicate name
//!   replaces the earlier factory with a warning
//! - A predicate may fail; the matcher treats that as a non-match

mod cookie;
mod datetime;
mod header;
mod host;
mod method;
mod path;
mod query;

pub use cookie::CookieRoutePredicateFactory;
pub use datetime::{
    AfterRoutePredicateFactory, BeforeRoutePredicateFactory, BetweenRoutePredicateFactory,
};
pub use header::HeaderRoutePredicateFactory;
pub use host::HostRoutePredicateFactory;
pub use method::MethodRoutePredicateFactory;
pub use path::PathRoutePredicateFactory;
pub use query::QueryRoutePredicateFactory;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::binding::{properties_to_args, Binder, Bound};
use crate::definition::Args;
use crate::error::{ApplyError, FactoryError, PredicateError};
use crate::exchange::ServerExchange;
use crate::support::EvaluationContext;

/// A boolean test over an inbound request.
#[async_trait]
pub trait RoutePredicate: Send + Sync {
    async fn test(&self, exchange: &mut ServerExchange) -> Result<bool, PredicateError>;

    /// Short label used in logs.
    fn name(&self) -> &str;
}

impl fmt::Debug for dyn RoutePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical AND over predicates, evaluated in declaration order.
///
/// Stops at the first predicate that does not hold.
pub struct AndPredicate {
    predicates: Vec<Arc<dyn RoutePredicate>>,
    name: String,
}

impl AndPredicate {
    pub fn new(predicates: Vec<Arc<dyn RoutePredicate>>) -> Self {
        let name = predicates
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(" && ");
        Self { predicates, name }
    }
}

#[async_trait]
impl RoutePredicate for AndPredicate {
    async fn test(&self, exchange: &mut ServerExchange) -> Result<bool, PredicateError> {
        for predicate in &self.predicates {
            if !predicate.test(exchange).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Adapts a synchronous closure into a `RoutePredicate`.
pub struct FnPredicate<F> {
    name: String,
    test: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&mut ServerExchange) -> bool + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, test: F) -> Self {
        Self {
            name: name.into(),
            test,
        }
    }

    pub fn arc(name: impl Into<String>, test: F) -> Arc<dyn RoutePredicate> {
        Arc::new(Self::new(name, test))
    }
}

#[async_trait]
impl<F> RoutePredicate for FnPredicate<F>
where
    F: Fn(&mut ServerExchange) -> bool + Send + Sync + 'static,
{
    async fn test(&self, exchange: &mut ServerExchange) -> Result<bool, PredicateError> {
        Ok((self.test)(exchange))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A named builder of predicates.
pub trait PredicateFactory: Send + Sync + 'static {
    type Config: Serialize + DeserializeOwned + Default;

    /// Name used in definitions (`Path`, `Host`, ...).
    fn name(&self) -> &'static str;

    /// Config fields that positional arguments bind to, in order.
    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &[]
    }

    /// Optional prefix accepted on explicit argument keys.
    fn shortcut_field_prefix(&self) -> Option<&'static str> {
        None
    }

    fn apply(&self, config: Self::Config) -> Result<Arc<dyn RoutePredicate>, FactoryError>;
}

/// Object-safe view of a `PredicateFactory`, as stored in the registry.
pub trait DynPredicateFactory: Send + Sync {
    fn factory_name(&self) -> &str;

    fn shortcut_fields(&self) -> &[&str];

    /// Bind `args` and build the predicate.
    fn create(
        &self,
        args: &Args,
        context: Option<&dyn EvaluationContext>,
    ) -> Result<Bound<Arc<dyn RoutePredicate>>, ApplyError>;
}

impl<F: PredicateFactory> DynPredicateFactory for F {
    fn factory_name(&self) -> &str {
        PredicateFactory::name(self)
    }

    fn shortcut_fields(&self) -> &[&str] {
        self.shortcut_field_order()
    }

    fn create(
        &self,
        args: &Args,
        context: Option<&dyn EvaluationContext>,
    ) -> Result<Bound<Arc<dyn RoutePredicate>>, ApplyError> {
        let binder = Binder::new(PredicateFactory::name(self))
            .shortcut_fields(self.shortcut_field_order())
            .prefix(self.shortcut_field_prefix())
            .context(context);
        let properties = binder.normalize(args)?;
        let bound = properties_to_args(&properties);
        let config = binder.bind_properties::<F::Config>(properties)?;
        Ok(Bound {
            built: self.apply(config)?,
            properties: bound,
        })
    }
}

/// Name → predicate factory.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    factories: HashMap<String, Arc<dyn DynPredicateFactory>>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in predicate factory.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(AfterRoutePredicateFactory);
        registry.insert(BeforeRoutePredicateFactory);
        registry.insert(BetweenRoutePredicateFactory);
        registry.insert(CookieRoutePredicateFactory);
        registry.insert(HeaderRoutePredicateFactory);
        registry.insert(HostRoutePredicateFactory);
        registry.insert(MethodRoutePredicateFactory);
        registry.insert(PathRoutePredicateFactory);
        registry.insert(QueryRoutePredicateFactory);
        registry
    }

    pub fn insert<F: PredicateFactory>(&mut self, factory: F) {
        self.insert_dyn(Arc::new(factory));
    }

    pub fn insert_dyn(&mut self, factory: Arc<dyn DynPredicateFactory>) {
        let name = factory.factory_name().to_string();
        if self.factories.insert(name.clone(), factory).is_some() {
            warn!(factory = %name, "Duplicate predicate factory name, replacing earlier registration");
        } else {
            info!(factory = %name, "Loaded predicate factory");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DynPredicateFactory>> {
        self.factories.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Compile `regexp` so that it must match the whole input.
pub(crate) fn full_match(regexp: &str) -> Result<Regex, FactoryError> {
    Regex::new(&format!("^(?:{regexp})$"))
        .map_err(|e| FactoryError::new(format!("invalid regexp '{regexp}': {e}")))
}

/// Unwrap a required config field.
pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, FactoryError> {
    value.ok_or_else(|| FactoryError::new(format!("'{field}' is required")))
}


#[cfg(test)]
mod tests {
    use super::test_support::get;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        result: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RoutePredicate for Counting {
        async fn test(&self, _exchange: &mut ServerExchange) -> Result<bool, PredicateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result)
        }

        fn name(&self) -> &str {
            "Counting"
        }
    }

    #[tokio::test]
    async fn and_short_circuits_on_first_false() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counting = |result| -> Arc<dyn RoutePredicate> {
            Arc::new(Counting {
                result,
                calls: calls.clone(),
            })
        };
        let and = AndPredicate::new(vec![counting(true), counting(false), counting(true)]);

        assert!(!and.test(&mut get("/")).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn builds_predicates_from_definitions() {
        let registry = PredicateRegistry::with_defaults();
        let factory = registry.get("Path").unwrap();
        let args = "Path=/get"
            .parse::<crate::definition::PredicateDefinition>()
            .unwrap()
            .args;

        let predicate = factory.create(&args, None).unwrap().built;
        assert!(predicate.test(&mut get("/get")).await.unwrap());
        assert!(!predicate.test(&mut get("/other")).await.unwrap());
    }

    #[test]
    fn duplicate_registration_keeps_the_last() {
        struct AlwaysFalse;
        impl PredicateFactory for AlwaysFalse {
            type Config = ();
            fn name(&self) -> &'static str {
                "Path"
            }
            fn apply(&self, _config: ()) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
                Ok(FnPredicate::arc("AlwaysFalse", |_: &mut ServerExchange| false))
            }
        }

        let mut registry = PredicateRegistry::with_defaults();
        registry.insert(AlwaysFalse);
        let predicate = registry
            .get("Path")
            .unwrap()
            .create(&Args::new(), None)
            .unwrap()
            .built;
        assert_eq!(predicate.name(), "AlwaysFalse");
        assert!(registry.names().contains(&"Cookie"));
    }
}
