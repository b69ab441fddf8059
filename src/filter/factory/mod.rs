//! Named filter factories for route definitions.
//!
//! # Responsibilities
//! - Register `FilterFactory` implementations by name
//! - Bind `FilterDefinition` arguments and build `GatewayFilter`s
//!
//! # Design Decisions
//! - Same shape as the predicate factories: typed `Config`, object-safe
//!   `DynFilterFactory` in the registry, last registration wins
//! - Filters built here carry no order; the route compiler assigns one

mod headers;
mod parameter;
mod path;
mod status;

pub use headers::{
    AddRequestHeaderGatewayFilterFactory, AddResponseHeaderGatewayFilterFactory,
    RemoveRequestHeaderGatewayFilterFactory, RemoveResponseHeaderGatewayFilterFactory,
};
pub use parameter::AddRequestParameterGatewayFilterFactory;
pub use path::{
    PrefixPathGatewayFilterFactory, RewritePathGatewayFilterFactory,
    StripPrefixGatewayFilterFactory,
};
pub use status::SetStatusGatewayFilterFactory;

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use super::GatewayFilter;
use crate::binding::{properties_to_args, Binder, Bound};
use crate::definition::Args;
use crate::error::{ApplyError, FactoryError};
use crate::support::EvaluationContext;

/// A named builder of filters.
pub trait FilterFactory: Send + Sync + 'static {
    type Config: Serialize + DeserializeOwned + Default;

    /// Name used in definitions (`AddRequestHeader`, `StripPrefix`, ...).
    fn name(&self) -> &'static str;

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &[]
    }

    fn shortcut_field_prefix(&self) -> Option<&'static str> {
        None
    }

    fn apply(&self, config: Self::Config) -> Result<Arc<dyn GatewayFilter>, FactoryError>;
}

/// Object-safe view of a `FilterFactory`, as stored in the registry.
pub trait DynFilterFactory: Send + Sync {
    fn factory_name(&self) -> &str;

    fn shortcut_fields(&self) -> &[&str];

    fn create(
        &self,
        args: &Args,
        context: Option<&dyn EvaluationContext>,
    ) -> Result<Bound<Arc<dyn GatewayFilter>>, ApplyError>;
}

impl<F: FilterFactory> DynFilterFactory for F {
    fn factory_name(&self) -> &str {
        FilterFactory::name(self)
    }

    fn shortcut_fields(&self) -> &[&str] {
        self.shortcut_field_order()
    }

    fn create(
        &self,
        args: &Args,
        context: Option<&dyn EvaluationContext>,
    ) -> Result<Bound<Arc<dyn GatewayFilter>>, ApplyError> {
        let binder = Binder::new(FilterFactory::name(self))
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

/// Name → filter factory.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    factories: HashMap<String, Arc<dyn DynFilterFactory>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in filter factory.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(AddRequestHeaderGatewayFilterFactory);
        registry.insert(AddRequestParameterGatewayFilterFactory);
        registry.insert(AddResponseHeaderGatewayFilterFactory);
        registry.insert(RemoveRequestHeaderGatewayFilterFactory);
        registry.insert(RemoveResponseHeaderGatewayFilterFactory);
        registry.insert(PrefixPathGatewayFilterFactory);
        registry.insert(StripPrefixGatewayFilterFactory);
        registry.insert(RewritePathGatewayFilterFactory);
        registry.insert(SetStatusGatewayFilterFactory);
        registry
    }

    pub fn insert<F: FilterFactory>(&mut self, factory: F) {
        self.insert_dyn(Arc::new(factory));
    }

    pub fn insert_dyn(&mut self, factory: Arc<dyn DynFilterFactory>) {
        let name = factory.factory_name().to_string();
        if self.factories.insert(name.clone(), factory).is_some() {
            warn!(factory = %name, "Duplicate filter factory name, replacing earlier registration");
        } else {
            info!(factory = %name, "Loaded filter factory");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DynFilterFactory>> {
        self.factories.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

pub(crate) fn header_name(raw: Option<String>) -> Result<HeaderName, FactoryError> {
    let raw = raw.ok_or_else(|| FactoryError::new("'name' is required"))?;
    HeaderName::from_bytes(raw.trim().as_bytes())
        .map_err(|e| FactoryError::new(format!("invalid header name '{raw}': {e}")))
}

pub(crate) fn header_value(raw: Option<String>) -> Result<HeaderValue, FactoryError> {
    let raw = raw.unwrap_or_default();
    HeaderValue::from_str(&raw)
        .map_err(|e| FactoryError::new(format!("invalid header value '{raw}': {e}")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::GatewayError;
    use crate::exchange::ServerExchange;
    use crate::filter::OrderedFilter;
    use crate::handler::GatewayFilterChain;
    use async_trait::async_trait;

    /// Terminal filter standing in for the upstream; writes a fixed response.
    pub struct Upstream {
        pub status: axum::http::StatusCode,
        pub headers: Vec<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl GatewayFilter for Upstream {
        async fn filter(
            &self,
            exchange: &mut ServerExchange,
            _chain: GatewayFilterChain,
        ) -> Result<(), GatewayError> {
            *exchange.response.status_mut() = self.status;
            for (name, value) in &self.headers {
                exchange
                    .response
                    .headers_mut()
                    .append(*name, HeaderValue::from_static(*value));
            }
            exchange.set_already_routed();
            Ok(())
        }

        fn name(&self) -> &str {
            "Upstream"
        }
    }

    /// Run `filter` followed by an `Upstream` stub.
    pub async fn run(filter: Arc<dyn GatewayFilter>, exchange: &mut ServerExchange) {
        let upstream = Upstream {
            status: axum::http::StatusCode::OK,
            headers: vec![("x-upstream", "1"), ("x-secret", "s")],
        };
        let filters: Arc<[OrderedFilter]> = vec![
            OrderedFilter::new(filter, 1),
            OrderedFilter::new(Arc::new(upstream), 2),
        ]
        .into();
        GatewayFilterChain::new(filters)
            .proceed(exchange)
            .await
            .unwrap();
    }
}
