use std::sync::Arc;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use super::{required, FnPredicate, PredicateFactory, RoutePredicate};
use crate::error::FactoryError;
use crate::exchange::ServerExchange;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodConfig {
    pub method: Option<String>,
}

/// Matches the request method.
pub struct MethodRoutePredicateFactory;

impl PredicateFactory for MethodRoutePredicateFactory {
    type Config = MethodConfig;

    fn name(&self) -> &'static str {
        "Method"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["method"]
    }

    fn apply(&self, config: MethodConfig) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
        let raw = required(config.method, "method")?;
        let method = Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
            .map_err(|e| FactoryError::new(format!("invalid method '{raw}': {e}")))?;

        Ok(FnPredicate::arc(
            format!("Method: {method}"),
            move |exchange: &mut ServerExchange| exchange.request.method() == method,
        ))
    }
}
