use std::sync::Arc;

use axum::http::HeaderName;
use serde::{Deserialize, Serialize};

use super::{full_match, required, FnPredicate, PredicateFactory, RoutePredicate};
use crate::error::FactoryError;
use crate::exchange::ServerExchange;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderConfig {
    pub header: Option<String>,
    /// When absent, the header only has to be present.
    pub regexp: Option<String>,
}

/// Matches when any value of a request header matches `regexp`.
pub struct HeaderRoutePredicateFactory;

impl PredicateFactory for HeaderRoutePredicateFactory {
    type Config = HeaderConfig;

    fn name(&self) -> &'static str {
        "Header"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["header", "regexp"]
    }

    fn apply(&self, config: HeaderConfig) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
        let header = required(config.header, "header")?;
        let name = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| FactoryError::new(format!("invalid header name '{header}': {e}")))?;
        let pattern = config.regexp.as_deref().map(full_match).transpose()?;

        let label = format!("Header: {header} {}", config.regexp.unwrap_or_default());
        Ok(FnPredicate::arc(label, move |exchange: &mut ServerExchange| {
            let mut values = exchange.request.headers().get_all(&name).iter();
            match &pattern {
                Some(pattern) => values.any(|value| {
                    value
                        .to_str()
                        .map(|value| pattern.is_match(value))
                        .unwrap_or(false)
                }),
                None => values.next().is_some(),
            }
        }))
    }
}
