use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{full_match, required, FnPredicate, PredicateFactory, RoutePredicate};
use crate::error::FactoryError;
use crate::exchange::ServerExchange;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    pub param: Option<String>,
    /// When absent, the parameter only has to be present.
    pub regexp: Option<String>,
}

/// Matches on a query parameter, optionally constraining its value.
pub struct QueryRoutePredicateFactory;

impl PredicateFactory for QueryRoutePredicateFactory {
    type Config = QueryConfig;

    fn name(&self) -> &'static str {
        "Query"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["param", "regexp"]
    }

    fn apply(&self, config: QueryConfig) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
        let param = required(config.param, "param")?;
        let pattern = config.regexp.as_deref().map(full_match).transpose()?;

        let label = format!("Query: {param} {}", config.regexp.unwrap_or_default());
        Ok(FnPredicate::arc(label, move |exchange: &mut ServerExchange| {
            let query = exchange.request.uri().query().unwrap_or_default();
            let mut values = url::form_urlencoded::parse(query.as_bytes())
                .filter(|(name, _)| *name == param)
                .map(|(_, value)| value);

            match &pattern {
                Some(pattern) => values.any(|value| pattern.is_match(&value)),
                None => values.next().is_some(),
            }
        }))
    }
}
