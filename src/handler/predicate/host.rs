use std::sync::Arc;

use axum::http::header::HOST;
use serde::{Deserialize, Serialize};

use super::{required, FnPredicate, PredicateFactory, RoutePredicate};
use crate::error::FactoryError;
use crate::exchange::ServerExchange;
use crate::support::PathPattern;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub pattern: Option<String>,
}

/// Matches the `Host` header (port stripped, case-insensitive) against an
/// Ant-style pattern using `.` as the separator. `{name}` segments are
/// captured into the exchange's URI template variables.
pub struct HostRoutePredicateFactory;

impl PredicateFactory for HostRoutePredicateFactory {
    type Config = HostConfig;

    fn name(&self) -> &'static str {
        "Host"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["pattern"]
    }

    fn apply(&self, config: HostConfig) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
        let source = required(config.pattern, "pattern")?;
        let pattern = PathPattern::host(&source.to_ascii_lowercase())
            .map_err(|e| FactoryError::new(format!("invalid host pattern '{source}': {e}")))?;

        Ok(FnPredicate::arc(
            format!("Host: {source}"),
            move |exchange: &mut ServerExchange| {
                let Some(host) = request_host(exchange) else {
                    return false;
                };
                match pattern.match_variables(&host) {
                    Some(variables) => {
                        exchange.attributes.uri_template_variables.extend(variables);
                        true
                    }
                    None => false,
                }
            },
        ))
    }
}

fn request_host(exchange: &ServerExchange) -> Option<String> {
    let raw = match exchange.request.headers().get(HOST) {
        Some(value) => value.to_str().ok()?.to_string(),
        None => exchange.request.uri().host()?.to_string(),
    };
    let host = match raw.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => raw.as_str(),
    };
    Some(host.to_ascii_lowercase())
}
