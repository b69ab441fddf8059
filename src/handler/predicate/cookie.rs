use std::sync::Arc;

use axum::http::header::COOKIE;
use cookie::Cookie;
use serde::{Deserialize, Serialize};

use super::{full_match, required, FnPredicate, PredicateFactory, RoutePredicate};
use crate::error::FactoryError;
use crate::exchange::ServerExchange;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CookieConfig {
    pub name: Option<String>,
    pub regexp: Option<String>,
}

/// Matches when a cookie with the given name has a value matching `regexp`.
pub struct CookieRoutePredicateFactory;

impl PredicateFactory for CookieRoutePredicateFactory {
    type Config = CookieConfig;

    fn name(&self) -> &'static str {
        "Cookie"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["name", "regexp"]
    }

    fn apply(&self, config: CookieConfig) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
        let name = required(config.name, "name")?;
        let regexp = required(config.regexp, "regexp")?;
        let pattern = full_match(&regexp)?;

        Ok(FnPredicate::arc(
            format!("Cookie: {name} {regexp}"),
            move |exchange: &mut ServerExchange| {
                exchange
                    .request
                    .headers()
                    .get_all(COOKIE)
                    .iter()
                    .filter_map(|value| value.to_str().ok())
                    .flat_map(|header| Cookie::split_parse(header))
                    .filter_map(Result::ok)
                    .any(|cookie| cookie.name() == name && pattern.is_match(cookie.value()))
            },
        ))
    }
}
