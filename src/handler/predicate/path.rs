use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{required, FnPredicate, PredicateFactory, RoutePredicate};
use crate::error::FactoryError;
use crate::exchange::ServerExchange;
use crate::support::PathPattern;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    pub pattern: Option<String>,
}

/// Matches the request path against an Ant-style pattern. `{name}` segments
/// are captured into the exchange's URI template variables.
pub struct PathRoutePredicateFactory;

impl PredicateFactory for PathRoutePredicateFactory {
    type Config = PathConfig;

    fn name(&self) -> &'static str {
        "Path"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["pattern"]
    }

    fn apply(&self, config: PathConfig) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
        let source = required(config.pattern, "pattern")?;
        let pattern = PathPattern::path(&source)
            .map_err(|e| FactoryError::new(format!("invalid path pattern '{source}': {e}")))?;

        Ok(FnPredicate::arc(
            format!("Path: {source}"),
            move |exchange: &mut ServerExchange| {
                match pattern.match_variables(exchange.request.uri().path()) {
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

#[cfg(test)]
mod tests {
    use super::super::test_support::get;
    use super::*;

    fn path(pattern: &str) -> Arc<dyn RoutePredicate> {
        PathRoutePredicateFactory
            .apply(PathConfig {
                pattern: Some(pattern.into()),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn literal_and_catch_all_patterns() {
        assert!(path("/get").test(&mut get("/get")).await.unwrap());
        assert!(!path("/get").test(&mut get("/anything")).await.unwrap());
        assert!(path("/**").test(&mut get("/anything")).await.unwrap());
    }

    #[tokio::test]
    async fn query_string_is_ignored() {
        assert!(path("/get").test(&mut get("/get?x=1")).await.unwrap());
    }

    #[tokio::test]
    async fn records_template_variables() {
        let mut ex = get("/orders/17");
        assert!(path("/orders/{id}").test(&mut ex).await.unwrap());
        assert_eq!(ex.attributes.uri_template_variables["id"], "17");
    }

    #[test]
    fn missing_pattern_is_rejected() {
        assert!(PathRoutePredicateFactory.apply(PathConfig::default()).is_err());
    }
}
