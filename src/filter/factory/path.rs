//! Path rewriting filters: `PrefixPath`, `StripPrefix`, `RewritePath`.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::FilterFactory;
use crate::binding::de;
use crate::error::{FactoryError, GatewayError};
use crate::exchange::ServerExchange;
use crate::filter::GatewayFilter;
use crate::handler::GatewayFilterChain;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixPathConfig {
    pub prefix: Option<String>,
}

struct PrefixPath {
    prefix: String,
}

#[async_trait]
impl GatewayFilter for PrefixPath {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        let path = format!("{}{}", self.prefix, exchange.request.uri().path());
        exchange.set_request_path(&path)?;
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "PrefixPath"
    }
}

/// Prepends a fixed prefix to the request path.
pub struct PrefixPathGatewayFilterFactory;

impl FilterFactory for PrefixPathGatewayFilterFactory {
    type Config = PrefixPathConfig;

    fn name(&self) -> &'static str {
        "PrefixPath"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["prefix"]
    }

    fn apply(&self, config: PrefixPathConfig) -> Result<Arc<dyn GatewayFilter>, FactoryError> {
        let prefix = config
            .prefix
            .ok_or_else(|| FactoryError::new("'prefix' is required"))?;
        Ok(Arc::new(PrefixPath {
            prefix: prefix.trim_end_matches('/').to_string(),
        }))
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StripPrefixConfig {
    #[serde(deserialize_with = "de::lenient")]
    pub parts: usize,
}

struct StripPrefix {
    parts: usize,
}

fn strip_segments(path: &str, parts: usize) -> String {
    let remaining: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .skip(parts)
        .collect();

    let mut stripped = format!("/{}", remaining.join("/"));
    if path.ends_with('/') && !remaining.is_empty() {
        stripped.push('/');
    }
    stripped
}

#[async_trait]
impl GatewayFilter for StripPrefix {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        let path = strip_segments(exchange.request.uri().path(), self.parts);
        exchange.set_request_path(&path)?;
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "StripPrefix"
    }
}

/// Removes the first `parts` path segments.
pub struct StripPrefixGatewayFilterFactory;

impl FilterFactory for StripPrefixGatewayFilterFactory {
    type Config = StripPrefixConfig;

    fn name(&self) -> &'static str {
        "StripPrefix"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["parts"]
    }

    fn apply(&self, config: StripPrefixConfig) -> Result<Arc<dyn GatewayFilter>, FactoryError> {
        Ok(Arc::new(StripPrefix {
            parts: config.parts,
        }))
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewritePathConfig {
    pub regexp: Option<String>,
    pub replacement: Option<String>,
}

struct RewritePath {
    regexp: Regex,
    replacement: String,
}

#[async_trait]
impl GatewayFilter for RewritePath {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        let path = exchange.request.uri().path();
        let rewritten = self
            .regexp
            .replace_all(path, self.replacement.as_str())
            .into_owned();
        exchange.set_request_path(&rewritten)?;
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "RewritePath"
    }
}

/// Rewrites the request path with a regex replacement.
///
/// `$\` in the replacement stands for `$`, so replacements survive formats
/// that treat `$` specially. Named groups are referenced as `${name}`.
pub struct RewritePathGatewayFilterFactory;

impl FilterFactory for RewritePathGatewayFilterFactory {
    type Config = RewritePathConfig;

    fn name(&self) -> &'static str {
        "RewritePath"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["regexp", "replacement"]
    }

    fn apply(&self, config: RewritePathConfig) -> Result<Arc<dyn GatewayFilter>, FactoryError> {
        let source = config
            .regexp
            .ok_or_else(|| FactoryError::new("'regexp' is required"))?;
        let regexp = Regex::new(&source)
            .map_err(|e| FactoryError::new(format!("invalid regexp '{source}': {e}")))?;
        let replacement = config.replacement.unwrap_or_default().replace("$\\", "$");

        Ok(Arc::new(RewritePath {
            regexp,
            replacement,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::run;
    use super::*;
    use crate::handler::predicate::test_support::get;

    #[tokio::test]
    async fn prefixes_the_path() {
        let mut ex = get("/get?x=1");
        let filter = PrefixPathGatewayFilterFactory
            .apply(PrefixPathConfig {
                prefix: Some("/httpbin".into()),
            })
            .unwrap();
        run(filter, &mut ex).await;
        assert_eq!(ex.request.uri().to_string(), "/httpbin/get?x=1");
    }

    #[test]
    fn strips_leading_segments() {
        assert_eq!(strip_segments("/name/bar/foo", 2), "/foo");
        assert_eq!(strip_segments("/name/bar/", 1), "/bar/");
        assert_eq!(strip_segments("/name", 3), "/");
    }

    #[tokio::test]
    async fn rewrites_with_named_groups() {
        let mut ex = get("/orders/items/42");
        let filter = RewritePathGatewayFilterFactory
            .apply(RewritePathConfig {
                regexp: Some("/orders/(?<remaining>.*)".into()),
                replacement: Some("/$\\{remaining}".into()),
            })
            .unwrap();
        run(filter, &mut ex).await;
        assert_eq!(ex.request.uri().path(), "/items/42");
    }
}
