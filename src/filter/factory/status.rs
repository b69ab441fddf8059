use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::FilterFactory;
use crate::error::{FactoryError, GatewayError};
use crate::exchange::ServerExchange;
use crate::filter::GatewayFilter;
use crate::handler::GatewayFilterChain;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetStatusConfig {
    /// Numeric code (`401`) or reason name (`UNAUTHORIZED`).
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> Option<StatusCode> {
    let raw = raw.trim();
    if let Ok(code) = raw.parse::<u16>() {
        return StatusCode::from_u16(code).ok();
    }

    let wanted = raw.to_ascii_uppercase().replace(['-', ' '], "_");
    (100..=599u16)
        .filter_map(|code| StatusCode::from_u16(code).ok())
        .find(|status| {
            status
                .canonical_reason()
                .map(|reason| reason.to_ascii_uppercase().replace([' ', '-'], "_") == wanted)
                .unwrap_or(false)
        })
}

struct SetStatus {
    status: StatusCode,
}

#[async_trait]
impl GatewayFilter for SetStatus {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        chain.proceed(exchange).await?;
        *exchange.response.status_mut() = self.status;
        Ok(())
    }

    fn name(&self) -> &str {
        "SetStatus"
    }
}

/// Overrides the response status once the rest of the chain has run.
pub struct SetStatusGatewayFilterFactory;

impl FilterFactory for SetStatusGatewayFilterFactory {
    type Config = SetStatusConfig;

    fn name(&self) -> &'static str {
        "SetStatus"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["status"]
    }

    fn apply(&self, config: SetStatusConfig) -> Result<Arc<dyn GatewayFilter>, FactoryError> {
        let raw = config
            .status
            .ok_or_else(|| FactoryError::new("'status' is required"))?;
        let status =
            parse_status(&raw).ok_or_else(|| FactoryError::new(format!("unknown status '{raw}'")))?;
        Ok(Arc::new(SetStatus { status }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::run;
    use super::*;
    use crate::handler::predicate::test_support::get;

    #[test]
    fn parses_codes_and_names() {
        assert_eq!(parse_status("401"), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(parse_status("BAD_REQUEST"), Some(StatusCode::BAD_REQUEST));
        assert_eq!(parse_status("not_found"), Some(StatusCode::NOT_FOUND));
        assert_eq!(parse_status("NOPE"), None);
    }

    #[tokio::test]
    async fn overrides_upstream_status() {
        let filter = SetStatusGatewayFilterFactory
            .apply(SetStatusConfig {
                status: Some("UNAUTHORIZED".into()),
            })
            .unwrap();
        let mut ex = get("/");
        run(filter, &mut ex).await;
        assert_eq!(ex.response.status(), StatusCode::UNAUTHORIZED);
    }
}
