use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::FilterFactory;
use crate::error::{FactoryError, GatewayError};
use crate::exchange::ServerExchange;
use crate::filter::GatewayFilter;
use crate::handler::GatewayFilterChain;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddRequestParameterConfig {
    pub name: Option<String>,
    pub value: Option<String>,
}

struct AddRequestParameter {
    name: String,
    value: String,
}

#[async_trait]
impl GatewayFilter for AddRequestParameter {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        let pair = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.name, &self.value)
            .finish();

        let query = match exchange.request.uri().query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{pair}"),
            _ => pair,
        };
        exchange.set_request_query(Some(&query))?;
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "AddRequestParameter"
    }
}

/// Appends a query parameter to the request.
pub struct AddRequestParameterGatewayFilterFactory;

impl FilterFactory for AddRequestParameterGatewayFilterFactory {
    type Config = AddRequestParameterConfig;

    fn name(&self) -> &'static str {
        "AddRequestParameter"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["name", "value"]
    }

    fn apply(
        &self,
        config: AddRequestParameterConfig,
    ) -> Result<Arc<dyn GatewayFilter>, FactoryError> {
        let name = config
            .name
            .ok_or_else(|| FactoryError::new("'name' is required"))?;
        Ok(Arc::new(AddRequestParameter {
            name,
            value: config.value.unwrap_or_default(),
        }))
    }
}
