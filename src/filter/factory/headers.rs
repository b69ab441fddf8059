//! Request and response header filters.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{header_name, header_value, FilterFactory};
use crate::error::{FactoryError, GatewayError};
use crate::exchange::ServerExchange;
use crate::filter::GatewayFilter;
use crate::handler::GatewayFilterChain;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NameValueConfig {
    pub name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NameConfig {
    pub name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Request,
    Response,
}

/// Appends a header to the request or response.
///
/// Response headers are added before the request is routed so that they
/// sit alongside whatever the upstream returns.
struct AddHeader {
    label: &'static str,
    target: Target,
    name: HeaderName,
    value: HeaderValue,
}

#[async_trait]
impl GatewayFilter for AddHeader {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        let headers = match self.target {
            Target::Request => exchange.request.headers_mut(),
            Target::Response => exchange.response.headers_mut(),
        };
        headers.append(self.name.clone(), self.value.clone());
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        self.label
    }
}

/// Removes a header from the request before routing, or from the response
/// after it.
struct RemoveHeader {
    label: &'static str,
    target: Target,
    name: HeaderName,
}

#[async_trait]
impl GatewayFilter for RemoveHeader {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        match self.target {
            Target::Request => {
                exchange.request.headers_mut().remove(&self.name);
                chain.proceed(exchange).await
            }
            Target::Response => {
                chain.proceed(exchange).await?;
                exchange.response.headers_mut().remove(&self.name);
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        self.label
    }
}

pub struct AddRequestHeaderGatewayFilterFactory;

impl FilterFactory for AddRequestHeaderGatewayFilterFactory {
    type Config = NameValueConfig;

    fn name(&self) -> &'static str {
        "AddRequestHeader"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["name", "value"]
    }

    fn apply(&self, config: NameValueConfig) -> Result<Arc<dyn GatewayFilter>, FactoryError> {
        Ok(Arc::new(AddHeader {
            label: "AddRequestHeader",
            target: Target::Request,
            name: header_name(config.name)?,
            value: header_value(config.value)?,
        }))
    }
}

pub struct AddResponseHeaderGatewayFilterFactory;

impl FilterFactory for AddResponseHeaderGatewayFilterFactory {
    type Config = NameValueConfig;

    fn name(&self) -> &'static str {
        "AddResponseHeader"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["name", "value"]
    }

    fn apply(&self, config: NameValueConfig) -> Result<Arc<dyn GatewayFilter>, FactoryError> {
        Ok(Arc::new(AddHeader {
            label: "AddResponseHeader",
            target: Target::Response,
            name: header_name(config.name)?,
            value: header_value(config.value)?,
        }))
    }
}

pub struct RemoveRequestHeaderGatewayFilterFactory;

impl FilterFactory for RemoveRequestHeaderGatewayFilterFactory {
    type Config = NameConfig;

    fn name(&self) -> &'static str {
        "RemoveRequestHeader"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["name"]
    }

    fn apply(&self, config: NameConfig) -> Result<Arc<dyn GatewayFilter>, FactoryError> {
        Ok(Arc::new(RemoveHeader {
            label: "RemoveRequestHeader",
            target: Target::Request,
            name: header_name(config.name)?,
        }))
    }
}

pub struct RemoveResponseHeaderGatewayFilterFactory;

impl FilterFactory for RemoveResponseHeaderGatewayFilterFactory {
    type Config = NameConfig;

    fn name(&self) -> &'static str {
        "RemoveResponseHeader"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["name"]
    }

    fn apply(&self, config: NameConfig) -> Result<Arc<dyn GatewayFilter>, FactoryError> {
        Ok(Arc::new(RemoveHeader {
            label: "RemoveResponseHeader",
            target: Target::Response,
            name: header_name(config.name)?,
        }))
    }
}
