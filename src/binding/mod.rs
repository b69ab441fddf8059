//! Argument binding: definition arguments → typed factory configuration.
//!
//! # Responsibilities
//! - Map positional (`_genkey_N`) arguments onto a factory's declared
//!   shortcut field order
//! - Accept explicit `field=value` arguments, optionally written `prefix.field`
//! - Evaluate `#{...}` values when an evaluation context is supplied
//! - Decode the resulting property map into the factory's config type
//!
//! # Design Decisions
//! - Normalisation is per entry: the i-th entry, if its key is generated, binds
//!   to the i-th shortcut field. Mixed definitions therefore behave
//!   predictably and a purely positional or purely explicit definition binds
//!   as expected
//! - The config's `Default` value, serialized to a JSON object, is both the
//!   starting point and the schema: a property whose key is not a field of
//!   that object is an unknown field
//! - Without an evaluation context, `#{...}` values are kept verbatim
//!
//! # Data Flow
//! ```text
//! Args (IndexMap<String,String>)
//!     → normalize()  : generated keys → field names, prefix stripped, #{} evaluated
//!     → overlay onto serde_json(Config::default())
//!     → serde_json::from_value::<Config>()
//! ```

pub mod de;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::definition::{is_generated_name, Args};
use crate::error::BindingError;
use crate::support::expression::{self, EvaluationContext};

/// A built predicate or filter with the properties it was bound from.
pub struct Bound<T> {
    pub built: T,
    /// Field name → value after normalisation and expression evaluation.
    pub properties: Args,
}

/// Flatten a normalised property map back into `Args`.
pub fn properties_to_args(properties: &Map<String, Value>) -> Args {
    properties
        .iter()
        .map(|(field, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (field.clone(), value)
        })
        .collect()
}

/// Binds definition arguments for one named factory.
#[derive(Clone, Copy)]
pub struct Binder<'a> {
    factory: &'a str,
    shortcut_fields: &'a [&'a str],
    prefix: Option<&'a str>,
    context: Option<&'a dyn EvaluationContext>,
}

impl<'a> Binder<'a> {
    pub fn new(factory: &'a str) -> Self {
        Self {
            factory,
            shortcut_fields: &[],
            prefix: None,
            context: None,
        }
    }

    /// Field names that positional arguments bind to, in order.
    pub fn shortcut_fields(mut self, fields: &'a [&'a str]) -> Self {
        self.shortcut_fields = fields;
        self
    }

    /// Optional prefix accepted (and stripped) on explicit keys.
    pub fn prefix(mut self, prefix: Option<&'a str>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Evaluate `#{...}` values against `context`.
    pub fn context(mut self, context: Option<&'a dyn EvaluationContext>) -> Self {
        self.context = context;
        self
    }

    /// Resolve argument keys to config field names and evaluate values.
    pub fn normalize(&self, args: &Args) -> Result<Map<String, Value>, BindingError> {
        let mut properties = Map::with_capacity(args.len());

        for (index, (key, value)) in args.iter().enumerate() {
            let field = if is_generated_name(key) {
                self.shortcut_fields.get(index).map(|f| f.to_string()).ok_or(
                    BindingError::TooManyArguments {
                        factory: self.factory.to_string(),
                        declared: self.shortcut_fields.len(),
                        given: args.len(),
                    },
                )?
            } else {
                self.strip_prefix(key).to_string()
            };

            let value = self.evaluate(key, value)?;
            properties.insert(field, Value::String(value));
        }

        Ok(properties)
    }

    /// Bind `args` into a fresh `C`.
    pub fn bind<C>(&self, args: &Args) -> Result<C, BindingError>
    where
        C: Serialize + DeserializeOwned + Default,
    {
        let properties = self.normalize(args)?;
        self.bind_properties(properties)
    }

    /// Overlay already-normalised properties onto `C::default()` and decode.
    pub fn bind_properties<C>(&self, properties: Map<String, Value>) -> Result<C, BindingError>
    where
        C: Serialize + DeserializeOwned + Default,
    {
        let mut fields = match serde_json::to_value(C::default()) {
            Ok(Value::Object(fields)) => fields,
            Ok(Value::Null) if properties.is_empty() => {
                return serde_json::from_value(Value::Null).map_err(|e| self.invalid(e));
            }
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                return Err(self.invalid(format!("configuration is not a struct: {other}")));
            }
            Err(e) => return Err(self.invalid(e)),
        };

        for (field, value) in properties {
            if !fields.contains_key(&field) {
                return Err(BindingError::UnknownField {
                    factory: self.factory.to_string(),
                    field,
                });
            }
            fields.insert(field, value);
        }

        serde_json::from_value(Value::Object(fields)).map_err(|e| self.invalid(e))
    }

    fn strip_prefix<'k>(&self, key: &'k str) -> &'k str {
        self.prefix
            .and_then(|prefix| key.strip_prefix(prefix))
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(key)
    }

    fn evaluate(&self, key: &str, value: &str) -> Result<String, BindingError> {
        match (self.context, expression::template_body(value)) {
            (Some(ctx), Some(body)) => {
                expression::evaluate(body, ctx).map_err(|source| BindingError::Expression {
                    factory: self.factory.to_string(),
                    key: key.to_string(),
                    source,
                })
            }
            _ => Ok(value.to_string()),
        }
    }

    fn invalid(&self, reason: impl std::fmt::Display) -> BindingError {
        BindingError::Invalid {
            factory: self.factory.to_string(),
            reason: reason.to_string(),
        }
    }
}
