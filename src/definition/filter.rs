//! Filter definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{split_text, stringify_args, Args, DefinitionError, DefinitionRepr};

/// Names a filter factory and carries its raw arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "DefinitionRepr")]
pub struct FilterDefinition {
    pub name: String,
    pub args: Args,
    /// Explicit execution order. When absent the compiler assigns
    /// `position + 1` within the list the definition came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl FilterDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Args::new(),
            order: None,
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn add_arg(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.args.insert(key.into(), value.into());
    }
}

impl FromStr for FilterDefinition {
    type Err = DefinitionError;

    /// Parses `Name=arg1,arg2,...`; a bare `Name` is a filter without arguments.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (name, args) = split_text(text);
        if name.is_empty() {
            return Err(DefinitionError::MissingName(text.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            args: args.unwrap_or_default(),
            order: None,
        })
    }
}

impl TryFrom<DefinitionRepr> for FilterDefinition {
    type Error = DefinitionError;

    fn try_from(repr: DefinitionRepr) -> Result<Self, Self::Error> {
        match repr {
            DefinitionRepr::Text(text) => text.parse(),
            DefinitionRepr::Table { name, args, order } => Ok(Self {
                name,
                args: stringify_args(args),
                order,
            }),
        }
    }
}

impl fmt::Display for FilterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args: Vec<&str> = self.args.values().map(String::as_str).collect();
            write!(f, "={}", args.join(","))?;
        }
        Ok(())
    }
}
