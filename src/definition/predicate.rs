//! Predicate definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{split_text, stringify_args, Args, DefinitionError, DefinitionRepr};

/// Names a predicate factory and carries its raw arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "DefinitionRepr")]
pub struct PredicateDefinition {
    pub name: String,
    pub args: Args,
}

impl PredicateDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Args::new(),
        }
    }

    /// Builder-style explicit argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn add_arg(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.args.insert(key.into(), value.into());
    }
}

impl FromStr for PredicateDefinition {
    type Err = DefinitionError;

    /// Parses `Name=arg1,arg2,...`. A predicate always needs the `=`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match split_text(text) {
            (name, Some(args)) => Ok(Self {
                name: name.to_string(),
                args,
            }),
            (_, None) => Err(DefinitionError::MissingName(text.to_string())),
        }
    }
}

impl TryFrom<DefinitionRepr> for PredicateDefinition {
    type Error = DefinitionError;

    fn try_from(repr: DefinitionRepr) -> Result<Self, Self::Error> {
        match repr {
            DefinitionRepr::Text(text) => text.parse(),
            DefinitionRepr::Table { name, args, .. } => Ok(Self {
                name,
                args: stringify_args(args),
            }),
        }
    }
}

impl fmt::Display for PredicateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "=")?;
            for (i, (key, value)) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                if super::is_generated_name(key) {
                    write!(f, "{value}")?;
                } else {
                    write!(f, "{key}:{value}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cookie_shortcut() {
        let def: PredicateDefinition = "Cookie=username,xuzf".parse().unwrap();
        assert_eq!(def.name, "Cookie");
        assert_eq!(def.args.len(), 2);
        let entries: Vec<_> = def.args.iter().collect();
        assert_eq!(entries[0], (&"_genkey_0".to_string(), &"username".to_string()));
        assert_eq!(entries[1], (&"_genkey_1".to_string(), &"xuzf".to_string()));
    }

    #[test]
    fn rejects_text_without_name() {
        assert!("Path".parse::<PredicateDefinition>().is_err());
        assert!("=/get".parse::<PredicateDefinition>().is_err());
    }

    #[test]
    fn deserializes_both_forms() {
        #[derive(Deserialize)]
        struct Holder {
            predicates: Vec<PredicateDefinition>,
        }

        let holder: Holder = toml::from_str(
            r#"
            predicates = [
                "Path=/get",
                { name = "Query", args = { param = "foo", regexp = "ba." } },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(holder.predicates[0].name, "Path");
        assert_eq!(holder.predicates[0].args["_genkey_0"], "/get");
        assert_eq!(holder.predicates[1].args["param"], "foo");
        assert_eq!(holder.predicates[1].args["regexp"], "ba.");
    }

    #[test]
    fn display_round_trips_shortcut_text() {
        let def: PredicateDefinition = "Path=/get".parse().unwrap();
        assert_eq!(def.to_string(), "Path=/get");
    }
}
