//! Declarative route definitions.
//!
//! # Data Flow
//! ```text
//! config file / discovery / admin API
//!     → RouteDefinition { id, uri, order, predicates, filters }
//!     → route compiler (route::definition_locator)
//!     → Route (executable)
//! ```
//!
//! # Design Decisions
//! - Definitions are plain values; nothing here executes
//! - Argument maps keep insertion order; positional arguments are stored under
//!   generated keys (`_genkey_0`, `_genkey_1`, ...) so their order survives
//! - Both the shortcut text form (`Cookie=username,xuzf`) and the table form
//!   (`{ name = "Cookie", args = { name = "username" } }`) deserialize

pub mod filter;
pub mod predicate;
pub mod route;

pub use filter::FilterDefinition;
pub use predicate::PredicateDefinition;
pub use route::RouteDefinition;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

/// Prefix of the keys generated for positional arguments.
pub const GENERATED_NAME_PREFIX: &str = "_genkey_";

/// Ordered argument map of a predicate or filter definition.
pub type Args = IndexMap<String, String>;

/// Key under which the `index`-th positional argument is stored.
pub fn generate_name(index: usize) -> String {
    format!("{GENERATED_NAME_PREFIX}{index}")
}

pub fn is_generated_name(key: &str) -> bool {
    key.starts_with(GENERATED_NAME_PREFIX)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("unable to parse definition text '{0}', must be of the form name=value")]
    MissingName(String),
}

/// Split `name=a, b ,c` into its name and positional arguments.
///
/// Returns `None` for the argument part when there is no `=`.
fn split_text(text: &str) -> (&str, Option<Args>) {
    match text.find('=') {
        Some(idx) if idx > 0 => {
            let args = text[idx + 1..]
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .enumerate()
                .map(|(i, token)| (generate_name(i), token.to_string()))
                .collect();
            (&text[..idx], Some(args))
        }
        _ => (text, None),
    }
}

/// Serialized shape accepted for predicate and filter definitions.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DefinitionRepr {
    Text(String),
    Table {
        name: String,
        #[serde(default)]
        args: IndexMap<String, serde_json::Value>,
        #[serde(default)]
        order: Option<i32>,
    },
}

/// Table-form argument values may be numbers or booleans in the config file;
/// definitions always carry strings.
fn stringify_args(args: IndexMap<String, serde_json::Value>) -> Args {
    args.into_iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect()
}
