//! Time-window predicates: `After`, `Before`, `Between`.
//!
//! Datetimes are RFC 3339, optionally followed by a bracketed zone name
//! (`2017-01-20T17:42:47.789-07:00[America/Denver]`), or epoch milliseconds.
//! The zone name is informational; the offset decides the instant.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{required, FnPredicate, PredicateFactory, RoutePredicate};
use crate::error::FactoryError;
use crate::exchange::ServerExchange;

pub(crate) fn parse_datetime(value: &str) -> Result<DateTime<Utc>, FactoryError> {
    let value = value.trim();
    let without_zone = match value.find('[') {
        Some(idx) if value.ends_with(']') => &value[..idx],
        _ => value,
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(without_zone) {
        return Ok(parsed.with_timezone(&Utc));
    }

    without_zone
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| FactoryError::new(format!("unable to parse datetime '{value}'")))
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AfterConfig {
    pub datetime: Option<String>,
}

/// Matches requests received after a configured instant.
pub struct AfterRoutePredicateFactory;

impl PredicateFactory for AfterRoutePredicateFactory {
    type Config = AfterConfig;

    fn name(&self) -> &'static str {
        "After"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["datetime"]
    }

    fn apply(&self, config: AfterConfig) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
        let datetime = parse_datetime(&required(config.datetime, "datetime")?)?;
        Ok(FnPredicate::arc(format!("After: {datetime}"), move |_: &mut ServerExchange| {
            Utc::now() > datetime
        }))
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BeforeConfig {
    pub datetime: Option<String>,
}

/// Matches requests received before a configured instant.
pub struct BeforeRoutePredicateFactory;

impl PredicateFactory for BeforeRoutePredicateFactory {
    type Config = BeforeConfig;

    fn name(&self) -> &'static str {
        "Before"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["datetime"]
    }

    fn apply(&self, config: BeforeConfig) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
        let datetime = parse_datetime(&required(config.datetime, "datetime")?)?;
        Ok(FnPredicate::arc(format!("Before: {datetime}"), move |_: &mut ServerExchange| {
            Utc::now() < datetime
        }))
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BetweenConfig {
    pub datetime1: Option<String>,
    pub datetime2: Option<String>,
}

/// Matches requests received strictly between two instants.
pub struct BetweenRoutePredicateFactory;

impl PredicateFactory for BetweenRoutePredicateFactory {
    type Config = BetweenConfig;

    fn name(&self) -> &'static str {
        "Between"
    }

    fn shortcut_field_order(&self) -> &'static [&'static str] {
        &["datetime1", "datetime2"]
    }

    fn apply(&self, config: BetweenConfig) -> Result<Arc<dyn RoutePredicate>, FactoryError> {
        let start = parse_datetime(&required(config.datetime1, "datetime1")?)?;
        let end = parse_datetime(&required(config.datetime2, "datetime2")?)?;
        if start >= end {
            return Err(FactoryError::new(format!(
                "datetime1 ({start}) must be before datetime2 ({end})"
            )));
        }

        Ok(FnPredicate::arc(format!("Between: {start} and {end}"), move |_: &mut ServerExchange| {
            let now = Utc::now();
            now > start && now < end
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::get;
    use super::*;
    use chrono::Duration;

    fn rfc3339(offset: Duration) -> Option<String> {
        Some((Utc::now() + offset).to_rfc3339())
    }

    #[test]
    fn parses_zoned_and_epoch_forms() {
        let zoned = parse_datetime("2017-01-20T17:42:47.789-07:00[America/Denver]").unwrap();
        assert_eq!(zoned.timestamp_millis(), 1_484_959_367_789);

        let epoch = parse_datetime("1484959367789").unwrap();
        assert_eq!(epoch, zoned);

        assert!(parse_datetime("yesterday").is_err());
    }

    #[tokio::test]
    async fn after_and_before_compare_with_now() {
        let past = AfterRoutePredicateFactory
            .apply(AfterConfig {
                datetime: rfc3339(-Duration::hours(1)),
            })
            .unwrap();
        assert!(past.test(&mut get("/")).await.unwrap());

        let expired = BeforeRoutePredicateFactory
            .apply(BeforeConfig {
                datetime: rfc3339(-Duration::hours(1)),
            })
            .unwrap();
        assert!(!expired.test(&mut get("/")).await.unwrap());
    }

    #[tokio::test]
    async fn between_requires_ordered_bounds() {
        let window = BetweenRoutePredicateFactory
            .apply(BetweenConfig {
                datetime1: rfc3339(-Duration::hours(1)),
                datetime2: rfc3339(Duration::hours(1)),
            })
            .unwrap();
        assert!(window.test(&mut get("/")).await.unwrap());

        let inverted = BetweenRoutePredicateFactory.apply(BetweenConfig {
            datetime1: rfc3339(Duration::hours(1)),
            datetime2: rfc3339(-Duration::hours(1)),
        });
        assert!(inverted.is_err());
    }
}
