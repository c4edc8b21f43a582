//! Parses the three shapes an ESIOS indicator `values` array comes back in.
//!
//! Most indicators are geo-less (a single national series, e.g. most
//! offer-indicators). Some report one row per geography. A few report both:
//! a `geo_id: null` national aggregate row alongside the per-geography
//! breakdown, which this crate treats as a distinct `Aggregated` shape so
//! callers don't have to special-case "geo 0" or silently drop the
//! aggregate row when building per-geo columns.

use chrono::{DateTime, Utc};
use esios_types::{EsiosError, GeoId};

#[derive(Debug, Clone, PartialEq)]
pub struct PlainValue {
    pub datetime: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoValue {
    pub datetime: DateTime<Utc>,
    pub geo_id: GeoId,
    pub geo_name: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiValues {
    WithoutGeo(Vec<PlainValue>),
    WithGeo(Vec<GeoValue>),
    Aggregated {
        national: Vec<PlainValue>,
        by_geo: Vec<GeoValue>,
    },
}

/// Parse an indicator response body's `indicator.values` array.
pub fn parse_values(body: &serde_json::Value) -> Result<ApiValues, EsiosError> {
    let values = body
        .get("indicator")
        .and_then(|i| i.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| EsiosError::Transport {
            message: "response missing indicator.values array".to_string(),
            retryable: false,
        })?;

    let mut national = Vec::new();
    let mut by_geo = Vec::new();

    for row in values {
        let datetime = parse_datetime(row)?;
        let value = row
            .get("value")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| bad_row("value"))?;

        match row.get("geo_id").and_then(serde_json::Value::as_u64) {
            Some(geo_id) => by_geo.push(GeoValue {
                datetime,
                geo_id: GeoId(geo_id as u32),
                geo_name: row
                    .get("geo_name")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string),
                value,
            }),
            None => national.push(PlainValue { datetime, value }),
        }
    }

    Ok(match (national.is_empty(), by_geo.is_empty()) {
        (false, true) => ApiValues::WithoutGeo(national),
        (true, false) => ApiValues::WithGeo(by_geo),
        (false, false) => ApiValues::Aggregated { national, by_geo },
        (true, true) => ApiValues::WithoutGeo(Vec::new()),
    })
}

fn parse_datetime(row: &serde_json::Value) -> Result<DateTime<Utc>, EsiosError> {
    let raw = row
        .get("datetime")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| bad_row("datetime"))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| bad_row("datetime"))
}

fn bad_row(field: &str) -> EsiosError {
    EsiosError::Transport {
        message: format!("indicator value row missing or malformed `{field}`"),
        retryable: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn without_geo_shape() {
        let body = json!({
            "indicator": {
                "values": [
                    {"value": 42.0, "datetime": "2025-01-01T00:00:00Z"},
                ]
            }
        });
        match parse_values(&body).unwrap() {
            ApiValues::WithoutGeo(rows) => assert_eq!(rows.len(), 1),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn with_geo_shape() {
        let body = json!({
            "indicator": {
                "values": [
                    {"value": 1.0, "datetime": "2025-01-01T00:00:00Z", "geo_id": 8, "geo_name": "Madrid"},
                    {"value": 2.0, "datetime": "2025-01-01T00:00:00Z", "geo_id": 9, "geo_name": "Ceuta"},
                ]
            }
        });
        match parse_values(&body).unwrap() {
            ApiValues::WithGeo(rows) => assert_eq!(rows.len(), 2),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn aggregated_shape_splits_national_from_geo() {
        let body = json!({
            "indicator": {
                "values": [
                    {"value": 100.0, "datetime": "2025-01-01T00:00:00Z", "geo_id": null},
                    {"value": 1.0, "datetime": "2025-01-01T00:00:00Z", "geo_id": 8, "geo_name": "Madrid"},
                ]
            }
        });
        match parse_values(&body).unwrap() {
            ApiValues::Aggregated { national, by_geo } => {
                assert_eq!(national.len(), 1);
                assert_eq!(by_geo.len(), 1);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn missing_values_array_is_an_error() {
        let body = json!({"indicator": {}});
        assert!(parse_values(&body).is_err());
    }
}
