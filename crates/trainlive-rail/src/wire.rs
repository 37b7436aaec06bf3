//! Upstream JSON shape and its mapping to `StatusSnapshot`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use trainlive_core::{
    domain::TrainNumber,
    errors::StatusError,
    status::{StationStop, StatusSnapshot},
};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<TrainData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainData {
    #[serde(default)]
    current_position: Option<CurrentPosition>,
    #[serde(default)]
    route: Vec<RouteStop>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentPosition {
    #[serde(default)]
    station_code: Option<String>,
    #[serde(default)]
    distance_from_origin_km: Option<f64>,
    #[serde(default)]
    distance_from_last_station_km: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteStop {
    #[serde(default)]
    station_code: Option<String>,
    #[serde(default, rename = "station_name")]
    station_name: Option<String>,
    #[serde(default)]
    platform_number: Option<Value>,
    #[serde(default)]
    scheduled_arrival_time: Option<Value>,
    #[serde(default)]
    actual_arrival_time: Option<Value>,
    #[serde(default)]
    scheduled_departure_delay_secs: Option<Value>,
}

/// Decode a response body into a snapshot for `train`.
///
/// `success: false` means the upstream does not know the train. Anything that
/// does not let us locate the current station on the route is malformed.
pub fn snapshot_from_body(
    train: &TrainNumber,
    body: &str,
    fetched_at: DateTime<Utc>,
) -> Result<StatusSnapshot, StatusError> {
    let env: Envelope = serde_json::from_str(body)
        .map_err(|e| StatusError::MalformedResponse(format!("invalid json: {e}")))?;

    if !env.success {
        return Err(StatusError::NotFound(train.clone()));
    }

    let data = env
        .data
        .ok_or_else(|| StatusError::MalformedResponse("missing data".to_string()))?;
    let pos = data
        .current_position
        .ok_or_else(|| StatusError::MalformedResponse("missing currentPosition".to_string()))?;
    let code = pos
        .station_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| StatusError::MalformedResponse("missing current station code".to_string()))?;

    let idx = data
        .route
        .iter()
        .position(|s| s.station_code.as_deref().map(str::trim) == Some(code))
        .ok_or_else(|| {
            StatusError::MalformedResponse(format!("station {code} is not on the route"))
        })?;

    let previous = idx
        .checked_sub(1)
        .and_then(|i| data.route.get(i))
        .map(to_stop);
    let next = data.route.get(idx + 1).map(to_stop);

    Ok(StatusSnapshot {
        train_number: train.clone(),
        current: to_stop(&data.route[idx]),
        previous,
        next,
        distance_from_origin_km: pos.distance_from_origin_km,
        distance_from_last_station_km: pos.distance_from_last_station_km,
        fetched_at,
    })
}

fn to_stop(s: &RouteStop) -> StationStop {
    let code = s.station_code.clone().unwrap_or_default();
    let name = s
        .station_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| code.clone());

    StationStop {
        code,
        name,
        platform: s.platform_number.as_ref().and_then(value_to_text),
        scheduled_arrival: s.scheduled_arrival_time.as_ref().and_then(value_to_time),
        actual_arrival: s.actual_arrival_time.as_ref().and_then(value_to_time),
        departure_delay_secs: s
            .scheduled_departure_delay_secs
            .as_ref()
            .and_then(value_to_i64),
    }
}

fn value_to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Unix seconds; zero means "not yet known" upstream.
fn value_to_time(v: &Value) -> Option<DateTime<Utc>> {
    value_to_i64(v)
        .filter(|ts| *ts > 0)
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
}

fn value_to_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
