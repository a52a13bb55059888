//! Typed records for the raw GLOSA pass-through telemetry.
//!
//! Every field the upstream recorder may omit is modelled as `Option` (or an
//! empty `Vec`), so a sparse or partially populated event still deserializes.
//! Timestamps are parsed leniently; a value that cannot be read becomes `None`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Sentinel the recorder writes for "no time known".
const EPOCH_SENTINEL: &str = "1970-01-01T00:00:00Z";

/// One recorded approach of a vehicle towards an intersection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PassRecord {
    #[serde(deserialize_with = "null_as_empty")]
    pub events: Vec<RawEvent>,
}

/// A single telemetry sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEvent {
    pub uuid: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub dt: Option<DateTime<Utc>>,
    pub pos_data: Option<PosData>,
    pub intersection_pass: Option<IntersectionPass>,
    pub traffic_lights_status: Option<TrafficLightsStatus>,
}

impl RawEvent {
    /// Signal-group blocks of this event, empty when the status is absent.
    pub fn signal_groups(&self) -> &[SignalGroupStatus] {
        self.traffic_lights_status
            .as_ref()
            .map(|s| s.signal_group.as_slice())
            .unwrap_or(&[])
    }

    /// Distance to the intersection in metres, `0.0` when unknown.
    pub fn distance(&self) -> f64 {
        self.intersection_pass
            .as_ref()
            .and_then(|p| p.int_pass_info.as_ref())
            .and_then(|i| i.distance)
            .unwrap_or(0.0)
    }

    /// Vehicle speed in km/h, `0.0` when unknown.
    pub fn speed_kph(&self) -> f64 {
        self.pos_data
            .as_ref()
            .and_then(|p| p.sp.as_ref())
            .and_then(|sp| sp.value)
            .map(|mps| mps * 3.6)
            .unwrap_or(0.0)
    }

    pub fn ingress(&self) -> Option<Ident> {
        self.intersection_pass
            .as_ref()
            .and_then(|p| p.int_pass_info.as_ref())
            .and_then(|i| i.ingress.clone())
    }

    pub fn intersection(&self) -> Option<&IntersectionRef> {
        self.intersection_pass
            .as_ref()
            .and_then(|p| p.intersection.as_ref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PosData {
    pub sp: Option<Measured>,
    pub geo_pos: Option<GeoPos>,
    pub head: Option<Measured>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Measured {
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoPos {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntersectionPass {
    pub int_pass_info: Option<IntPassInfo>,
    pub intersection: Option<IntersectionRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntPassInfo {
    pub distance: Option<f64>,
    pub ingress: Option<Ident>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntersectionRef {
    pub operator_id: Option<Ident>,
    pub int_id: Option<Ident>,
    pub name: Option<String>,
}

impl IntersectionRef {
    /// `(operatorId, intId)`, or `None` when either half is missing.
    pub fn identity(&self) -> Option<(&Ident, &Ident)> {
        match (&self.operator_id, &self.int_id) {
            (Some(op), Some(id)) => Some((op, id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrafficLightsStatus {
    #[serde(deserialize_with = "null_as_empty")]
    pub signal_group: Vec<SignalGroupStatus>,
}

/// Per-signal-group block inside one event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalGroupStatus {
    pub name: Option<String>,
    pub glosa: Option<Glosa>,
    #[serde(deserialize_with = "null_as_empty")]
    pub movement_event: Vec<MovementEvent>,
}

impl SignalGroupStatus {
    pub fn internal_info(&self) -> Option<&InternalInfo> {
        self.glosa.as_ref().and_then(|g| g.internal_info.as_ref())
    }

    /// `(greenStartTime, greenEndTime)` in seconds relative to the sample.
    pub fn green_interval(&self) -> (Option<f64>, Option<f64>) {
        match self.internal_info() {
            Some(info) => (info.green_start_time, info.green_end_time),
            None => (None, None),
        }
    }

    /// Green is showing right now: the interval starts at zero and has not ended.
    pub fn has_current_green(&self) -> bool {
        matches!(
            self.green_interval(),
            (Some(start), Some(end)) if start == 0.0 && end > 0.0
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Glosa {
    pub advice: Option<String>,
    pub speed_kph: Option<f64>,
    pub time_to_green: Option<f64>,
    pub internal_info: Option<InternalInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InternalInfo {
    pub distance_to_stop: Option<f64>,
    pub minimal_travel_time: Option<f64>,
    pub maximal_travel_time: Option<f64>,
    pub seconds_to_green_start: Option<f64>,
    pub clearance_time: Option<f64>,
    pub clearance_cal_type: Option<Ident>,
    pub green_start_time: Option<f64>,
    pub green_end_time: Option<f64>,
}

/// Phase state reported by the traffic-light controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovementEvent {
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp_or_sentinel")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub min_end_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub max_end_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub likely_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp_or_sentinel")]
    pub next_time: Option<DateTime<Utc>>,
    pub time_confidence: Option<f64>,
}

impl MovementEvent {
    pub fn is_available(&self) -> bool {
        matches!(self.state.as_deref(), Some(state) if state != "unavailable")
    }
}

/// Identifier that upstream emits either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ident {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Integer(v) => write!(f, "{v}"),
            Ident::Float(v) => write!(f, "{v}"),
            Ident::Text(v) => f.write_str(v),
        }
    }
}

/// An explicit `null` list reads the same as a missing one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => parse_timestamp(&s),
        _ => None,
    })
}

fn lenient_timestamp_or_sentinel<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) if s != EPOCH_SENTINEL => parse_timestamp(&s),
        _ => None,
    })
}
