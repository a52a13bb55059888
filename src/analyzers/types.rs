//! Data types produced by the analysis pipeline.
//!
//! Containment is strictly by ownership: an [`Intersection`] owns its
//! pass-throughs, which own their signal-group timelines, which own their
//! metrics. Cross references (predicted signal groups) are by name.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::telemetry::{Ident, MovementEvent};

/// Intersection id (`"{operatorId}-{intId}"`) to intersection.
pub type IntersectionMap = BTreeMap<String, Intersection>;

/// Name of the placeholder timeline for passes without any signal-group data.
pub const NO_SIGNAL_GROUPS: &str = "No Signal Groups";

/// Direction of a detected green-interval change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    EarlierGreenStart,
    ExtendedGreenEnd,
    LaterGreenStart,
    ShortenedGreenEnd,
}

impl ChangeType {
    pub const ALL: [ChangeType; 4] = [
        ChangeType::EarlierGreenStart,
        ChangeType::ExtendedGreenEnd,
        ChangeType::LaterGreenStart,
        ChangeType::ShortenedGreenEnd,
    ];

    /// More green time for the approaching vehicle.
    pub fn is_favorable(self) -> bool {
        match self {
            ChangeType::EarlierGreenStart | ChangeType::ExtendedGreenEnd => true,
            ChangeType::LaterGreenStart | ChangeType::ShortenedGreenEnd => false,
        }
    }
}

/// An accepted change: type plus magnitude in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GreenIntervalChange {
    #[serde(rename = "type")]
    pub kind: ChangeType,
    pub magnitude: f64,
}

/// Normalized, per-signal-group view of one event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub timestamp: DateTime<Utc>,
    pub distance: f64,
    /// km/h
    pub speed: f64,
    pub lat: f64,
    pub lng: f64,
    pub heading: f64,
    pub ingress: Option<Ident>,
    pub movement_events_available: bool,
    pub movement_events: Vec<MovementEvent>,
    pub glosa_advice: Option<String>,
    pub glosa_speed_kph: Option<f64>,
    pub time_to_green: Option<f64>,
    pub distance_to_stop: Option<f64>,
    pub min_travel_time: Option<f64>,
    pub max_travel_time: Option<f64>,
    pub seconds_to_green: Option<f64>,
    pub clearance_time: Option<f64>,
    pub clearance_cal_type: Option<String>,
    pub green_start_time: Option<f64>,
    pub green_end_time: Option<f64>,
    /// Set only when a genuine timing change was accepted for this sample.
    /// Written out as `greenIntervalChanged`, `greenChangeType` and
    /// `greenChangeMagnitude`.
    #[serde(flatten, serialize_with = "flat_green_change")]
    pub green_change: Option<GreenIntervalChange>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FlatGreenChange {
    green_interval_changed: bool,
    green_change_type: Option<ChangeType>,
    green_change_magnitude: Option<f64>,
}

fn flat_green_change<S: Serializer>(
    change: &Option<GreenIntervalChange>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    FlatGreenChange {
        green_interval_changed: change.is_some(),
        green_change_type: change.map(|c| c.kind),
        green_change_magnitude: change.map(|c| c.magnitude),
    }
    .serialize(serializer)
}

impl Metric {
    pub fn green_interval_changed(&self) -> bool {
        self.green_change.is_some()
    }

    pub fn green_change_type(&self) -> Option<ChangeType> {
        self.green_change.map(|c| c.kind)
    }

    pub fn green_change_magnitude(&self) -> Option<f64> {
        self.green_change.map(|c| c.magnitude)
    }

    pub fn has_current_green(&self) -> bool {
        matches!(
            (self.green_start_time, self.green_end_time),
            (Some(start), Some(end)) if start == 0.0 && end > 0.0
        )
    }
}

/// Count of accepted changes per [`ChangeType`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeCounts {
    pub earlier_green_start: usize,
    pub extended_green_end: usize,
    pub later_green_start: usize,
    pub shortened_green_end: usize,
}

impl ChangeCounts {
    fn slot(&mut self, kind: ChangeType) -> &mut usize {
        match kind {
            ChangeType::EarlierGreenStart => &mut self.earlier_green_start,
            ChangeType::ExtendedGreenEnd => &mut self.extended_green_end,
            ChangeType::LaterGreenStart => &mut self.later_green_start,
            ChangeType::ShortenedGreenEnd => &mut self.shortened_green_end,
        }
    }

    pub fn record(&mut self, kind: ChangeType) {
        *self.slot(kind) += 1;
    }

    pub fn get(&self, kind: ChangeType) -> usize {
        match kind {
            ChangeType::EarlierGreenStart => self.earlier_green_start,
            ChangeType::ExtendedGreenEnd => self.extended_green_end,
            ChangeType::LaterGreenStart => self.later_green_start,
            ChangeType::ShortenedGreenEnd => self.shortened_green_end,
        }
    }

    pub fn merge(&mut self, other: &ChangeCounts) {
        for kind in ChangeType::ALL {
            *self.slot(kind) += other.get(kind);
        }
    }

    pub fn balance(&self) -> GreenBalance {
        let mut balance = GreenBalance::default();
        for kind in ChangeType::ALL {
            if kind.is_favorable() {
                balance.got_green += self.get(kind);
            } else {
                balance.lost_green += self.get(kind);
            }
        }
        balance
    }
}

/// Change magnitudes per [`ChangeType`], in append order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMagnitudes {
    pub earlier_green_start: Vec<f64>,
    pub extended_green_end: Vec<f64>,
    pub later_green_start: Vec<f64>,
    pub shortened_green_end: Vec<f64>,
}

impl ChangeMagnitudes {
    fn slot(&mut self, kind: ChangeType) -> &mut Vec<f64> {
        match kind {
            ChangeType::EarlierGreenStart => &mut self.earlier_green_start,
            ChangeType::ExtendedGreenEnd => &mut self.extended_green_end,
            ChangeType::LaterGreenStart => &mut self.later_green_start,
            ChangeType::ShortenedGreenEnd => &mut self.shortened_green_end,
        }
    }

    pub fn get(&self, kind: ChangeType) -> &[f64] {
        match kind {
            ChangeType::EarlierGreenStart => &self.earlier_green_start,
            ChangeType::ExtendedGreenEnd => &self.extended_green_end,
            ChangeType::LaterGreenStart => &self.later_green_start,
            ChangeType::ShortenedGreenEnd => &self.shortened_green_end,
        }
    }

    pub fn record(&mut self, kind: ChangeType, magnitude: f64) {
        self.slot(kind).push(magnitude);
    }

    pub fn extend(&mut self, other: &ChangeMagnitudes) {
        for kind in ChangeType::ALL {
            self.slot(kind).extend_from_slice(other.get(kind));
        }
    }
}

/// Accepted changes split by whether they gave or took green time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GreenBalance {
    pub got_green: usize,
    pub lost_green: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpeedRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Per-signal-group statistics for one pass-through.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalGroupSummary {
    pub distance_range: Range,
    pub speed_range: SpeedRange,
    pub glosa_advice: BTreeMap<String, usize>,
    pub clearance_types: BTreeMap<String, usize>,
    pub green_interval_changes: usize,
    pub green_change_types: ChangeCounts,
    pub green_change_magnitudes: ChangeMagnitudes,
}

/// Movement-event availability of one signal group within one pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MovementEventStatus {
    Available,
    Unavailable,
    None,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalGroupTimeline {
    pub name: String,
    pub metrics: Vec<Metric>,
    pub has_movement_events: bool,
    pub all_movement_events_unavailable: bool,
    pub summary: SignalGroupSummary,
}

impl SignalGroupTimeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metrics: Vec::new(),
            has_movement_events: false,
            all_movement_events_unavailable: true,
            summary: SignalGroupSummary::default(),
        }
    }

    pub fn movement_event_status(&self) -> MovementEventStatus {
        match (self.has_movement_events, self.all_movement_events_unavailable) {
            (false, _) => MovementEventStatus::None,
            (true, true) => MovementEventStatus::Unavailable,
            (true, false) => MovementEventStatus::Available,
        }
    }

    pub fn has_available_movement_events(&self) -> bool {
        self.movement_event_status() == MovementEventStatus::Available
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub signal_group: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGreen {
    /// 1 = most recent event.
    pub found_in_events: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassPrediction {
    pub predicted_signal_groups_used: Vec<Prediction>,
    pub has_no_predicted_greens_with_available_events: bool,
    #[serde(rename = "possibleGPSMismatch")]
    pub possible_gps_mismatch: bool,
    pub green_found_in_recent_events: BTreeMap<String, RecentGreen>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub event_count: usize,
    pub time_range: TimeRange,
    pub duration_secs: f64,
    pub any_signal_group_has_movement_events: bool,
    pub all_movement_events_unavailable: bool,
    pub significant_green_interval_change_occurred: bool,
    pub green_interval_changes: usize,
    pub green_change_types: ChangeCounts,
    pub green_change_magnitudes: ChangeMagnitudes,
    #[serde(flatten)]
    pub prediction: PassPrediction,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassThrough {
    pub pass_index: usize,
    pub uuid: String,
    pub timestamp: DateTime<Utc>,
    pub signal_groups: BTreeMap<String, SignalGroupTimeline>,
    pub summary: PassSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopLocation {
    /// Bucket centre in metres.
    pub distance_bucket: f64,
    pub distance_range: String,
    pub avg_distance: f64,
    /// Distinct pass-throughs that stopped here.
    pub occurrences: usize,
    pub percentage: f64,
    pub signal_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedPattern {
    pub signal_group: String,
    pub distance_range_start: f64,
    pub distance_range: String,
    pub count: usize,
    pub min_speed: f64,
    pub max_speed: f64,
    pub avg_speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MovementEventAvailability {
    pub available: usize,
    pub unavailable: usize,
    pub none: usize,
}

impl MovementEventAvailability {
    pub fn record(&mut self, status: MovementEventStatus) {
        match status {
            MovementEventStatus::Available => self.available += 1,
            MovementEventStatus::Unavailable => self.unavailable += 1,
            MovementEventStatus::None => self.none += 1,
        }
    }
}

/// One signal group's statistics across every pass-through of an intersection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalGroupAnalysis {
    pub total_occurrences: usize,
    pub ingress: Option<String>,
    pub movement_event_availability: MovementEventAvailability,
    pub distance_range: Range,
    pub speed_range: SpeedRange,
    pub glosa_advice_stats: BTreeMap<String, usize>,
    pub clearance_types: BTreeMap<String, usize>,
    pub green_interval_changes: usize,
    pub green_change_types: ChangeCounts,
    pub green_change_magnitudes: ChangeMagnitudes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictedUsage {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionStatistics {
    pub pass_throughs_with_predictions: usize,
    pub pass_throughs_with_no_green_warning: usize,
    #[serde(rename = "passThroughsWithGPSMismatch")]
    pub pass_throughs_with_gps_mismatch: usize,
    pub predicted_signal_groups: BTreeMap<String, PredictedUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntersectionSummary {
    pub total_pass_throughs: usize,
    pub green_interval_changes: usize,
    pub green_change_types: ChangeCounts,
    pub green_change_magnitudes: ChangeMagnitudes,
    pub green_balance: GreenBalance,
    pub prediction_statistics: PredictionStatistics,
    pub stop_locations: Vec<StopLocation>,
    pub speed_patterns: Vec<SpeedPattern>,
    pub signal_group_analysis: BTreeMap<String, SignalGroupAnalysis>,
    /// Signal-group names grouped by ingress (`"Unknown"` when none was reported).
    pub signal_groups_by_ingress: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Intersection {
    pub id: String,
    pub name: String,
    pub operator_id: Ident,
    pub int_id: Ident,
    pub pass_throughs: Vec<PassThrough>,
    pub summary: IntersectionSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_favorable_split() {
        assert!(ChangeType::EarlierGreenStart.is_favorable());
        assert!(ChangeType::ExtendedGreenEnd.is_favorable());
        assert!(!ChangeType::LaterGreenStart.is_favorable());
        assert!(!ChangeType::ShortenedGreenEnd.is_favorable());
    }

    #[test]
    fn test_change_counts_merge_and_balance() {
        let mut a = ChangeCounts::default();
        a.record(ChangeType::LaterGreenStart);
        a.record(ChangeType::LaterGreenStart);
        let mut b = ChangeCounts::default();
        b.record(ChangeType::ExtendedGreenEnd);

        a.merge(&b);
        assert_eq!(a.later_green_start, 2);
        assert_eq!(a.extended_green_end, 1);
        assert_eq!(
            a.balance(),
            GreenBalance {
                got_green: 1,
                lost_green: 2
            }
        );
    }

    #[test]
    fn test_magnitudes_keep_append_order() {
        let mut a = ChangeMagnitudes::default();
        a.record(ChangeType::ShortenedGreenEnd, 9.0);
        let mut b = ChangeMagnitudes::default();
        b.record(ChangeType::ShortenedGreenEnd, 4.0);
        b.record(ChangeType::ShortenedGreenEnd, 12.0);

        a.extend(&b);
        assert_eq!(a.shortened_green_end, vec![9.0, 4.0, 12.0]);
    }

    #[test]
    fn test_change_type_serializes_camel_case() {
        let json = serde_json::to_string(&ChangeType::ShortenedGreenEnd).unwrap();
        assert_eq!(json, "\"shortenedGreenEnd\"");
    }

    fn sample_metric(change: Option<GreenIntervalChange>) -> Metric {
        Metric {
            timestamp: DateTime::<Utc>::default(),
            distance: 40.0,
            speed: 30.0,
            lat: 0.0,
            lng: 0.0,
            heading: 0.0,
            ingress: None,
            movement_events_available: false,
            movement_events: Vec::new(),
            glosa_advice: None,
            glosa_speed_kph: None,
            time_to_green: None,
            distance_to_stop: None,
            min_travel_time: None,
            max_travel_time: None,
            seconds_to_green: None,
            clearance_time: None,
            clearance_cal_type: None,
            green_start_time: Some(0.0),
            green_end_time: Some(12.0),
            green_change: change,
        }
    }

    #[test]
    fn test_metric_change_fields_are_flat() {
        let unchanged = serde_json::to_value(sample_metric(None)).unwrap();
        assert_eq!(unchanged["greenIntervalChanged"], false);
        assert!(unchanged["greenChangeType"].is_null());
        assert!(unchanged["greenChangeMagnitude"].is_null());
        assert!(unchanged.get("greenChange").is_none());

        let changed = serde_json::to_value(sample_metric(Some(GreenIntervalChange {
            kind: ChangeType::LaterGreenStart,
            magnitude: 7.5,
        })))
        .unwrap();
        assert_eq!(changed["greenIntervalChanged"], true);
        assert_eq!(changed["greenChangeType"], "laterGreenStart");
        assert_eq!(changed["greenChangeMagnitude"], 7.5);
        assert_eq!(changed["greenEndTime"], 12.0);
    }

    #[test]
    fn test_movement_event_status() {
        let mut sg = SignalGroupTimeline::new("K1");
        assert_eq!(sg.movement_event_status(), MovementEventStatus::None);
        sg.has_movement_events = true;
        assert_eq!(sg.movement_event_status(), MovementEventStatus::Unavailable);
        sg.all_movement_events_unavailable = false;
        assert!(sg.has_available_movement_events());
    }
}
