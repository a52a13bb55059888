use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzers::types::{Intersection, MovementEventStatus, PassThrough};

/// One flat CSV row per pass-through.
#[derive(Debug, Default, Serialize)]
pub struct PassStats {
    pub intersection_id: String,
    pub intersection_name: String,
    pub pass_index: usize,
    pub uuid: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub event_count: usize,
    pub signal_groups: usize,

    // movement events, counted per signal group
    pub movement_events_available: usize,
    pub movement_events_unavailable: usize,
    pub movement_events_none: usize,

    // green interval changes
    pub green_interval_changes: usize,
    pub earlier_green_start: usize,
    pub extended_green_end: usize,
    pub later_green_start: usize,
    pub shortened_green_end: usize,

    // prediction
    pub predicted_signal_groups: String,
    pub no_green_warning: bool,
    pub possible_gps_mismatch: bool,
}

impl PassStats {
    pub fn from_pass(intersection: &Intersection, pass: &PassThrough) -> Self {
        let summary = &pass.summary;
        let mut s = PassStats {
            intersection_id: intersection.id.clone(),
            intersection_name: intersection.name.clone(),
            pass_index: pass.pass_index,
            uuid: pass.uuid.clone(),
            start: Some(summary.time_range.start),
            end: Some(summary.time_range.end),
            duration_secs: summary.duration_secs,
            event_count: summary.event_count,
            signal_groups: pass.signal_groups.len(),
            green_interval_changes: summary.green_interval_changes,
            earlier_green_start: summary.green_change_types.earlier_green_start,
            extended_green_end: summary.green_change_types.extended_green_end,
            later_green_start: summary.green_change_types.later_green_start,
            shortened_green_end: summary.green_change_types.shortened_green_end,
            no_green_warning: summary.prediction.has_no_predicted_greens_with_available_events,
            possible_gps_mismatch: summary.prediction.possible_gps_mismatch,
            ..Default::default()
        };

        for timeline in pass.signal_groups.values() {
            match timeline.movement_event_status() {
                MovementEventStatus::Available => s.movement_events_available += 1,
                MovementEventStatus::Unavailable => s.movement_events_unavailable += 1,
                MovementEventStatus::None => s.movement_events_none += 1,
            }
        }

        s.predicted_signal_groups = summary
            .prediction
            .predicted_signal_groups_used
            .iter()
            .map(|p| p.signal_group.as_str())
            .collect::<Vec<_>>()
            .join(";");

        s
    }

    /// Rows for every pass-through of `intersection`, in pass order.
    pub fn from_intersection(intersection: &Intersection) -> Vec<Self> {
        intersection
            .pass_throughs
            .iter()
            .map(|pass| Self::from_pass(intersection, pass))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::analyzer::process_raw_data;
    use crate::config::AnalysisConfig;
    use crate::telemetry::PassRecord;
    use serde_json::json;

    fn intersection() -> Intersection {
        let records: Vec<PassRecord> = serde_json::from_value(json!([{
            "events": [
                {
                    "uuid": "veh-1",
                    "dt": "2024-05-01T10:00:00Z",
                    "intersectionPass": { "intersection": { "operatorId": 3, "intId": 9, "name": "Bridge" } },
                    "trafficLightsStatus": { "signalGroup": [
                        { "name": "K1", "glosa": { "internalInfo": { "greenStartTime": 10, "greenEndTime": 40 } },
                          "movementEvent": [{ "state": "stopAndRemain" }] },
                        { "name": "K2" }
                    ]}
                },
                {
                    "uuid": "veh-1",
                    "dt": "2024-05-01T10:00:02Z",
                    "intersectionPass": { "intersection": { "operatorId": 3, "intId": 9, "name": "Bridge" } },
                    "trafficLightsStatus": { "signalGroup": [
                        { "name": "K1", "glosa": { "internalInfo": { "greenStartTime": 0, "greenEndTime": 20 } },
                          "movementEvent": [{ "state": "protectedMovementAllowed" }] },
                        { "name": "K2", "movementEvent": [{ "state": "unavailable" }] }
                    ]}
                }
            ]
        }]))
        .unwrap();

        process_raw_data(&records, &AnalysisConfig::default())
            .remove("3-9")
            .unwrap()
    }

    #[test]
    fn test_from_pass() {
        let intersection = intersection();
        let stats = PassStats::from_pass(&intersection, &intersection.pass_throughs[0]);

        assert_eq!(stats.intersection_id, "3-9");
        assert_eq!(stats.intersection_name, "Bridge");
        assert_eq!(stats.uuid, "veh-1");
        assert_eq!(stats.event_count, 2);
        assert_eq!(stats.duration_secs, 2.0);
        assert_eq!(stats.signal_groups, 2);
        assert_eq!(stats.movement_events_available, 1);
        assert_eq!(stats.movement_events_unavailable, 1);
        assert_eq!(stats.movement_events_none, 0);
        assert_eq!(stats.predicted_signal_groups, "K1");
        assert!(!stats.no_green_warning);
    }

    #[test]
    fn test_from_intersection_one_row_per_pass() {
        let intersection = intersection();
        assert_eq!(PassStats::from_intersection(&intersection).len(), 1);
    }
}
