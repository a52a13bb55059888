//! Guesses which signal group a vehicle used to clear the intersection.

use std::collections::BTreeMap;

use crate::analyzers::timeline::TimedEvent;
use crate::analyzers::types::{PassPrediction, Prediction, RecentGreen, SignalGroupTimeline};
use crate::config::PredictionConfig;

pub const REASON_ACTIVE_GREEN: &str = "Green phase active in the most recent event";
pub const REASON_ONLY_VALID: &str = "Only valid signal group for passage (GPS timing may be off)";

/// Inspects the trailing events of a pass-through (oldest-first `events`).
///
/// A signal group showing green in the very last event is predicted. If none
/// is, and exactly one signal group has usable movement events, that one is
/// predicted instead. When every signal group has usable movement events but
/// nothing could be predicted, the pass is flagged; if green was seen a few
/// events earlier the likely cause is a GPS overshoot.
pub fn predict_pass(
    events: &[TimedEvent<'_>],
    timelines: &BTreeMap<String, SignalGroupTimeline>,
    config: &PredictionConfig,
) -> PassPrediction {
    let mut predictions: Vec<Prediction> = Vec::new();
    let mut green_found: BTreeMap<String, RecentGreen> = BTreeMap::new();

    for (back, (_, event)) in events
        .iter()
        .rev()
        .take(config.recent_event_window)
        .enumerate()
    {
        let events_back = back + 1;

        for sg in event.signal_groups() {
            let Some(name) = sg.name.as_deref() else {
                continue;
            };
            if !sg.has_current_green() {
                continue;
            }

            let found = green_found.entry(name.to_string()).or_default();
            if found.found_in_events.last() != Some(&events_back) {
                found.found_in_events.push(events_back);
            }

            if events_back == 1 && !predictions.iter().any(|p| p.signal_group == name) {
                predictions.push(Prediction {
                    signal_group: name.to_string(),
                    reason: REASON_ACTIVE_GREEN.to_string(),
                });
            }
        }
    }

    if predictions.is_empty() {
        let mut usable = timelines
            .values()
            .filter(|sg| sg.has_available_movement_events());
        if let (Some(only), None) = (usable.next(), usable.next()) {
            predictions.push(Prediction {
                signal_group: only.name.clone(),
                reason: REASON_ONLY_VALID.to_string(),
            });
        }
    }

    let all_available = timelines
        .values()
        .all(|sg| sg.has_available_movement_events());
    let has_no_predicted_greens_with_available_events =
        all_available && predictions.is_empty() && !timelines.is_empty();
    let possible_gps_mismatch = has_no_predicted_greens_with_available_events
        && green_found
            .values()
            .any(|g| g.found_in_events.iter().any(|&back| back > 1));

    PassPrediction {
        predicted_signal_groups_used: predictions,
        has_no_predicted_greens_with_available_events,
        possible_gps_mismatch,
        green_found_in_recent_events: green_found,
    }
}
