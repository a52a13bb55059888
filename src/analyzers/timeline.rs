//! Folds a pass-through's events into per-signal-group timelines.
//!
//! The fold threads a [`PassAccumulator`] through every event in timestamp
//! order. The accumulator owns the last known green interval of each signal
//! group, so each pass-through is folded independently of every other.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::analyzers::normalize::{normalize, placeholder};
use crate::analyzers::stability::{ChangeDecision, IntervalState, detect_change};
use crate::analyzers::types::{
    ChangeCounts, ChangeMagnitudes, NO_SIGNAL_GROUPS, SignalGroupTimeline,
};
use crate::config::StabilityConfig;
use crate::telemetry::{RawEvent, SignalGroupStatus};

/// A raw event paired with its parsed timestamp.
pub type TimedEvent<'a> = (DateTime<Utc>, &'a RawEvent);

/// Returns the events that carry a timestamp, oldest first.
///
/// Input order is not trusted; ties keep their input order.
pub fn order_events(events: &[RawEvent]) -> Vec<TimedEvent<'_>> {
    let mut timed: Vec<TimedEvent<'_>> = events
        .iter()
        .filter_map(|event| event.dt.map(|dt| (dt, event)))
        .collect();

    let dropped = events.len() - timed.len();
    if dropped > 0 {
        warn!(dropped, "Skipping events without a readable timestamp");
    }

    timed.sort_by_key(|(dt, _)| *dt);
    timed
}

/// Timelines of one pass-through plus its pass-level change tallies.
#[derive(Debug, Default)]
pub struct PassTimelines {
    pub timelines: BTreeMap<String, SignalGroupTimeline>,
    pub green_interval_changes: usize,
    pub green_change_types: ChangeCounts,
    pub green_change_magnitudes: ChangeMagnitudes,
}

/// Fold state for one pass-through.
#[derive(Debug, Default)]
pub struct PassAccumulator {
    built: PassTimelines,
    intervals: HashMap<String, IntervalState>,
}

impl PassAccumulator {
    pub fn absorb(mut self, (timestamp, event): TimedEvent<'_>, config: &StabilityConfig) -> Self {
        for sg in event.signal_groups() {
            let Some(name) = sg.name.as_deref() else {
                continue;
            };
            self.absorb_signal_group(name, timestamp, event, sg, config);
        }
        self
    }

    fn absorb_signal_group(
        &mut self,
        name: &str,
        timestamp: DateTime<Utc>,
        event: &RawEvent,
        sg: &SignalGroupStatus,
        config: &StabilityConfig,
    ) {
        let timeline = self
            .built
            .timelines
            .entry(name.to_string())
            .or_insert_with(|| SignalGroupTimeline::new(name));

        if !sg.movement_event.is_empty() {
            timeline.has_movement_events = true;
            if sg.movement_event.iter().any(|me| me.is_available()) {
                timeline.all_movement_events_unavailable = false;
            }
        }

        let mut metric = normalize(event, timestamp, sg);

        let previous_movement = timeline
            .metrics
            .last()
            .map(|m| m.movement_events.as_slice())
            .unwrap_or(&[]);
        let decision = detect_change(
            self.intervals.get(name),
            previous_movement,
            &metric,
            config,
        );

        match decision {
            ChangeDecision::NoBaseline | ChangeDecision::WithinThreshold => {}
            ChangeDecision::SuppressedAsStable(verdict) => {
                debug!(
                    signal_group = name,
                    %timestamp,
                    decision = decision.as_str(),
                    verdict = verdict.as_str(),
                    "Green interval moved but movement events are stable"
                );
            }
            ChangeDecision::Accepted { change, verdict } => {
                debug!(
                    signal_group = name,
                    %timestamp,
                    change_type = ?change.kind,
                    magnitude = change.magnitude,
                    decision = decision.as_str(),
                    verdict = verdict.as_str(),
                    "Green interval change accepted"
                );
                metric.green_change = Some(change);
                self.built.green_interval_changes += 1;
                self.built.green_change_types.record(change.kind);
                self.built
                    .green_change_magnitudes
                    .record(change.kind, change.magnitude);
            }
        }

        match IntervalState::after(&metric) {
            Some(state) => {
                self.intervals.insert(name.to_string(), state);
            }
            None => {
                self.intervals.remove(name);
            }
        }

        timeline.metrics.push(metric);
    }

    /// Closes the fold. A pass without any named signal group gets a single
    /// placeholder timeline so it still counts once downstream.
    pub fn finish(self, first: Option<TimedEvent<'_>>) -> PassTimelines {
        let mut built = self.built;

        if built.timelines.is_empty() {
            if let Some((timestamp, event)) = first {
                let mut timeline = SignalGroupTimeline::new(NO_SIGNAL_GROUPS);
                timeline.metrics.push(placeholder(event, timestamp));
                built.timelines.insert(NO_SIGNAL_GROUPS.to_string(), timeline);
            }
        }

        built
    }
}

/// Folds already ordered events into timelines.
pub fn build_timelines(events: &[TimedEvent<'_>], config: &StabilityConfig) -> PassTimelines {
    events
        .iter()
        .fold(PassAccumulator::default(), |acc, event| acc.absorb(*event, config))
        .finish(events.first().copied())
}
