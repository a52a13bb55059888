//! Top-level orchestration: raw pass-records in, intersection map out.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::analyzers::aggregate::aggregate_intersection;
use crate::analyzers::predict::predict_pass;
use crate::analyzers::summary::summarize;
use crate::analyzers::timeline::{build_timelines, order_events};
use crate::analyzers::types::{
    Intersection, IntersectionMap, IntersectionSummary, PassSummary, PassThrough, TimeRange,
};
use crate::config::AnalysisConfig;
use crate::telemetry::{PassRecord, RawEvent};

/// Runs normalization, change detection, prediction and summarization for one
/// pass-through. `pass_index` is the record's position in the input dataset.
#[tracing::instrument(skip(events, config), fields(events = events.len()))]
pub fn process_pass_through(
    pass_index: usize,
    events: &[RawEvent],
    config: &AnalysisConfig,
) -> PassThrough {
    let ordered = order_events(events);
    let built = build_timelines(&ordered, &config.stability);
    let prediction = predict_pass(&ordered, &built.timelines, &config.prediction);

    let mut timelines = built.timelines;
    for timeline in timelines.values_mut() {
        timeline.summary = summarize(&timeline.metrics);
    }

    let (start, end) = match (ordered.first(), ordered.last()) {
        (Some((first, _)), Some((last, _))) => (*first, *last),
        _ => (DateTime::<Utc>::default(), DateTime::<Utc>::default()),
    };

    let uuid = ordered
        .first()
        .and_then(|(_, event)| event.uuid.clone())
        .unwrap_or_else(|| format!("pass-{pass_index}"));

    let summary = PassSummary {
        event_count: ordered.len(),
        time_range: TimeRange { start, end },
        duration_secs: (end - start).num_milliseconds() as f64 / 1000.0,
        any_signal_group_has_movement_events: timelines.values().any(|t| t.has_movement_events),
        all_movement_events_unavailable: timelines
            .values()
            .all(|t| !t.has_available_movement_events()),
        significant_green_interval_change_occurred: built.green_interval_changes > 0,
        green_interval_changes: built.green_interval_changes,
        green_change_types: built.green_change_types,
        green_change_magnitudes: built.green_change_magnitudes,
        prediction,
    };

    debug!(
        uuid = %uuid,
        signal_groups = timelines.len(),
        changes = summary.green_interval_changes,
        predictions = summary.prediction.predicted_signal_groups_used.len(),
        "Processed pass-through"
    );

    PassThrough {
        pass_index,
        uuid,
        timestamp: start,
        signal_groups: timelines,
        summary,
    }
}

/// Groups pass-records by intersection and analyses each one.
///
/// Records without timed events or without an intersection identity on their
/// first timed event (in recorded order) are skipped. Pass-throughs keep their input order within an
/// intersection.
#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn process_raw_data(records: &[PassRecord], config: &AnalysisConfig) -> IntersectionMap {
    let mut intersections = IntersectionMap::new();
    let mut skipped = 0usize;

    for (pass_index, record) in records.iter().enumerate() {
        // Identity comes from the first timed event in recorded order.
        let Some(first) = record.events.iter().find(|e| e.dt.is_some()) else {
            warn!(pass_index, "Skipping pass-record without timed events");
            skipped += 1;
            continue;
        };

        let identity = first
            .intersection()
            .and_then(|r| r.identity().map(|(op, id)| (r, op, id)));
        let Some((reference, operator_id, int_id)) = identity else {
            warn!(pass_index, "Skipping pass-record without intersection identity");
            skipped += 1;
            continue;
        };

        let key = format!("{operator_id}-{int_id}");
        let intersection = intersections.entry(key.clone()).or_insert_with(|| Intersection {
            name: reference.name.clone().unwrap_or_else(|| key.clone()),
            id: key,
            operator_id: operator_id.clone(),
            int_id: int_id.clone(),
            pass_throughs: Vec::new(),
            summary: IntersectionSummary::default(),
        });

        intersection
            .pass_throughs
            .push(process_pass_through(pass_index, &record.events, config));
    }

    for intersection in intersections.values_mut() {
        intersection.summary = aggregate_intersection(&intersection.pass_throughs, config);
        info!(
            intersection = %intersection.id,
            name = %intersection.name,
            pass_throughs = intersection.summary.total_pass_throughs,
            green_interval_changes = intersection.summary.green_interval_changes,
            "Aggregated intersection"
        );
    }

    info!(
        intersections = intersections.len(),
        skipped, "Finished processing pass-records"
    );
    intersections
}
