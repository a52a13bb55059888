//! Flattens one raw event + one of its signal-group blocks into a [`Metric`].

use chrono::{DateTime, Utc};

use crate::analyzers::types::Metric;
use crate::telemetry::{RawEvent, SignalGroupStatus};

/// Builds the metric for `sg` as seen in `event`.
///
/// Missing position or intersection data default to `0.0`; missing GLOSA
/// blocks leave every advisory field `None`. The change fields are left
/// empty; the stability detector fills them in.
pub fn normalize(event: &RawEvent, timestamp: DateTime<Utc>, sg: &SignalGroupStatus) -> Metric {
    let mut metric = base_metric(event, timestamp);

    metric.movement_events_available = !sg.movement_event.is_empty();
    metric.movement_events = sg.movement_event.clone();

    if let Some(glosa) = &sg.glosa {
        metric.glosa_advice = glosa.advice.clone();
        metric.glosa_speed_kph = glosa.speed_kph;
        metric.time_to_green = glosa.time_to_green;

        if let Some(info) = &glosa.internal_info {
            metric.distance_to_stop = info.distance_to_stop;
            metric.min_travel_time = info.minimal_travel_time;
            metric.max_travel_time = info.maximal_travel_time;
            metric.seconds_to_green = info.seconds_to_green_start;
            metric.clearance_time = info.clearance_time;
            metric.clearance_cal_type = info.clearance_cal_type.as_ref().map(|c| c.to_string());
            metric.green_start_time = info.green_start_time;
            metric.green_end_time = info.green_end_time;
        }
    }

    metric
}

/// The single degenerate metric of a
/// [`NO_SIGNAL_GROUPS`](crate::analyzers::types::NO_SIGNAL_GROUPS) timeline.
pub fn placeholder(event: &RawEvent, timestamp: DateTime<Utc>) -> Metric {
    let mut metric = base_metric(event, timestamp);
    metric.glosa_advice = Some("none".to_string());
    metric
}

fn base_metric(event: &RawEvent, timestamp: DateTime<Utc>) -> Metric {
    let pos = event.pos_data.as_ref();
    let geo = pos.and_then(|p| p.geo_pos.as_ref());

    Metric {
        timestamp,
        distance: event.distance(),
        speed: event.speed_kph(),
        lat: geo.and_then(|g| g.lat).unwrap_or(0.0),
        lng: geo.and_then(|g| g.lng).unwrap_or(0.0),
        heading: pos
            .and_then(|p| p.head.as_ref())
            .and_then(|h| h.value)
            .unwrap_or(0.0),
        ingress: event.ingress(),
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
        green_start_time: None,
        green_end_time: None,
        green_change: None,
    }
}
