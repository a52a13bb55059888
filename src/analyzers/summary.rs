//! Per-signal-group statistics for one pass-through.

use crate::analyzers::types::{Metric, Range, SignalGroupSummary, SpeedRange};
use crate::analyzers::utility::{count_occurrences, mean, min_max};

/// Reduces a signal group's metrics to ranges, histograms and change tallies.
///
/// An empty slice yields the all-zero summary.
pub fn summarize(metrics: &[Metric]) -> SignalGroupSummary {
    let mut summary = SignalGroupSummary::default();

    let Some((distance_min, distance_max)) = min_max(metrics.iter().map(|m| m.distance)) else {
        return summary;
    };
    let (speed_min, speed_max) = min_max(metrics.iter().map(|m| m.speed)).unwrap_or_default();
    let speeds: Vec<f64> = metrics.iter().map(|m| m.speed).collect();

    summary.distance_range = Range {
        min: distance_min,
        max: distance_max,
    };
    summary.speed_range = SpeedRange {
        min: speed_min,
        max: speed_max,
        avg: mean(&speeds),
    };
    summary.glosa_advice = count_occurrences(
        metrics
            .iter()
            .filter_map(|m| m.glosa_advice.as_deref())
            .filter(|advice| !advice.is_empty()),
    );
    summary.clearance_types = count_occurrences(
        metrics
            .iter()
            .filter_map(|m| m.clearance_cal_type.as_deref())
            .filter(|kind| !kind.is_empty()),
    );

    for change in metrics.iter().filter_map(|m| m.green_change) {
        summary.green_interval_changes += 1;
        summary.green_change_types.record(change.kind);
        summary
            .green_change_magnitudes
            .record(change.kind, change.magnitude);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::normalize::normalize;
    use crate::analyzers::types::{ChangeType, GreenIntervalChange};
    use crate::telemetry::{RawEvent, SignalGroupStatus};
    use chrono::{TimeZone, Utc};

    fn metric(distance: f64, speed: f64, advice: Option<&str>) -> Metric {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut m = normalize(&RawEvent::default(), ts, &SignalGroupStatus::default());
        m.distance = distance;
        m.speed = speed;
        m.glosa_advice = advice.map(str::to_string);
        m
    }

    #[test]
    fn test_empty_metrics_yield_zero_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary, SignalGroupSummary::default());
        assert_eq!(summary.speed_range.avg, 0.0);
        assert!(summary.glosa_advice.is_empty());
    }

    #[test]
    fn test_ranges_and_histograms() {
        let mut metrics = vec![
            metric(120.0, 40.0, Some("cruise")),
            metric(60.0, 20.0, Some("decelerate")),
            metric(15.0, 0.0, None),
            metric(2.0, 12.0, Some("cruise")),
        ];
        metrics[1].clearance_cal_type = Some("fixed".to_string());

        let summary = summarize(&metrics);
        assert_eq!(summary.distance_range, Range { min: 2.0, max: 120.0 });
        assert_eq!(summary.speed_range.min, 0.0);
        assert_eq!(summary.speed_range.max, 40.0);
        assert_eq!(summary.speed_range.avg, 18.0);
        assert_eq!(summary.glosa_advice["cruise"], 2);
        assert_eq!(summary.glosa_advice["decelerate"], 1);
        assert_eq!(summary.clearance_types["fixed"], 1);
        assert_eq!(summary.green_interval_changes, 0);
    }

    #[test]
    fn test_empty_labels_are_not_counted() {
        let mut metrics = vec![metric(30.0, 10.0, Some("")), metric(20.0, 10.0, Some("cruise"))];
        metrics[0].clearance_cal_type = Some(String::new());
        metrics[1].clearance_cal_type = Some("fixed".to_string());

        let summary = summarize(&metrics);
        assert_eq!(summary.glosa_advice.len(), 1);
        assert_eq!(summary.glosa_advice["cruise"], 1);
        assert_eq!(summary.clearance_types.len(), 1);
        assert_eq!(summary.clearance_types["fixed"], 1);
    }

    #[test]
    fn test_change_tallies() {
        let mut metrics = vec![metric(50.0, 30.0, None), metric(40.0, 30.0, None)];
        metrics[1].green_change = Some(GreenIntervalChange {
            kind: ChangeType::EarlierGreenStart,
            magnitude: 7.5,
        });

        let summary = summarize(&metrics);
        assert_eq!(summary.green_interval_changes, 1);
        assert_eq!(summary.green_change_types.earlier_green_start, 1);
        assert_eq!(summary.green_change_magnitudes.earlier_green_start, vec![7.5]);
        assert!(summary.green_change_magnitudes.later_green_start.is_empty());
    }
}
