use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::analyzers::types::{
    IntersectionSummary, Metric, PassThrough, PredictedUsage, PredictionStatistics, Range,
    SignalGroupAnalysis, SpeedPattern, SpeedRange, StopLocation,
};
use crate::analyzers::utility::{mean, min_max, pct, round1};
use crate::config::{AnalysisConfig, SpeedPatternConfig, StopConfig};

/// Ingress key for signal groups that never reported one.
pub const UNKNOWN_INGRESS: &str = "Unknown";

/// Folds every [`PassThrough`] of one intersection into an [`IntersectionSummary`].
///
/// Change magnitudes are concatenated in pass order and left unsorted.
#[tracing::instrument(skip_all, fields(passes = passes.len()))]
pub fn aggregate_intersection(passes: &[PassThrough], config: &AnalysisConfig) -> IntersectionSummary {
    let mut summary = IntersectionSummary {
        total_pass_throughs: passes.len(),
        ..Default::default()
    };

    for pass in passes {
        summary.green_interval_changes += pass.summary.green_interval_changes;
        summary
            .green_change_types
            .merge(&pass.summary.green_change_types);
        summary
            .green_change_magnitudes
            .extend(&pass.summary.green_change_magnitudes);
    }
    summary.green_balance = summary.green_change_types.balance();

    summary.prediction_statistics = prediction_statistics(passes);
    summary.stop_locations = stop_locations(passes, &config.stops);
    summary.speed_patterns = speed_patterns(passes, &config.speed_patterns);
    summary.signal_group_analysis = signal_group_analysis(passes);

    for (name, analysis) in &summary.signal_group_analysis {
        let ingress = analysis
            .ingress
            .clone()
            .unwrap_or_else(|| UNKNOWN_INGRESS.to_string());
        summary
            .signal_groups_by_ingress
            .entry(ingress)
            .or_default()
            .push(name.clone());
    }

    summary
}

fn prediction_statistics(passes: &[PassThrough]) -> PredictionStatistics {
    let mut stats = PredictionStatistics::default();
    let mut usage: BTreeMap<String, usize> = BTreeMap::new();

    for pass in passes {
        let prediction = &pass.summary.prediction;
        if !prediction.predicted_signal_groups_used.is_empty() {
            stats.pass_throughs_with_predictions += 1;
        }
        if prediction.has_no_predicted_greens_with_available_events {
            stats.pass_throughs_with_no_green_warning += 1;
        }
        if prediction.possible_gps_mismatch {
            stats.pass_throughs_with_gps_mismatch += 1;
        }
        for used in &prediction.predicted_signal_groups_used {
            *usage.entry(used.signal_group.clone()).or_insert(0) += 1;
        }
    }

    stats.predicted_signal_groups = usage
        .into_iter()
        .map(|(name, count)| {
            let usage = PredictedUsage {
                count,
                percentage: round1(pct(count, passes.len())),
            };
            (name, usage)
        })
        .collect();

    stats
}

/// Every metric of every pass, tagged with its pass position and signal group.
fn all_metrics(passes: &[PassThrough]) -> impl Iterator<Item = (usize, &str, &Metric)> {
    passes.iter().enumerate().flat_map(|(pass_pos, pass)| {
        pass.signal_groups.iter().flat_map(move |(name, timeline)| {
            timeline
                .metrics
                .iter()
                .map(move |metric| (pass_pos, name.as_str(), metric))
        })
    })
}

/// Buckets where enough distinct pass-throughs came to a standstill.
fn stop_locations(passes: &[PassThrough], config: &StopConfig) -> Vec<StopLocation> {
    struct Bucket {
        passes: BTreeSet<usize>,
        signal_groups: BTreeSet<String>,
        distances: Vec<f64>,
    }

    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    for (pass_pos, name, metric) in all_metrics(passes) {
        if metric.speed >= config.speed_threshold_kph {
            continue;
        }
        // Halves round up, so -2.5 m joins the 0 m bucket.
        let idx = (metric.distance / config.bucket_m + 0.5).floor() as i64;
        let bucket = buckets.entry(idx).or_insert_with(|| Bucket {
            passes: BTreeSet::new(),
            signal_groups: BTreeSet::new(),
            distances: Vec::new(),
        });
        bucket.passes.insert(pass_pos);
        bucket.signal_groups.insert(name.to_string());
        bucket.distances.push(metric.distance);
    }

    let required = config.required_passes(passes.len());
    let half = config.bucket_m / 2.0;

    let mut locations: Vec<StopLocation> = buckets
        .into_iter()
        .filter(|(_, bucket)| bucket.passes.len() as f64 >= required)
        .map(|(idx, bucket)| {
            let centre = idx as f64 * config.bucket_m;
            StopLocation {
                distance_bucket: centre,
                distance_range: format!("{}-{}m", (centre - half).max(0.0), centre + half),
                avg_distance: mean(&bucket.distances),
                occurrences: bucket.passes.len(),
                percentage: round1(pct(bucket.passes.len(), passes.len())),
                signal_groups: bucket.signal_groups.into_iter().collect(),
            }
        })
        .collect();

    locations.sort_by(|a, b| a.avg_distance.total_cmp(&b.avg_distance));
    locations
}

/// Speed statistics per signal group and distance range.
fn speed_patterns(passes: &[PassThrough], config: &SpeedPatternConfig) -> Vec<SpeedPattern> {
    let mut bins: HashMap<(&str, i64), Vec<f64>> = HashMap::new();
    for (_, name, metric) in all_metrics(passes) {
        let idx = (metric.distance / config.bucket_m).floor() as i64;
        bins.entry((name, idx)).or_default().push(metric.speed);
    }

    let mut patterns: Vec<SpeedPattern> = bins
        .into_iter()
        .filter(|(_, speeds)| speeds.len() >= config.min_samples)
        .map(|((name, idx), speeds)| {
            let start = idx as f64 * config.bucket_m;
            let (min_speed, max_speed) = min_max(speeds.iter().copied()).unwrap_or_default();
            SpeedPattern {
                signal_group: name.to_string(),
                distance_range_start: start,
                distance_range: format!("{}-{}m", start, start + config.bucket_m),
                count: speeds.len(),
                min_speed,
                max_speed,
                avg_speed: mean(&speeds),
            }
        })
        .collect();

    patterns.sort_by(|a, b| {
        a.distance_range_start
            .total_cmp(&b.distance_range_start)
            .then_with(|| a.signal_group.cmp(&b.signal_group))
    });
    patterns
}

/// Per-signal-group statistics across all pass-throughs.
fn signal_group_analysis(passes: &[PassThrough]) -> BTreeMap<String, SignalGroupAnalysis> {
    let mut analysis: BTreeMap<String, SignalGroupAnalysis> = BTreeMap::new();
    let mut distances: HashMap<&str, Vec<f64>> = HashMap::new();
    let mut speeds: HashMap<&str, Vec<f64>> = HashMap::new();

    for pass in passes {
        for (name, timeline) in &pass.signal_groups {
            let entry = analysis.entry(name.clone()).or_default();
            entry.total_occurrences += 1;
            entry
                .movement_event_availability
                .record(timeline.movement_event_status());

            if entry.ingress.is_none() {
                entry.ingress = timeline
                    .metrics
                    .iter()
                    .find_map(|m| m.ingress.as_ref().map(|i| i.to_string()));
            }

            let sg = &timeline.summary;
            for (advice, count) in &sg.glosa_advice {
                *entry.glosa_advice_stats.entry(advice.clone()).or_insert(0) += count;
            }
            for (kind, count) in &sg.clearance_types {
                *entry.clearance_types.entry(kind.clone()).or_insert(0) += count;
            }
            entry.green_interval_changes += sg.green_interval_changes;
            entry.green_change_types.merge(&sg.green_change_types);
            entry.green_change_magnitudes.extend(&sg.green_change_magnitudes);

            distances
                .entry(name.as_str())
                .or_default()
                .extend(timeline.metrics.iter().map(|m| m.distance));
            speeds
                .entry(name.as_str())
                .or_default()
                .extend(timeline.metrics.iter().map(|m| m.speed));
        }
    }

    for (name, entry) in analysis.iter_mut() {
        if let Some(values) = distances.get(name.as_str()) {
            let (min, max) = min_max(values.iter().copied()).unwrap_or_default();
            entry.distance_range = Range { min, max };
        }
        if let Some(values) = speeds.get(name.as_str()) {
            let (min, max) = min_max(values.iter().copied()).unwrap_or_default();
            entry.speed_range = SpeedRange {
                min,
                max,
                avg: mean(values),
            };
        }
    }

    analysis
}
