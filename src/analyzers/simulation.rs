//! Replays GLOSA speed advice with a simple kinematic vehicle model and checks
//! whether following it would have reached the stop line on green.
//!
//! Two reports are built on the same replay: advice reliability per distance
//! interval, and missed opportunities where the advice would have worked but
//! the vehicle was still waiting at the line.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::analyzers::types::{IntersectionMap, Metric};
use crate::analyzers::utility::pct;
use crate::config::{AnalysisConfig, SimulationConfig};

/// Advice kinds that can be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AdviceKind {
    Accelerate,
    Cruise,
    Decelerate,
}

impl AdviceKind {
    pub const ALL: [AdviceKind; 3] = [
        AdviceKind::Accelerate,
        AdviceKind::Cruise,
        AdviceKind::Decelerate,
    ];

    /// Case-insensitive; anything else (`none`, `stop`, ...) is not simulated.
    pub fn parse(advice: &str) -> Option<Self> {
        match advice.to_ascii_lowercase().as_str() {
            "accelerate" => Some(AdviceKind::Accelerate),
            "cruise" => Some(AdviceKind::Cruise),
            "decelerate" => Some(AdviceKind::Decelerate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceOutcome {
    pub total: usize,
    pub success: usize,
    pub success_rate: f64,
}

impl AdviceOutcome {
    fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.success += 1;
        }
    }

    fn finish(&mut self) {
        self.success_rate = pct(self.success, self.total);
    }
}

/// Opportunities where the advice would have arrived on green, and how many
/// of them the vehicle still missed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedOutcome {
    pub total: usize,
    pub missed: usize,
    pub missed_rate: f64,
}

impl MissedOutcome {
    fn record(&mut self, missed: bool) {
        self.total += 1;
        if missed {
            self.missed += 1;
        }
    }

    fn merge(&mut self, other: &MissedOutcome) {
        self.total += other.total;
        self.missed += other.missed;
    }

    fn finish(&mut self) {
        self.missed_rate = pct(self.missed, self.total);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ByAdviceType<T> {
    pub accelerate: T,
    pub cruise: T,
    pub decelerate: T,
}

impl<T> ByAdviceType<T> {
    fn slot(&mut self, kind: AdviceKind) -> &mut T {
        match kind {
            AdviceKind::Accelerate => &mut self.accelerate,
            AdviceKind::Cruise => &mut self.cruise,
            AdviceKind::Decelerate => &mut self.decelerate,
        }
    }

    pub fn get(&self, kind: AdviceKind) -> &T {
        match kind {
            AdviceKind::Accelerate => &self.accelerate,
            AdviceKind::Cruise => &self.cruise,
            AdviceKind::Decelerate => &self.decelerate,
        }
    }
}

/// Advice reliability within one distance interval `[min, max)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalReliability {
    pub interval: String,
    pub min: f64,
    pub max: f64,
    pub total_advice: usize,
    pub successful_advice: usize,
    pub success_rate: f64,
    pub by_advice_type: ByAdviceType<AdviceOutcome>,
}

/// Missed opportunities within one distance interval `[min, max)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalMissedOpportunities {
    pub interval: String,
    pub min: f64,
    pub max: f64,
    pub total_opportunities: usize,
    pub missed_opportunities: usize,
    pub missed_rate: f64,
    pub by_advice_type: ByAdviceType<MissedOutcome>,
}

/// Missed opportunities per interval plus the totals over all intervals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedOpportunityReport {
    pub total_opportunities: usize,
    pub missed_opportunities: usize,
    pub missed_rate: f64,
    pub by_advice_type: ByAdviceType<MissedOutcome>,
    pub intervals: Vec<IntervalMissedOpportunities>,
}

/// Seconds needed to cover `distance` metres starting at `current_mps` and
/// adjusting speed towards `target_mps`.
pub fn simulate_travel(
    distance: f64,
    current_mps: f64,
    target_mps: f64,
    config: &SimulationConfig,
) -> f64 {
    let current = current_mps.max(0.0);
    let target = target_mps.clamp(config.min_speed_kph / 3.6, config.max_speed_kph / 3.6);

    if distance < 0.1 {
        return 0.1;
    }

    let a = config.acceleration;
    let speed_diff = target - current;
    let accel_time = speed_diff.abs() / a;
    let accel_distance = current * accel_time + 0.5 * sign(speed_diff) * a * accel_time * accel_time;

    if accel_distance >= distance {
        return partial_manoeuvre_time(distance, current, speed_diff, a)
            .filter(|t| t.is_finite())
            .unwrap_or_else(|| {
                debug!(distance, current, target, "Falling back to average-speed travel time");
                average_speed_time(distance, current, target)
            });
    }

    accel_time + (distance - accel_distance) / target
}

/// Exact time when the whole distance is covered while still changing speed.
/// `None` when the vehicle cannot slow down within the distance.
pub fn partial_manoeuvre_time(distance: f64, current: f64, speed_diff: f64, a: f64) -> Option<f64> {
    if speed_diff >= 0.0 {
        return Some(((current * current + 2.0 * a * distance).sqrt() - current) / a);
    }
    let radicand = current * current - 2.0 * a * distance;
    if radicand < 0.0 {
        return None;
    }
    Some((current - radicand.sqrt()) / a)
}

fn average_speed_time(distance: f64, current: f64, target: f64) -> f64 {
    distance / ((current + target) / 2.0)
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn seconds(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}

/// When following the advice given at `metric` reaches the stop line.
pub fn predicted_arrival(metric: &Metric, config: &SimulationConfig) -> DateTime<Utc> {
    let travel = simulate_travel(
        metric.distance,
        metric.speed / 3.6,
        metric.glosa_speed_kph.unwrap_or(0.0) / 3.6,
        config,
    );
    metric.timestamp + seconds(travel)
}

/// True if any metric within `arrival ± tolerance_secs` shows a current green.
pub fn arrives_on_green(metrics: &[Metric], arrival: DateTime<Utc>, tolerance_secs: f64) -> bool {
    let tolerance = seconds(tolerance_secs);
    let (early, late) = (arrival - tolerance, arrival + tolerance);
    metrics
        .iter()
        .filter(|m| m.timestamp >= early && m.timestamp <= late)
        .any(Metric::has_current_green)
}

/// True if, within the waiting window after `arrival`, the vehicle was still
/// slow and either saw no green or stood still while it was green.
/// No samples in the window means the vehicle had already passed.
pub fn was_still_waiting(
    metrics: &[Metric],
    arrival: DateTime<Utc>,
    config: &SimulationConfig,
) -> bool {
    let window_end = arrival + seconds(config.waiting_window_secs);
    let window: Vec<&Metric> = metrics
        .iter()
        .filter(|m| m.timestamp >= arrival && m.timestamp <= window_end)
        .collect();

    let slow = window.iter().any(|m| m.speed < config.waiting_speed_kph);
    let saw_green = window.iter().any(|m| m.has_current_green());
    let standing = window.iter().any(|m| m.speed < config.stopped_speed_kph);

    slow && (!saw_green || standing)
}

fn all_timelines(intersections: &IntersectionMap) -> Vec<&[Metric]> {
    intersections
        .values()
        .flat_map(|i| i.pass_throughs.iter())
        .flat_map(|p| p.signal_groups.values())
        .map(|sg| sg.metrics.as_slice())
        .collect()
}

fn max_distance(timelines: &[&[Metric]]) -> f64 {
    timelines
        .iter()
        .flat_map(|metrics| metrics.iter().map(|m| m.distance))
        .fold(0.0_f64, f64::max)
}

/// First simulatable advice inside `[min, max)`, in timestamp order.
fn first_advice(metrics: &[Metric], min: f64, max: f64) -> Option<(AdviceKind, &Metric)> {
    metrics.iter().find_map(|m| {
        let in_range = m.distance >= min && m.distance < max;
        let kind = m.glosa_advice.as_deref().and_then(AdviceKind::parse);
        kind.filter(|_| in_range).map(|kind| (kind, m))
    })
}

/// Simulates the first usable advice per signal group and pass-through in
/// every distance interval. Intervals without any advice are left out.
#[tracing::instrument(skip_all, fields(intersections = intersections.len()))]
pub fn analyze_advice_reliability(
    intersections: &IntersectionMap,
    config: &AnalysisConfig,
) -> Vec<IntervalReliability> {
    let sim = &config.simulation;
    if sim.interval_m <= 0.0 {
        return Vec::new();
    }

    let timelines = all_timelines(intersections);
    let interval_count = (max_distance(&timelines) / sim.interval_m).ceil() as usize;

    let mut report = Vec::new();
    for i in 0..interval_count {
        let min = i as f64 * sim.interval_m;
        let max = min + sim.interval_m;
        let mut stats = IntervalReliability {
            interval: format!("{min}-{max}m"),
            min,
            max,
            ..Default::default()
        };

        for metrics in &timelines {
            let Some((kind, metric)) = first_advice(metrics, min, max) else {
                continue;
            };

            let arrival = predicted_arrival(metric, sim);
            let success = arrives_on_green(metrics, arrival, sim.tolerance_secs);

            stats.total_advice += 1;
            if success {
                stats.successful_advice += 1;
            }
            stats.by_advice_type.slot(kind).record(success);
        }

        if stats.total_advice == 0 {
            continue;
        }

        stats.success_rate = pct(stats.successful_advice, stats.total_advice);
        for kind in AdviceKind::ALL {
            stats.by_advice_type.slot(kind).finish();
        }
        debug!(
            interval = %stats.interval,
            total = stats.total_advice,
            success_rate = stats.success_rate,
            "Simulated interval"
        );
        report.push(stats);
    }

    report
}

/// Counts advice that would have arrived on green while the vehicle was
/// still waiting at the line. Intervals start at `minDistanceM` and end at
/// the largest recorded distance, capped at `maxDistanceM`. Intervals
/// without any opportunity are left out of `intervals` but the totals cover
/// every interval.
#[tracing::instrument(skip_all, fields(intersections = intersections.len()))]
pub fn analyze_missed_opportunities(
    intersections: &IntersectionMap,
    config: &AnalysisConfig,
) -> MissedOpportunityReport {
    let sim = &config.simulation;
    let mut report = MissedOpportunityReport::default();
    if sim.interval_m <= 0.0 {
        return report;
    }

    let timelines = all_timelines(intersections);
    let upper = sim.max_distance_m.min(max_distance(&timelines));
    let end = (upper / sim.interval_m).ceil() * sim.interval_m;
    let interval_count = ((end - sim.min_distance_m) / sim.interval_m).ceil().max(0.0) as usize;

    for i in 0..interval_count {
        let min = sim.min_distance_m + i as f64 * sim.interval_m;
        let max = min + sim.interval_m;
        let mut stats = IntervalMissedOpportunities {
            interval: format!("{min}-{max}m"),
            min,
            max,
            ..Default::default()
        };

        for metrics in &timelines {
            let Some((kind, metric)) = first_advice(metrics, min, max) else {
                continue;
            };

            let arrival = predicted_arrival(metric, sim);
            if !arrives_on_green(metrics, arrival, sim.tolerance_secs) {
                continue;
            }

            let missed = was_still_waiting(metrics, arrival, sim);
            stats.total_opportunities += 1;
            if missed {
                stats.missed_opportunities += 1;
            }
            stats.by_advice_type.slot(kind).record(missed);
        }

        if stats.total_opportunities == 0 {
            continue;
        }

        stats.missed_rate = pct(stats.missed_opportunities, stats.total_opportunities);
        for kind in AdviceKind::ALL {
            stats.by_advice_type.slot(kind).finish();
            report
                .by_advice_type
                .slot(kind)
                .merge(stats.by_advice_type.get(kind));
        }
        report.total_opportunities += stats.total_opportunities;
        report.missed_opportunities += stats.missed_opportunities;

        debug!(
            interval = %stats.interval,
            opportunities = stats.total_opportunities,
            missed_rate = stats.missed_rate,
            "Checked interval for missed opportunities"
        );
        report.intervals.push(stats);
    }

    report.missed_rate = pct(report.missed_opportunities, report.total_opportunities);
    for kind in AdviceKind::ALL {
        report.by_advice_type.slot(kind).finish();
    }
    report
}
