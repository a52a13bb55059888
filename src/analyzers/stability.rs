//! Green-interval change detection.
//!
//! Consecutive samples of one signal group are compared; a bound that moved
//! by more than the elapsed time plus a fixed tolerance is a candidate
//! change. Candidates are then checked against the controller's movement
//! events, because a plain phase advance between two samples also makes the
//! raw interval jump without any real timing change.

use chrono::{DateTime, Utc};

use crate::analyzers::types::{ChangeType, GreenIntervalChange, Metric};
use crate::config::StabilityConfig;
use crate::telemetry::MovementEvent;

/// Last observed green interval of a signal group (at least one bound set).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalState {
    pub green_start: Option<f64>,
    pub green_end: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl IntervalState {
    /// State to carry forward after `metric`, or `None` if both bounds are unknown.
    pub fn after(metric: &Metric) -> Option<Self> {
        if metric.green_start_time.is_none() && metric.green_end_time.is_none() {
            return None;
        }
        Some(Self {
            green_start: metric.green_start_time,
            green_end: metric.green_end_time,
            timestamp: metric.timestamp,
        })
    }
}

/// Outcome of comparing two movement-event lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityVerdict {
    SameSequenceAndTiming,
    NaturalPhaseProgression,
    TimingShifted,
    PatternMismatch,
    InsufficientData,
}

impl StabilityVerdict {
    pub fn is_stable(self) -> bool {
        match self {
            StabilityVerdict::SameSequenceAndTiming | StabilityVerdict::NaturalPhaseProgression => {
                true
            }
            StabilityVerdict::TimingShifted
            | StabilityVerdict::PatternMismatch
            | StabilityVerdict::InsufficientData => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StabilityVerdict::SameSequenceAndTiming => "same_sequence_and_timing",
            StabilityVerdict::NaturalPhaseProgression => "natural_phase_progression",
            StabilityVerdict::TimingShifted => "timing_shifted",
            StabilityVerdict::PatternMismatch => "pattern_mismatch",
            StabilityVerdict::InsufficientData => "insufficient_data",
        }
    }
}

/// What the detector concluded for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeDecision {
    /// No earlier interval to compare against.
    NoBaseline,
    WithinThreshold,
    /// A bound moved, but the movement events show the timing held.
    SuppressedAsStable(StabilityVerdict),
    Accepted {
        change: GreenIntervalChange,
        verdict: StabilityVerdict,
    },
}

impl ChangeDecision {
    pub fn accepted(&self) -> Option<GreenIntervalChange> {
        match self {
            ChangeDecision::Accepted { change, .. } => Some(*change),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeDecision::NoBaseline => "no_baseline",
            ChangeDecision::WithinThreshold => "within_threshold",
            ChangeDecision::SuppressedAsStable(_) => "suppressed_as_stable",
            ChangeDecision::Accepted { .. } => "accepted",
        }
    }
}

/// Change types to report for one bound of the interval.
struct BoundKinds {
    lower: ChangeType,
    higher: ChangeType,
    appeared: ChangeType,
    vanished: ChangeType,
}

const START_KINDS: BoundKinds = BoundKinds {
    lower: ChangeType::EarlierGreenStart,
    higher: ChangeType::LaterGreenStart,
    appeared: ChangeType::EarlierGreenStart,
    vanished: ChangeType::LaterGreenStart,
};

const END_KINDS: BoundKinds = BoundKinds {
    lower: ChangeType::ShortenedGreenEnd,
    higher: ChangeType::ExtendedGreenEnd,
    appeared: ChangeType::ExtendedGreenEnd,
    vanished: ChangeType::ShortenedGreenEnd,
};

fn compare_bound(
    previous: Option<f64>,
    current: Option<f64>,
    threshold: f64,
    kinds: &BoundKinds,
) -> Option<GreenIntervalChange> {
    match (previous, current) {
        (Some(prev), Some(cur)) => {
            let diff = (cur - prev).abs();
            if diff <= threshold {
                return None;
            }
            let kind = if cur < prev { kinds.lower } else { kinds.higher };
            Some(GreenIntervalChange {
                kind,
                magnitude: diff,
            })
        }
        (Some(prev), None) => Some(GreenIntervalChange {
            kind: kinds.vanished,
            magnitude: prev.abs(),
        }),
        (None, Some(cur)) => Some(GreenIntervalChange {
            kind: kinds.appeared,
            magnitude: cur.abs(),
        }),
        (None, None) => None,
    }
}

/// Compares `current` against the stored interval of its signal group.
///
/// A start-time change wins over an end-time change when both bounds moved.
/// `previous_movement` are the movement events of the signal group's
/// preceding sample.
pub fn detect_change(
    previous: Option<&IntervalState>,
    previous_movement: &[MovementEvent],
    current: &Metric,
    config: &StabilityConfig,
) -> ChangeDecision {
    let Some(prev) = previous else {
        return ChangeDecision::NoBaseline;
    };

    let elapsed_secs = (current.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
    let threshold = elapsed_secs.max(0.0) + config.base_tolerance_secs;

    let start = compare_bound(prev.green_start, current.green_start_time, threshold, &START_KINDS);
    let end = compare_bound(prev.green_end, current.green_end_time, threshold, &END_KINDS);

    let Some(change) = start.or(end) else {
        return ChangeDecision::WithinThreshold;
    };

    let verdict = movement_event_stability(
        previous_movement,
        &current.movement_events,
        config.movement_timing_tolerance_secs,
    );

    if verdict.is_stable() {
        ChangeDecision::SuppressedAsStable(verdict)
    } else {
        ChangeDecision::Accepted { change, verdict }
    }
}

type PhaseEntry<'a> = (Option<&'a str>, Option<DateTime<Utc>>);

fn phase_entries(events: &[MovementEvent]) -> Vec<PhaseEntry<'_>> {
    events
        .iter()
        .map(|me| (me.state.as_deref(), me.likely_time.or(me.min_end_time)))
        .collect()
}

/// Phase-for-phase match over the overlapping prefix.
fn aligned(a: &[PhaseEntry<'_>], b: &[PhaseEntry<'_>]) -> bool {
    let n = a.len().min(b.len());
    n > 0 && a[..n].iter().zip(&b[..n]).all(|(x, y)| x.0 == y.0)
}

fn end_time_gap_secs(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).num_milliseconds().abs() as f64 / 1000.0,
        (None, None) => 0.0,
        _ => f64::INFINITY,
    }
}

/// Decides whether two consecutive movement-event lists describe the same
/// signal timing.
pub fn movement_event_stability(
    previous: &[MovementEvent],
    current: &[MovementEvent],
    timing_tolerance_secs: f64,
) -> StabilityVerdict {
    if previous.is_empty() || current.is_empty() {
        return StabilityVerdict::InsufficientData;
    }

    let prev = phase_entries(previous);
    let cur = phase_entries(current);

    let same_sequence = prev.len() == cur.len() && prev.iter().zip(&cur).all(|(a, b)| a.0 == b.0);
    if same_sequence {
        let max_gap = prev
            .iter()
            .zip(&cur)
            .map(|(a, b)| end_time_gap_secs(a.1, b.1))
            .fold(0.0, f64::max);

        return if max_gap > timing_tolerance_secs {
            StabilityVerdict::TimingShifted
        } else {
            StabilityVerdict::SameSequenceAndTiming
        };
    }

    if aligned(&prev, &cur[1..]) {
        return StabilityVerdict::NaturalPhaseProgression;
    }

    if aligned(&prev[..prev.len() - 1], &cur) {
        return StabilityVerdict::NaturalPhaseProgression;
    }

    StabilityVerdict::PatternMismatch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::normalize::normalize;
    use crate::telemetry::{RawEvent, SignalGroupStatus};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn me(state: &str, likely_offset_secs: i64) -> MovementEvent {
        MovementEvent {
            state: Some(state.to_string()),
            likely_time: Some(t0() + Duration::seconds(likely_offset_secs)),
            ..Default::default()
        }
    }

    fn metric_at(
        offset_secs: i64,
        start: Option<f64>,
        end: Option<f64>,
        movement: Vec<MovementEvent>,
    ) -> Metric {
        let event = RawEvent::default();
        let mut metric = normalize(
            &event,
            t0() + Duration::seconds(offset_secs),
            &SignalGroupStatus {
                movement_event: movement,
                ..Default::default()
            },
        );
        metric.green_start_time = start;
        metric.green_end_time = end;
        metric
    }

    fn state(offset_secs: i64, start: Option<f64>, end: Option<f64>) -> IntervalState {
        IntervalState {
            green_start: start,
            green_end: end,
            timestamp: t0() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_no_baseline() {
        let current = metric_at(0, Some(10.0), Some(40.0), vec![]);
        let decision = detect_change(None, &[], &current, &StabilityConfig::default());
        assert_eq!(decision, ChangeDecision::NoBaseline);
    }

    #[test]
    fn test_threshold_boundary_is_exclusive() {
        // gap 2s -> threshold 5.0; end moves by exactly 5.0
        let previous = state(0, Some(10.0), Some(40.0));
        let current = metric_at(2, Some(10.0), Some(45.0), vec![]);

        let decision = detect_change(Some(&previous), &[], &current, &StabilityConfig::default());
        assert_eq!(decision, ChangeDecision::WithinThreshold);
    }

    #[test]
    fn test_extended_end_beyond_threshold_is_accepted_without_movement_data() {
        let previous = state(0, Some(10.0), Some(40.0));
        let current = metric_at(2, Some(10.0), Some(46.0), vec![]);

        let decision = detect_change(Some(&previous), &[], &current, &StabilityConfig::default());
        assert_eq!(
            decision,
            ChangeDecision::Accepted {
                change: GreenIntervalChange {
                    kind: ChangeType::ExtendedGreenEnd,
                    magnitude: 6.0
                },
                verdict: StabilityVerdict::InsufficientData,
            }
        );
    }

    #[test]
    fn test_negative_time_gap_uses_base_tolerance() {
        let previous = state(5, Some(10.0), Some(40.0));
        let current = metric_at(0, Some(13.5), Some(40.0), vec![]);

        let decision = detect_change(Some(&previous), &[], &current, &StabilityConfig::default());
        assert_eq!(
            decision.accepted().map(|c| c.kind),
            Some(ChangeType::LaterGreenStart)
        );
    }

    #[test]
    fn test_start_change_takes_precedence_over_end_change() {
        // Known approximation: a simultaneous favourable end change is masked.
        let previous = state(0, Some(20.0), Some(40.0));
        let current = metric_at(1, Some(30.0), Some(60.0), vec![]);

        let change = detect_change(Some(&previous), &[], &current, &StabilityConfig::default())
            .accepted()
            .unwrap();
        assert_eq!(change.kind, ChangeType::LaterGreenStart);
        assert_eq!(change.magnitude, 10.0);
    }

    #[test]
    fn test_vanished_bounds_are_changes_of_their_previous_magnitude() {
        let previous = state(0, None, Some(30.0));
        let current = metric_at(1, None, None, vec![]);

        let change = detect_change(Some(&previous), &[], &current, &StabilityConfig::default())
            .accepted()
            .unwrap();
        assert_eq!(change.kind, ChangeType::ShortenedGreenEnd);
        assert_eq!(change.magnitude, 30.0);
    }

    #[test]
    fn test_appearing_start_is_earlier_green() {
        let previous = state(0, None, Some(30.0));
        let current = metric_at(1, Some(4.0), Some(30.0), vec![]);

        let change = detect_change(Some(&previous), &[], &current, &StabilityConfig::default())
            .accepted()
            .unwrap();
        assert_eq!(change.kind, ChangeType::EarlierGreenStart);
        assert_eq!(change.magnitude, 4.0);
    }

    #[test]
    fn test_forward_phase_shift_suppresses_vanished_interval() {
        let previous_movement = vec![
            me("stopAndRemain", 5),
            me("protectedMovementAllowed", 30),
        ];
        let current_movement = vec![
            me("protectedMovementAllowed", 1),
            me("stopAndRemain", 5),
            me("protectedMovementAllowed", 30),
        ];
        let previous = state(0, Some(5.0), Some(30.0));
        let current = metric_at(1, None, None, current_movement);

        let decision = detect_change(
            Some(&previous),
            &previous_movement,
            &current,
            &StabilityConfig::default(),
        );
        assert_eq!(
            decision,
            ChangeDecision::SuppressedAsStable(StabilityVerdict::NaturalPhaseProgression)
        );
        assert!(decision.accepted().is_none());
    }

    #[test]
    fn test_same_sequence_within_tolerance_is_stable() {
        let a = vec![me("stopAndRemain", 10), me("protectedMovementAllowed", 40)];
        let b = vec![me("stopAndRemain", 11), me("protectedMovementAllowed", 42)];
        assert_eq!(
            movement_event_stability(&a, &b, 2.0),
            StabilityVerdict::SameSequenceAndTiming
        );
    }

    #[test]
    fn test_same_sequence_with_shifted_timing() {
        let a = vec![me("stopAndRemain", 10), me("protectedMovementAllowed", 40)];
        let b = vec![me("stopAndRemain", 10), me("protectedMovementAllowed", 43)];
        assert_eq!(
            movement_event_stability(&a, &b, 2.0),
            StabilityVerdict::TimingShifted
        );
    }

    #[test]
    fn test_min_end_time_used_when_likely_missing() {
        let mut a = me("stopAndRemain", 0);
        a.likely_time = None;
        a.min_end_time = Some(t0());
        let mut b = me("stopAndRemain", 0);
        b.likely_time = None;
        b.min_end_time = Some(t0() + Duration::seconds(5));

        assert_eq!(
            movement_event_stability(&[a], &[b], 2.0),
            StabilityVerdict::TimingShifted
        );
    }

    #[test]
    fn test_reverse_shift_is_natural_progression() {
        let a = vec![
            me("protectedMovementAllowed", 5),
            me("permissiveClearance", 8),
            me("stopAndRemain", 40),
        ];
        let b = vec![me("protectedMovementAllowed", 5), me("permissiveClearance", 8)];
        assert_eq!(
            movement_event_stability(&a, &b, 2.0),
            StabilityVerdict::NaturalPhaseProgression
        );
    }

    #[test]
    fn test_pattern_mismatch() {
        let a = vec![me("stopAndRemain", 5), me("stopAndRemain", 50)];
        let b = vec![
            me("permissiveClearance", 5),
            me("protectedMovementAllowed", 8),
            me("permissiveClearance", 40),
        ];
        assert_eq!(
            movement_event_stability(&a, &b, 2.0),
            StabilityVerdict::PatternMismatch
        );
    }

    #[test]
    fn test_empty_lists_are_insufficient() {
        let a = vec![me("stopAndRemain", 5)];
        assert_eq!(
            movement_event_stability(&a, &[], 2.0),
            StabilityVerdict::InsufficientData
        );
        assert_eq!(
            movement_event_stability(&[], &a, 2.0),
            StabilityVerdict::InsufficientData
        );
    }

    #[test]
    fn test_interval_state_cleared_when_both_bounds_missing() {
        assert!(IntervalState::after(&metric_at(0, None, None, vec![])).is_none());
        let kept = IntervalState::after(&metric_at(0, Some(3.0), None, vec![])).unwrap();
        assert_eq!(kept.green_start, Some(3.0));
        assert_eq!(kept.green_end, None);
    }
}
