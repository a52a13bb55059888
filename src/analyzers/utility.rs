/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `part / total` as a percentage. Returns 0.0 when `total` is zero.
pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Minimum and maximum of a non-empty iterator, `None` when empty.
pub fn min_max(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Counts occurrences of each key.
pub fn count_occurrences<'a>(
    keys: impl IntoIterator<Item = &'a str>,
) -> std::collections::BTreeMap<String, usize> {
    let mut counts = std::collections::BTreeMap::new();
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[2.0, 4.0]), 3.0);
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(pct(10, 0), 0.0);
        assert_eq!(pct(1, 4), 25.0);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(pct(1, 3)), 33.3);
        assert_eq!(round1(pct(2, 3)), 66.7);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(Vec::<f64>::new()), None);
        assert_eq!(min_max(vec![3.0, -1.0, 7.5]), Some((-1.0, 7.5)));
    }

    #[test]
    fn test_count_occurrences() {
        let counts = count_occurrences(["cruise", "accelerate", "cruise"]);
        assert_eq!(counts["cruise"], 2);
        assert_eq!(counts["accelerate"], 1);
    }
}
