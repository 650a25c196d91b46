use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use common::storage::types::canonical_object::CanonicalObject;

/// Recency half-life in days: an object this old scores 0.5.
const RECENCY_HALF_LIFE_DAYS: f64 = 90.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How the corpus spreads over time. Ages are measured in days from the
/// `now` the caller passes in, which keeps runs reproducible.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemporalReport {
    pub object_count: usize,
    /// Objects whose `created_at` parsed; only these feed the metrics.
    pub dated_object_count: usize,
    pub coverage_days: f64,
    pub avg_age_days: f64,
    pub median_age_days: f64,
    /// Objects per ISO week, keyed `YYYY-Www`.
    pub week_buckets: BTreeMap<String, usize>,
    pub recency_score: f64,
    /// Coefficient of variation of bucket counts clamped to [0, 1];
    /// 1 when everything lands in a single week.
    pub clustering_coefficient: f64,
}

pub fn evaluate_temporal(objects: &[CanonicalObject], now: DateTime<Utc>) -> TemporalReport {
    let timestamps: Vec<DateTime<Utc>> = objects
        .iter()
        .filter_map(CanonicalObject::created_at)
        .collect();

    if timestamps.is_empty() {
        return TemporalReport {
            object_count: objects.len(),
            ..TemporalReport::default()
        };
    }

    let oldest = timestamps.iter().min().copied().unwrap_or(now);
    let newest = timestamps.iter().max().copied().unwrap_or(now);
    let coverage_days = seconds_between(oldest, newest) / SECONDS_PER_DAY;

    let mut ages: Vec<f64> = timestamps
        .iter()
        .map(|timestamp| seconds_between(*timestamp, now) / SECONDS_PER_DAY)
        .collect();
    ages.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    #[allow(clippy::cast_precision_loss)]
    let avg_age_days = ages.iter().sum::<f64>() / ages.len() as f64;
    let median_age_days = median(&ages);

    let mut week_buckets: BTreeMap<String, usize> = BTreeMap::new();
    for timestamp in &timestamps {
        *week_buckets.entry(iso_week_bucket(*timestamp)).or_default() += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let recency_score = ages
        .iter()
        .map(|age| (-(2.0f64.ln()) * age / RECENCY_HALF_LIFE_DAYS).exp())
        .sum::<f64>()
        / ages.len() as f64;

    let clustering_coefficient = bucket_clustering(&week_buckets);

    TemporalReport {
        object_count: objects.len(),
        dated_object_count: timestamps.len(),
        coverage_days,
        avg_age_days,
        median_age_days,
        week_buckets,
        recency_score,
        clustering_coefficient,
    }
}

pub fn iso_week_bucket(timestamp: DateTime<Utc>) -> String {
    let week = timestamp.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        (to - from).num_seconds() as f64
    }
}

fn median(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Coefficient of variation of the bucket counts. A corpus spread evenly
/// over weeks scores near 0; bursts push it toward 1.
#[allow(clippy::cast_precision_loss)]
fn bucket_clustering(buckets: &BTreeMap<String, usize>) -> f64 {
    if buckets.len() <= 1 {
        return if buckets.is_empty() { 0.0 } else { 1.0 };
    }

    let counts: Vec<f64> = buckets.values().map(|count| *count as f64).collect();
    let mean = counts.iter().sum::<f64>() / counts.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = counts
        .iter()
        .map(|count| (count - mean).powi(2))
        .sum::<f64>()
        / counts.len() as f64;
    (variance.sqrt() / mean).clamp(0.0, 1.0)
}
