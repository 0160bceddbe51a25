//! First-time-quality prediction relay.
//!
//! The hub hands the current document to a [`Predictor`] and relays whatever
//! summary comes back. [`StatisticalPredictor`] is the built-in model: it
//! needs no training data and always produces a summary for non-empty input.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use thiserror::Error;

/// Reasons a prediction could not be produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PredictError {
    #[error("document is not an array of records")]
    NotAnArray,

    #[error("no defect records to analyze")]
    NoRecords,
}

/// `records → prediction summary`. Must be a pure function of its input.
pub trait Predictor: Send + Sync {
    fn predict(&self, records: &[Value]) -> Result<Value, PredictError>;
}

/// Statistical FTQ estimate over rework records.
///
/// A record counts as successful when its `Success` field is `true` or a
/// non-zero number. When no record carries `Success`, success means "rework
/// time below the median rework time". With neither field present the
/// current FTQ falls back to [`BASELINE_FTQ`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StatisticalPredictor;

const MODEL_NAME: &str = "Statistical Model";
const CONFIDENCE: f64 = 0.75;

/// Current FTQ assumed when records carry no outcome at all
const BASELINE_FTQ: f64 = 92.5;

/// Average rework time reported when no record has `Rework_time`
const DEFAULT_REWORK_TIME: f64 = 45.0;

/// A line needs this many outcomes before it is ranked
const MIN_LINE_SAMPLES: usize = 2;

impl Predictor for StatisticalPredictor {
    fn predict(&self, records: &[Value]) -> Result<Value, PredictError> {
        if records.is_empty() {
            return Err(PredictError::NoRecords);
        }

        let current = round1(current_ftq(records));
        let predicted = predicted_ftq(current);

        Ok(json!({
            "current_ftq": current,
            "predicted_ftq": predicted,
            "confidence": CONFIDENCE,
            "total_defects": records.len(),
            "avg_rework_time": avg_rework_time(records),
            "improvement": round1(predicted - current),
            "line_analysis": line_analysis(records),
            "model_info": {
                "algorithm": MODEL_NAME,
                "n_estimators": 0,
                "max_depth": 0,
                "features_used": 0,
            },
        }))
    }
}

/// Fixed uplift per FTQ tier, capped so the estimate never claims perfection.
fn predicted_ftq(current: f64) -> f64 {
    let (uplift, cap) = if current >= 95.0 {
        (1.0, 99.0)
    } else if current >= 90.0 {
        (3.5, 97.0)
    } else {
        (5.5, 95.0)
    };
    round1((current + uplift).min(cap).max(current))
}

/// Percentage of successful records over all records.
fn current_ftq(records: &[Value]) -> f64 {
    let total = records.len() as f64;

    if records.iter().any(|r| r.get("Success").is_some()) {
        let passed = records.iter().filter(|r| success(r) == Some(true)).count();
        return passed as f64 / total * 100.0;
    }

    match median_rework_time(records) {
        Some(median) => {
            let quick = records
                .iter()
                .filter_map(rework_time)
                .filter(|t| *t < median)
                .count();
            quick as f64 / total * 100.0
        }
        None => BASELINE_FTQ,
    }
}

fn success(record: &Value) -> Option<bool> {
    match record.get("Success")? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}

fn rework_time(record: &Value) -> Option<f64> {
    record.get("Rework_time").and_then(Value::as_f64)
}

fn median_rework_time(records: &[Value]) -> Option<f64> {
    let mut times: Vec<f64> = records.iter().filter_map(rework_time).collect();
    if times.is_empty() {
        return None;
    }
    times.sort_by(f64::total_cmp);
    let mid = times.len() / 2;
    Some(if times.len() % 2 == 0 {
        (times[mid - 1] + times[mid]) / 2.0
    } else {
        times[mid]
    })
}

fn avg_rework_time(records: &[Value]) -> f64 {
    let times: Vec<f64> = records.iter().filter_map(rework_time).collect();
    if times.is_empty() {
        return DEFAULT_REWORK_TIME;
    }
    round1(times.iter().sum::<f64>() / times.len() as f64)
}

/// Per-line success tally, keyed by `(Area, Line)`.
#[derive(Default)]
struct LineStats {
    passed: usize,
    total: usize,
}

impl LineStats {
    fn rate(&self) -> f64 {
        self.passed as f64 / self.total as f64
    }
}

/// Best and worst line per area, as `"<Area> <Line>"` labels.
///
/// Only `Motor` and `Interior` are ranked. An area without a line that has
/// enough samples gets a fixed default pair.
fn line_analysis(records: &[Value]) -> Value {
    let mut stats: BTreeMap<(&str, &str), LineStats> = BTreeMap::new();

    for record in records {
        let (Some(area), Some(line), Some(ok)) = (
            record.get("Area").and_then(Value::as_str),
            record.get("Line").and_then(Value::as_str),
            success(record),
        ) else {
            continue;
        };
        let entry = stats.entry((area, line)).or_default();
        entry.passed += usize::from(ok);
        entry.total += 1;
    }
    stats.retain(|_, s| s.total >= MIN_LINE_SAMPLES);

    if stats.is_empty() {
        return json!({
            "best_motor_line": "Motor Line 1",
            "worst_motor_line": "Motor Line 2",
            "best_interior_line": "Interior Line 2",
            "worst_interior_line": "Interior Line 3",
        });
    }

    let (best_motor, worst_motor) = rank_area(&stats, "Motor").unwrap_or(("Line 1", "Line 2"));
    let (best_interior, worst_interior) =
        rank_area(&stats, "Interior").unwrap_or(("Line 1", "Line 3"));

    json!({
        "best_motor_line": format!("Motor {best_motor}"),
        "worst_motor_line": format!("Motor {worst_motor}"),
        "best_interior_line": format!("Interior {best_interior}"),
        "worst_interior_line": format!("Interior {worst_interior}"),
    })
}

/// Highest and lowest success rate in one area. Ties go to the line that
/// sorts first.
fn rank_area<'a>(
    stats: &BTreeMap<(&'a str, &'a str), LineStats>,
    area: &str,
) -> Option<(&'a str, &'a str)> {
    let mut lines = stats.iter().filter(|((a, _), _)| *a == area);
    let (&(_, first), first_stats) = lines.next()?;
    let (mut best, mut worst) = ((first, first_stats.rate()), (first, first_stats.rate()));

    for (&(_, line), s) in lines {
        let rate = s.rate();
        if rate > best.1 {
            best = (line, rate);
        }
        if rate < worst.1 {
            worst = (line, rate);
        }
    }
    Some((best.0, worst.0))
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
