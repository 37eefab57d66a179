//! Gap filling for chart time series.
//!
//! Range queries return only the samples that exist. Charts draw a line
//! straight across missing intervals unless they are told a point is
//! missing, so every step between two samples that is not covered gets an
//! explicit absent point.

use crate::metric::{Point, RawSample, Sample};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("step must be greater than zero")]
    InvalidStep,
    #[error("invalid sample value {value:?} at timestamp {timestamp}")]
    InvalidValue { timestamp: i64, value: String },
    #[error("invalid sample timestamp {0}")]
    InvalidTimestamp(f64),
}

/// Returns the samples as a dense series with a point every `step` seconds
/// between the first and last sample.
///
/// `samples` must be ordered by ascending timestamp. Gaps of at most
/// `step` are left alone.
pub fn normalize(samples: &[Sample], step: i64) -> Result<Vec<Point>, NormalizeError> {
    fill(
        samples.iter().map(|s| Ok((s.timestamp, s.value))),
        samples.len(),
        step,
    )
}

/// Same as [`normalize`] for samples whose values still need parsing.
pub fn normalize_raw(samples: &[RawSample], step: i64) -> Result<Vec<Point>, NormalizeError> {
    fill(samples.iter().map(parse_sample), samples.len(), step)
}

pub(crate) fn parse_sample(sample: &RawSample) -> Result<(i64, f64), NormalizeError> {
    let timestamp = sample
        .timestamp()
        .ok_or(NormalizeError::InvalidTimestamp(sample.0))?;
    let value = sample
        .value()
        .parse()
        .ok_or_else(|| NormalizeError::InvalidValue {
            timestamp,
            value: sample.value().to_string(),
        })?;
    Ok((timestamp, value))
}

/// Drops absent points, leaving the samples a series was built from.
pub fn present_samples(points: &[Point]) -> Vec<Sample> {
    points
        .iter()
        .filter_map(|p| {
            p.value.map(|value| Sample {
                timestamp: p.timestamp,
                value,
            })
        })
        .collect()
}

fn fill<I>(samples: I, len: usize, step: i64) -> Result<Vec<Point>, NormalizeError>
where
    I: Iterator<Item = Result<(i64, f64), NormalizeError>>,
{
    if step <= 0 {
        return Err(NormalizeError::InvalidStep);
    }

    let mut result = Vec::with_capacity(len);
    let mut last_timestamp: Option<i64> = None;
    for sample in samples {
        let (timestamp, value) = sample?;
        if let Some(last) = last_timestamp {
            // Filling stops if the next step would overflow.
            let mut next = last.checked_add(step);
            while let Some(span) = next.filter(|&span| span < timestamp) {
                result.push(Point::absent(span));
                next = span.checked_add(step);
            }
        }
        result.push(Point::present(timestamp, value));
        last_timestamp = Some(timestamp);
    }
    Ok(result)
}

#[cfg(test)]
pub mod tests {
    use crate::metric::{Point, RawSample, Sample, SampleValue};

    use super::{normalize, normalize_raw, present_samples, NormalizeError};

    fn samples(pairs: &[(i64, f64)]) -> Vec<Sample> {
        pairs
            .iter()
            .map(|&(timestamp, value)| Sample { timestamp, value })
            .collect()
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(&[], 60).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_single_sample() {
        for step in [1, 60, 3600] {
            assert_eq!(
                normalize(&samples(&[(0, 5.0)]), step).unwrap(),
                vec![Point::present(0, 5.0)]
            );
        }
    }

    #[test]
    fn test_normalize_fills_gap() {
        let result = normalize(&samples(&[(0, 1.0), (120, 2.0)]), 60).unwrap();
        assert_eq!(
            result,
            vec![
                Point::present(0, 1.0),
                Point::absent(60),
                Point::present(120, 2.0)
            ]
        );
    }

    #[test]
    fn test_normalize_gap_equal_to_step() {
        let result = normalize(&samples(&[(0, 1.0), (60, 2.0)]), 60).unwrap();
        assert_eq!(result, vec![Point::present(0, 1.0), Point::present(60, 2.0)]);
    }

    #[test]
    fn test_normalize_uniform_series_keeps_length() {
        let input: Vec<Sample> = (0..50)
            .map(|i| Sample {
                timestamp: 1600000000 + i * 10,
                value: i as f64,
            })
            .collect();
        let result = normalize(&input, 10).unwrap();
        assert_eq!(result.len(), input.len());
        assert!(result.iter().all(|p| !p.is_absent()));
    }

    #[test]
    fn test_normalize_long_gap() {
        let result = normalize(&samples(&[(0, 1.0), (300, 2.0), (360, 3.0)]), 60).unwrap();
        let timestamps: Vec<i64> = result.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![0, 60, 120, 180, 240, 300, 360]);
        assert_eq!(result.iter().filter(|p| p.is_absent()).count(), 4);
    }

    #[test]
    fn test_normalize_misaligned_gap() {
        // Absent points follow the previous sample, not the next one.
        let result = normalize(&samples(&[(0, 1.0), (150, 2.0)]), 60).unwrap();
        assert_eq!(
            result,
            vec![
                Point::present(0, 1.0),
                Point::absent(60),
                Point::absent(120),
                Point::present(150, 2.0)
            ]
        );
    }

    #[test]
    fn test_normalize_keeps_zero_values() {
        let result = normalize(&samples(&[(0, 0.0), (60, 0.0)]), 60).unwrap();
        assert_eq!(result, vec![Point::present(0, 0.0), Point::present(60, 0.0)]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let input = samples(&[(0, 1.0), (60, 2.0), (240, 3.0), (300, 4.0), (600, 5.0)]);
        let first = normalize(&input, 60).unwrap();
        let second = normalize(&present_samples(&first), 60).unwrap();
        assert_eq!(first, second);
        assert_eq!(present_samples(&first), input);
    }

    #[test]
    fn test_normalize_invalid_step() {
        assert_eq!(
            normalize(&samples(&[(0, 1.0)]), 0),
            Err(NormalizeError::InvalidStep)
        );
        assert_eq!(normalize(&[], -60), Err(NormalizeError::InvalidStep));
    }

    #[test]
    fn test_normalize_raw_parses_values() {
        let raw = vec![
            RawSample(0.0, SampleValue::Text("1.5".to_string())),
            RawSample(120.0, SampleValue::Number(2.0)),
        ];
        assert_eq!(
            normalize_raw(&raw, 60).unwrap(),
            vec![
                Point::present(0, 1.5),
                Point::absent(60),
                Point::present(120, 2.0)
            ]
        );
    }

    #[test]
    fn test_normalize_near_max_timestamp() {
        let result = normalize(&samples(&[(i64::MAX - 10, 1.0), (i64::MAX, 2.0)]), 60).unwrap();
        assert_eq!(
            result,
            vec![Point::present(i64::MAX - 10, 1.0), Point::present(i64::MAX, 2.0)]
        );

        let result = normalize(&samples(&[(i64::MAX - 130, 1.0), (i64::MAX, 2.0)]), 60).unwrap();
        assert_eq!(
            result,
            vec![
                Point::present(i64::MAX - 130, 1.0),
                Point::absent(i64::MAX - 70),
                Point::absent(i64::MAX - 10),
                Point::present(i64::MAX, 2.0)
            ]
        );
    }

    #[test]
    fn test_normalize_raw_invalid_timestamp() {
        let raw = vec![RawSample(f64::NAN, SampleValue::Text("1".to_string()))];
        assert!(matches!(
            normalize_raw(&raw, 60),
            Err(NormalizeError::InvalidTimestamp(t)) if t.is_nan()
        ));

        let raw = vec![
            RawSample(1e300, SampleValue::Text("1".to_string())),
            RawSample(1e300, SampleValue::Text("2".to_string())),
        ];
        assert_eq!(
            normalize_raw(&raw, 60),
            Err(NormalizeError::InvalidTimestamp(1e300))
        );
    }

    #[test]
    fn test_normalize_raw_invalid_value() {
        let raw = vec![
            RawSample(0.0, SampleValue::Text("1".to_string())),
            RawSample(60.0, SampleValue::Text("oops".to_string())),
        ];
        assert_eq!(
            normalize_raw(&raw, 60),
            Err(NormalizeError::InvalidValue {
                timestamp: 60,
                value: "oops".to_string()
            })
        );
    }
}
