use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

// A normalized point. `value` is None where no sample exists for the
// timestamp, which charts render as a gap rather than a zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(rename = "t")]
    pub timestamp: i64,
    #[serde(rename = "y")]
    pub value: Option<f64>,
}

impl Point {
    pub fn present(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            value: Some(value),
        }
    }

    pub fn absent(timestamp: i64) -> Self {
        Self {
            timestamp,
            value: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Sample value as it appears on the wire. Prometheus sends values as
/// strings so that NaN and infinities survive JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    pub fn parse(&self) -> Option<f64> {
        match self {
            SampleValue::Number(n) => Some(*n),
            SampleValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for SampleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleValue::Number(n) => write!(f, "{}", n),
            SampleValue::Text(s) => f.write_str(s),
        }
    }
}

/// `[<unix seconds>, "<value>"]` pair from a query result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample(pub f64, pub SampleValue);

// 2^63, the first float past i64::MAX.
const TIMESTAMP_LIMIT: f64 = 9_223_372_036_854_775_808.0;

impl RawSample {
    // Fractional timestamps round down to whole seconds. None when the
    // timestamp isn't finite or doesn't fit in an i64.
    pub fn timestamp(&self) -> Option<i64> {
        let seconds = self.0.floor();
        if seconds.is_finite() && seconds >= -TIMESTAMP_LIMIT && seconds < TIMESTAMP_LIMIT {
            Some(seconds as i64)
        } else {
            None
        }
    }

    pub fn value(&self) -> &SampleValue {
        &self.1
    }
}

#[cfg(test)]
pub mod tests {
    use super::{Point, RawSample, SampleValue};

    #[test]
    fn test_raw_sample_from_prometheus_pair() {
        let sample: RawSample = serde_json::from_str(r#"[1435781430.781, "1.5"]"#).unwrap();
        assert_eq!(sample.timestamp(), Some(1435781430));
        assert_eq!(sample.value().parse(), Some(1.5));
    }

    #[test]
    fn test_sample_value_numeric() {
        let sample: RawSample = serde_json::from_str("[60, 2]").unwrap();
        assert_eq!(sample.timestamp(), Some(60));
        assert_eq!(sample.value(), &SampleValue::Number(2.0));
    }

    #[test]
    fn test_raw_timestamp_out_of_range() {
        let value = SampleValue::Text("1".to_string());
        assert_eq!(RawSample(f64::NAN, value.clone()).timestamp(), None);
        assert_eq!(RawSample(f64::INFINITY, value.clone()).timestamp(), None);
        assert_eq!(RawSample(1e300, value.clone()).timestamp(), None);
        assert_eq!(RawSample(-1e300, value.clone()).timestamp(), None);
        assert_eq!(RawSample(-1.5, value).timestamp(), Some(-2));
    }

    #[test]
    fn test_sample_value_special_floats() {
        assert!(SampleValue::Text("NaN".to_string()).parse().unwrap().is_nan());
        assert_eq!(
            SampleValue::Text("+Inf".to_string()).parse(),
            Some(f64::INFINITY)
        );
        assert_eq!(SampleValue::Text("abc".to_string()).parse(), None);
    }

    #[test]
    fn test_point_serializes_absent_as_null() {
        let json = serde_json::to_string(&[Point::present(0, 1.0), Point::absent(60)]).unwrap();
        assert_eq!(json, r#"[{"t":0,"y":1.0},{"t":60,"y":null}]"#);
    }

    #[test]
    fn test_point_datetime() {
        let point = Point::absent(1600000000);
        assert_eq!(point.datetime().unwrap().timestamp(), 1600000000);
    }
}
