pub mod client;
pub mod config;
pub mod encode;
pub mod normalize;
pub mod poller;
pub mod query;

pub use metric::{Point, RawSample, Sample, SampleValue};
pub use normalize::{normalize, normalize_raw, NormalizeError};

mod metric;
