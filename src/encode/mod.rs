use crate::metric::Point;
use std::io::{BufRead, Result, Write};

mod csv;

pub use self::csv::{CsvDecoder, CsvEncoder};

pub trait Encoder {
    fn encode_point(&mut self, point: &Point) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

pub trait Decoder {
    // None once the input is exhausted.
    fn decode_point(&mut self) -> Result<Option<Point>>;
}

/// Writes points as `timestamp,value` lines. Absent points have an empty
/// value field.
pub fn write_points<W: Write>(writable: W, points: &[Point]) -> Result<()> {
    let mut encoder = CsvEncoder::new(writable);
    for point in points {
        encoder.encode_point(point)?;
    }
    encoder.flush()
}

pub fn read_points<R: BufRead>(readable: R) -> Result<Vec<Point>> {
    let mut decoder = CsvDecoder::new(readable);
    let mut points = vec![];
    while let Some(point) = decoder.decode_point()? {
        points.push(point);
    }
    Ok(points)
}
