use crate::{
    encode::{Decoder, Encoder},
    metric::Point,
};
use std::io::{BufRead, BufWriter, Error, ErrorKind, Result, Write};

pub struct CsvEncoder<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> CsvEncoder<W> {
    pub fn new(writeable: W) -> Self {
        Self {
            writer: BufWriter::new(writeable),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write> Encoder for CsvEncoder<W> {
    fn encode_point(&mut self, point: &Point) -> Result<()> {
        match point.value {
            Some(value) => writeln!(self.writer, "{},{}", point.timestamp, value),
            None => writeln!(self.writer, "{},", point.timestamp),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }
}

pub struct CsvDecoder<R: BufRead> {
    reader: R,
}

impl<R: BufRead> CsvDecoder<R> {
    pub fn new(readable: R) -> Self {
        Self { reader: readable }
    }
}

impl<R: BufRead> Decoder for CsvDecoder<R> {
    fn decode_point(&mut self) -> Result<Option<Point>> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            if !buf.trim().is_empty() {
                break;
            }
        }

        let (ts, val) = buf.trim_end().split_once(',').ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidData,
                format!("expected timestamp,value: {:?}", buf.trim_end()),
            )
        })?;

        let timestamp: i64 = ts
            .parse()
            .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;
        let value = match val {
            "" => None,
            v => Some(
                v.parse::<f64>()
                    .map_err(|e| Error::new(ErrorKind::InvalidData, e))?,
            ),
        };

        Ok(Some(Point { timestamp, value }))
    }
}
