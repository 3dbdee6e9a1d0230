//! Waveform preamble parsing and sample scaling.
//!
//! The preamble (`WFMOUTPRE?`) describes how to interpret the binary block a
//! subsequent `CURVE?` returns. It is fetched per capture and passed
//! explicitly into the decode step; caching one across a configuration
//! change is how silent data corruption happens, so nothing here retains it.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::ScopeError;
use crate::scpi::response::{parse_f64, parse_i64, split_fields, unquote};
use crate::types::{BinaryFormat, ByteOrder};

/// Curve transfer encoding reported by the preamble (`ENCDG`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Binary,
    Ascii,
}

/// Parsed `WFMOUTPRE?` record: the fifteen positional fields describing the
/// next binary block and its scaling coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformPreamble {
    /// Bytes per sample point (`BYT_NR`), 1 or 2
    pub byte_width: u8,
    /// Bits per sample point (`BIT_NR`)
    pub bit_width: u8,
    /// Curve encoding (`ENCDG`)
    pub encoding: Encoding,
    /// Signed/unsigned integer format (`BN_FMT`)
    pub format: BinaryFormat,
    /// Sample byte order (`BYT_OR`)
    pub order: ByteOrder,
    /// Number of points in the record (`NR_PT`)
    pub point_count: usize,
    /// Human-readable description of the source (`WFID`)
    pub waveform_id: String,
    /// Horizontal unit (`XUNIT`)
    pub x_unit: String,
    /// Seconds per point (`XINCR`)
    pub x_increment: f64,
    /// Time of the reference point (`XZERO`)
    pub x_zero: f64,
    /// Index of the time reference point (`PT_OFF`)
    pub x_reference: f64,
    /// Vertical unit (`YUNIT`)
    pub y_unit: String,
    /// Volts per raw code step (`YMULT`)
    pub y_multiplier: f64,
    /// Vertical offset applied after scaling (`YZERO`)
    pub y_offset: f64,
    /// Raw code of the vertical reference level (`YOFF`)
    pub y_reference: f64,
}

const PREAMBLE_FIELDS: usize = 15;

fn malformed(what: &str, field: &str) -> ScopeError {
    ScopeError::MalformedPreamble(format!("{what}: {field:?}"))
}

fn pre_f64(field: &str, what: &str) -> Result<f64, ScopeError> {
    parse_f64(field).map_err(|_| malformed(what, field))
}

fn pre_i64(field: &str, what: &str) -> Result<i64, ScopeError> {
    parse_i64(field).map_err(|_| malformed(what, field))
}

impl WaveformPreamble {
    /// Parse the fixed positional preamble record.
    pub fn parse(response: &str) -> Result<Self, ScopeError> {
        let fields = split_fields(response);
        if fields.len() != PREAMBLE_FIELDS {
            return Err(ScopeError::MalformedPreamble(format!(
                "expected {PREAMBLE_FIELDS} fields, got {}",
                fields.len()
            )));
        }

        let byte_width = pre_i64(&fields[0], "byte width")?;
        if byte_width != 1 && byte_width != 2 {
            return Err(malformed("byte width must be 1 or 2", &fields[0]));
        }
        let bit_width = pre_i64(&fields[1], "bit width")?;
        let encoding = match fields[2].to_ascii_uppercase().as_str() {
            "BIN" | "BINARY" => Encoding::Binary,
            "ASC" | "ASCII" => Encoding::Ascii,
            _ => return Err(malformed("unknown encoding", &fields[2])),
        };
        let format =
            BinaryFormat::from_response(&fields[3]).map_err(|_| malformed("format", &fields[3]))?;
        let order =
            ByteOrder::from_response(&fields[4]).map_err(|_| malformed("byte order", &fields[4]))?;
        let point_count = pre_i64(&fields[5], "point count")?;
        if point_count < 0 {
            return Err(malformed("negative point count", &fields[5]));
        }

        Ok(Self {
            byte_width: byte_width as u8,
            bit_width: bit_width as u8,
            encoding,
            format,
            order,
            point_count: point_count as usize,
            waveform_id: unquote(&fields[6]),
            x_unit: unquote(&fields[7]),
            x_increment: pre_f64(&fields[8], "x increment")?,
            x_zero: pre_f64(&fields[9], "x zero")?,
            x_reference: pre_f64(&fields[10], "x reference")?,
            y_unit: unquote(&fields[11]),
            y_multiplier: pre_f64(&fields[12], "y multiplier")?,
            y_offset: pre_f64(&fields[13], "y offset")?,
            y_reference: pre_f64(&fields[14], "y reference")?,
        })
    }

    /// Decode a curve payload into raw sample codes using this preamble's
    /// width, signedness and byte order. The payload must cover exactly
    /// `point_count` samples.
    pub fn decode_codes(&self, payload: &[u8]) -> Result<Vec<f64>, ScopeError> {
        let expected = self.point_count * self.byte_width as usize;
        if payload.len() != expected {
            return Err(ScopeError::ProtocolFraming(format!(
                "curve payload is {} bytes but preamble declares {} points of {} byte(s)",
                payload.len(),
                self.point_count,
                self.byte_width
            )));
        }

        let mut rdr = Cursor::new(payload);
        let mut codes = Vec::with_capacity(self.point_count);
        for _ in 0..self.point_count {
            let code = match (self.byte_width, self.format, self.order) {
                (1, BinaryFormat::Signed, _) => rdr.read_i8()? as f64,
                (1, BinaryFormat::Unsigned, _) => rdr.read_u8()? as f64,
                (2, BinaryFormat::Signed, ByteOrder::MsbFirst) => {
                    rdr.read_i16::<BigEndian>()? as f64
                }
                (2, BinaryFormat::Signed, ByteOrder::LsbFirst) => {
                    rdr.read_i16::<LittleEndian>()? as f64
                }
                (2, BinaryFormat::Unsigned, ByteOrder::MsbFirst) => {
                    rdr.read_u16::<BigEndian>()? as f64
                }
                (2, BinaryFormat::Unsigned, ByteOrder::LsbFirst) => {
                    rdr.read_u16::<LittleEndian>()? as f64
                }
                (w, _, _) => {
                    return Err(ScopeError::MalformedPreamble(format!(
                        "unsupported byte width {w}"
                    )));
                }
            };
            codes.push(code);
        }
        Ok(codes)
    }

    /// Scale raw codes into physical samples:
    /// `volts = (code - y_reference) * y_multiplier + y_offset`,
    /// `time  = x_zero + (index - x_reference) * x_increment`.
    pub fn scale(&self, codes: &[f64], source_id: impl Into<String>) -> Waveform {
        let times = (0..codes.len())
            .map(|i| self.x_zero + (i as f64 - self.x_reference) * self.x_increment)
            .collect();
        let values = codes
            .iter()
            .map(|c| (c - self.y_reference) * self.y_multiplier + self.y_offset)
            .collect();
        Waveform {
            source_id: source_id.into(),
            waveform_id: self.waveform_id.clone(),
            x_unit: self.x_unit.clone(),
            y_unit: self.y_unit.clone(),
            times,
            values,
        }
    }
}

/// A decoded, scaled acquisition: parallel time and value vectors of equal
/// length. Derived entirely from one (preamble, block) pair; re-fetching both
/// is the only way to recompute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    /// Source mnemonic the fetch targeted (CH1, MATH, ...)
    pub source_id: String,
    /// Instrument's own description of the record
    pub waveform_id: String,
    pub x_unit: String,
    pub y_unit: String,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Waveform {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate (time, value) pairs.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &str = "2,16,BIN,RI,MSB,1250,\"Ch1, DC coupling, 100.0mV/div, 4.000us/div, 1250 points, Sample mode\",\"s\",4.0E-9,-2.5E-6,625,\"V\",4.0E-2,0.0E+0,0.0E+0";

    #[test]
    fn parses_full_preamble() {
        let pre = WaveformPreamble::parse(PREAMBLE).unwrap();
        assert_eq!(pre.byte_width, 2);
        assert_eq!(pre.bit_width, 16);
        assert_eq!(pre.encoding, Encoding::Binary);
        assert_eq!(pre.format, BinaryFormat::Signed);
        assert_eq!(pre.order, ByteOrder::MsbFirst);
        assert_eq!(pre.point_count, 1250);
        assert!(pre.waveform_id.starts_with("Ch1, DC coupling"));
        assert_eq!(pre.x_unit, "s");
        assert_eq!(pre.x_increment, 4.0e-9);
        assert_eq!(pre.x_reference, 625.0);
        assert_eq!(pre.y_multiplier, 0.04);
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let err = WaveformPreamble::parse("1,8,BIN,RI,MSB").unwrap_err();
        assert!(matches!(err, ScopeError::MalformedPreamble(_)));
    }

    #[test]
    fn unparsable_field_is_malformed() {
        let garbled = PREAMBLE.replace("4.0E-9", "fast");
        let err = WaveformPreamble::parse(&garbled).unwrap_err();
        assert!(matches!(err, ScopeError::MalformedPreamble(_)));
    }

    #[test]
    fn bad_byte_width_is_malformed() {
        let garbled = PREAMBLE.replacen('2', "4", 1);
        let err = WaveformPreamble::parse(&garbled).unwrap_err();
        assert!(matches!(err, ScopeError::MalformedPreamble(_)));
    }

    fn preamble(byte_width: u8, format: BinaryFormat, order: ByteOrder) -> WaveformPreamble {
        WaveformPreamble {
            byte_width,
            bit_width: byte_width * 8,
            encoding: Encoding::Binary,
            format,
            order,
            point_count: 0,
            waveform_id: String::new(),
            x_unit: "s".into(),
            x_increment: 1.0,
            x_zero: 0.0,
            x_reference: 0.0,
            y_unit: "V".into(),
            y_multiplier: 1.0,
            y_offset: 0.0,
            y_reference: 0.0,
        }
    }

    #[test]
    fn decodes_one_byte_signed_codes() {
        let mut pre = preamble(1, BinaryFormat::Signed, ByteOrder::MsbFirst);
        pre.point_count = 3;
        let codes = pre.decode_codes(&[0x00, 0x7f, 0x80]).unwrap();
        assert_eq!(codes, vec![0.0, 127.0, -128.0]);
    }

    #[test]
    fn decodes_two_byte_codes_in_both_orders() {
        let mut pre = preamble(2, BinaryFormat::Signed, ByteOrder::MsbFirst);
        pre.point_count = 2;
        let codes = pre.decode_codes(&[0x01, 0x00, 0xff, 0xff]).unwrap();
        assert_eq!(codes, vec![256.0, -1.0]);

        let mut pre = preamble(2, BinaryFormat::Unsigned, ByteOrder::LsbFirst);
        pre.point_count = 2;
        let codes = pre.decode_codes(&[0x01, 0x00, 0xff, 0xff]).unwrap();
        assert_eq!(codes, vec![1.0, 65535.0]);
    }

    #[test]
    fn payload_point_count_mismatch_is_framing_error() {
        let mut pre = preamble(2, BinaryFormat::Signed, ByteOrder::MsbFirst);
        pre.point_count = 3;
        let err = pre.decode_codes(&[0x00, 0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, ScopeError::ProtocolFraming(_)));
    }

    #[test]
    fn scaling_matches_known_fixture() {
        // ymult 0.04 V/code, no offsets: raw code 25 is exactly 1.0 V
        let mut pre = preamble(1, BinaryFormat::Signed, ByteOrder::MsbFirst);
        pre.point_count = 1;
        pre.y_multiplier = 0.04;
        let wf = pre.scale(&[25.0], "CH1");
        assert!((wf.values[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn scaling_applies_references_and_offsets() {
        let mut pre = preamble(2, BinaryFormat::Signed, ByteOrder::MsbFirst);
        pre.point_count = 2;
        pre.y_multiplier = 0.5;
        pre.y_reference = 10.0;
        pre.y_offset = 1.0;
        pre.x_increment = 0.25;
        pre.x_reference = 1.0;
        pre.x_zero = 100.0;
        let wf = pre.scale(&[10.0, 14.0], "CH2");
        assert_eq!(wf.values, vec![1.0, 3.0]);
        assert_eq!(wf.times, vec![99.75, 100.0]);
        assert_eq!(wf.len(), 2);
        let pairs: Vec<_> = wf.samples().collect();
        assert_eq!(pairs[1], (100.0, 3.0));
    }
}
