//! IndexedDB key encoding as stored in the `key` column of `object_data`.
//!
//! Layout per key: one type byte, then the payload. Numbers (and dates) are
//! 8 big-endian bytes of an order-preserving transform of the IEEE-754 bits;
//! strings and binaries are a variable-width code unit stream ending in a zero
//! terminator. Trailing zero bytes of the whole key are trimmed on disk.

use thiserror::Error;

use crate::models::Scalar;

const TYPE_TERMINATOR: u8 = 0x00;
const TYPE_FLOAT: u8 = 0x10;
const TYPE_DATE: u8 = 0x20;
const TYPE_STRING: u8 = 0x30;
const TYPE_BINARY: u8 = 0x40;
const TYPE_ARRAY: u8 = 0x50;

const ONE_BYTE_LIMIT: u32 = 0x7E;
const TWO_BYTE_LIMIT: u32 = 0x3FFF + 0x7F;
const ONE_BYTE_ADJUST: u32 = 1;
const TWO_BYTE_ADJUST: u32 = 0x7F;
const THREE_BYTE_SHIFT: u32 = 6;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyCodecError {
  #[error("empty key")]
  Empty,
  #[error("unsupported key type 0x{0:02x}")]
  Unsupported(u8),
  #[error("{0} keys are not supported")]
  UnsupportedKind(&'static str),
  #[error("cannot encode NaN")]
  NaN,
  #[error("trailing bytes after key")]
  Trailing,
  #[error("invalid UTF-16 in string key")]
  InvalidString,
}

pub fn encode_key(key: &Scalar) -> Result<Vec<u8>, KeyCodecError> {
  let mut buf = Vec::new();
  match key {
    Scalar::Int(n) => encode_number(&mut buf, *n as f64, TYPE_FLOAT)?,
    Scalar::Float(f) => encode_number(&mut buf, *f, TYPE_FLOAT)?,
    Scalar::Text(s) => {
      buf.push(TYPE_STRING);
      for unit in s.encode_utf16() {
        encode_unit(&mut buf, u32::from(unit));
      }
      buf.push(TYPE_TERMINATOR);
    }
    Scalar::Bytes(bytes) => {
      buf.push(TYPE_BINARY);
      for b in bytes {
        encode_unit(&mut buf, u32::from(*b));
      }
      buf.push(TYPE_TERMINATOR);
    }
    Scalar::Null => return Err(KeyCodecError::UnsupportedKind("null")),
    Scalar::Bool(_) => return Err(KeyCodecError::UnsupportedKind("boolean")),
  }
  while buf.len() > 1 && buf.last() == Some(&0) {
    buf.pop();
  }
  Ok(buf)
}

pub fn decode_key(bytes: &[u8]) -> Result<Scalar, KeyCodecError> {
  let (&ty, rest) = bytes.split_first().ok_or(KeyCodecError::Empty)?;
  let (key, used) = match ty {
    TYPE_FLOAT => {
      let f = decode_number(rest);
      (number_scalar(f), rest.len().min(8))
    }
    TYPE_STRING => {
      let (units, used) = decode_units(rest);
      let s = String::from_utf16(&units).map_err(|_| KeyCodecError::InvalidString)?;
      (Scalar::Text(s), used)
    }
    TYPE_BINARY => {
      let (units, used) = decode_units(rest);
      (Scalar::Bytes(units.into_iter().map(|u| u as u8).collect()), used)
    }
    TYPE_DATE => return Err(KeyCodecError::UnsupportedKind("date")),
    t if t >= TYPE_ARRAY => return Err(KeyCodecError::UnsupportedKind("array")),
    other => return Err(KeyCodecError::Unsupported(other)),
  };
  if rest[used..].iter().any(|b| *b != 0) {
    return Err(KeyCodecError::Trailing);
  }
  Ok(key)
}

fn number_scalar(f: f64) -> Scalar {
  if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 && !(f == 0.0 && f.is_sign_negative()) {
    Scalar::Int(f as i64)
  } else {
    Scalar::Float(f)
  }
}

fn encode_number(buf: &mut Vec<u8>, value: f64, ty: u8) -> Result<(), KeyCodecError> {
  if value.is_nan() {
    return Err(KeyCodecError::NaN);
  }
  buf.push(ty);
  let bits = value.to_bits();
  let ordered = if bits & SIGN_BIT != 0 {
    bits.wrapping_neg()
  } else {
    bits | SIGN_BIT
  };
  buf.extend_from_slice(&ordered.to_be_bytes());
  Ok(())
}

fn decode_number(rest: &[u8]) -> f64 {
  let mut raw = [0u8; 8];
  let n = rest.len().min(8);
  raw[..n].copy_from_slice(&rest[..n]);
  let ordered = u64::from_be_bytes(raw);
  let bits = if ordered & SIGN_BIT != 0 {
    ordered & !SIGN_BIT
  } else {
    ordered.wrapping_neg()
  };
  f64::from_bits(bits)
}

fn encode_unit(buf: &mut Vec<u8>, c: u32) {
  if c <= ONE_BYTE_LIMIT {
    buf.push((c + ONE_BYTE_ADJUST) as u8);
  } else if c <= TWO_BYTE_LIMIT {
    let c = c - TWO_BYTE_ADJUST + 0x8000;
    buf.push((c >> 8) as u8);
    buf.push(c as u8);
  } else {
    let c = (c << THREE_BYTE_SHIFT) | 0x00C0_0000;
    buf.push((c >> 16) as u8);
    buf.push((c >> 8) as u8);
    buf.push(c as u8);
  }
}

/// Returns the decoded code units and the number of bytes consumed,
/// including the terminator when present.
fn decode_units(rest: &[u8]) -> (Vec<u16>, usize) {
  let mut out = Vec::new();
  let mut i = 0;
  while i < rest.len() {
    let b = u32::from(rest[i]);
    if b == 0 {
      return (out, i + 1);
    }
    if b & 0x80 == 0 {
      out.push((b - ONE_BYTE_ADJUST) as u16);
      i += 1;
    } else if b & 0x40 == 0 {
      let lo = rest.get(i + 1).copied().map(u32::from).unwrap_or(0);
      let c = ((b << 8) | lo) - 0x8000 + TWO_BYTE_ADJUST;
      out.push(c as u16);
      i += 2;
    } else {
      let mut c = b << (16 - THREE_BYTE_SHIFT);
      if let Some(&b1) = rest.get(i + 1) {
        c |= u32::from(b1) << (8 - THREE_BYTE_SHIFT);
      }
      if let Some(&b2) = rest.get(i + 2) {
        c |= u32::from(b2) >> THREE_BYTE_SHIFT;
      }
      out.push((c & 0xFFFF) as u16);
      i += 3;
    }
  }
  (out, rest.len())
}
