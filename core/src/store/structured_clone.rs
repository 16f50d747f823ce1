//! Reader for SpiderMonkey's structured clone serialization, the format
//! IndexedDB uses for stored values (after snappy decompression).
//!
//! The buffer is a stream of little-endian 64-bit words. A word whose upper
//! half is a known tag is a `(tag, data)` pair; anything at or below
//! `FLOAT_MAX` is a raw IEEE-754 double.

use std::rc::Rc;

use chrono::{DateTime, SecondsFormat};
use thiserror::Error;

use crate::{
  models::{Node, Scalar, Sequence},
  view::MemoryMapping,
};

const FLOAT_MAX: u32 = 0xFFF0_0000;
const HEADER: u32 = 0xFFF1_0000;
const NULL: u32 = 0xFFFF_0000;
const UNDEFINED: u32 = 0xFFFF_0001;
const BOOLEAN: u32 = 0xFFFF_0002;
const INT32: u32 = 0xFFFF_0003;
const STRING: u32 = 0xFFFF_0004;
const DATE_OBJECT: u32 = 0xFFFF_0005;
const REGEXP_OBJECT: u32 = 0xFFFF_0006;
const ARRAY_OBJECT: u32 = 0xFFFF_0007;
const OBJECT_OBJECT: u32 = 0xFFFF_0008;
const ARRAY_BUFFER_OBJECT_V2: u32 = 0xFFFF_0009;
const BOOLEAN_OBJECT: u32 = 0xFFFF_000A;
const STRING_OBJECT: u32 = 0xFFFF_000B;
const NUMBER_OBJECT: u32 = 0xFFFF_000C;
const BACK_REFERENCE_OBJECT: u32 = 0xFFFF_000D;
const MAP_OBJECT: u32 = 0xFFFF_0011;
const SET_OBJECT: u32 = 0xFFFF_0012;
const END_OF_KEYS: u32 = 0xFFFF_0013;
const BIGINT: u32 = 0xFFFF_001D;
const BIGINT_OBJECT: u32 = 0xFFFF_001E;
const ARRAY_BUFFER_OBJECT: u32 = 0xFFFF_001F;
const TYPED_ARRAY_OBJECT: u32 = 0xFFFF_0020;
const TRANSFER_MAP_HEADER: u32 = 0xFFFF_0200;

const LATIN1_FLAG: u32 = 0x8000_0000;
const MAX_NESTING: usize = 1000;
/// Arrays are decoded densely, so the declared length bounds the allocation.
const MAX_ARRAY_LENGTH: u32 = 1 << 22;

/// Element sizes indexed by SpiderMonkey's scalar type id.
const TYPED_ARRAY_ELEMENT_SIZES: [u64; 12] = [1, 1, 2, 2, 4, 4, 4, 8, 1, 8, 8, 2];

#[derive(Debug, Error)]
pub enum CloneError {
  #[error("unexpected end of data at byte {0}")]
  Truncated(usize),
  #[error("unknown tag 0x{0:08x}")]
  UnknownTag(u32),
  #[error("unsupported value: {0}")]
  Unsupported(&'static str),
  #[error("invalid data: {0}")]
  Invalid(String),
}

/// Decode one structured clone buffer into a node tree.
pub fn read_structured_clone(bytes: &[u8]) -> Result<Node, CloneError> {
  let mut reader = CloneReader {
    buf: bytes,
    pos: 0,
    all_objs: Vec::new(),
  };
  let (tag, _) = reader.peek_pair()?;
  if tag == HEADER {
    reader.read_pair()?;
  }
  reader.read_value(0)
}

struct CloneReader<'a> {
  buf: &'a [u8],
  pos: usize,
  /// Every object-like value in the order it was started, for back references.
  all_objs: Vec<Node>,
}

impl<'a> CloneReader<'a> {
  fn read_u64(&mut self) -> Result<u64, CloneError> {
    let end = self.pos + 8;
    let word = self
      .buf
      .get(self.pos..end)
      .ok_or(CloneError::Truncated(self.pos))?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(word);
    self.pos = end;
    Ok(u64::from_le_bytes(raw))
  }

  fn peek_pair(&self) -> Result<(u32, u32), CloneError> {
    let mut probe = CloneReader {
      buf: self.buf,
      pos: self.pos,
      all_objs: Vec::new(),
    };
    probe.read_pair()
  }

  fn read_pair(&mut self) -> Result<(u32, u32), CloneError> {
    let word = self.read_u64()?;
    Ok(((word >> 32) as u32, word as u32))
  }

  fn read_f64(&mut self) -> Result<f64, CloneError> {
    Ok(f64::from_bits(self.read_u64()?))
  }

  fn read_bytes(&mut self, len: u64) -> Result<Vec<u8>, CloneError> {
    let remaining = (self.buf.len() - self.pos) as u64;
    if len > remaining {
      return Err(CloneError::Truncated(self.buf.len()));
    }
    let len = len as usize;
    let out = self.buf[self.pos..self.pos + len].to_vec();
    self.pos += len;
    self.align();
    Ok(out)
  }

  fn align(&mut self) {
    let rem = self.pos % 8;
    if rem != 0 {
      self.pos = (self.pos + 8 - rem).min(self.buf.len());
    }
  }

  fn read_string(&mut self, data: u32) -> Result<String, CloneError> {
    let len = u64::from(data & !LATIN1_FLAG);
    if data & LATIN1_FLAG != 0 {
      let bytes = self.read_bytes(len)?;
      return Ok(bytes.into_iter().map(char::from).collect());
    }
    let bytes = self.read_bytes(len * 2)?;
    let units: Vec<u16> = bytes
      .chunks_exact(2)
      .map(|c| u16::from_le_bytes([c[0], c[1]]))
      .collect();
    Ok(String::from_utf16_lossy(&units))
  }

  fn register(&mut self, node: Node) -> Node {
    self.all_objs.push(node.clone());
    node
  }

  fn read_value(&mut self, depth: usize) -> Result<Node, CloneError> {
    let (tag, data) = self.read_pair()?;
    self.value_for(tag, data, depth)
  }

  fn value_for(&mut self, tag: u32, data: u32, depth: usize) -> Result<Node, CloneError> {
    if depth > MAX_NESTING {
      return Err(CloneError::Invalid(format!("nesting deeper than {MAX_NESTING}")));
    }
    if tag <= FLOAT_MAX {
      let bits = (u64::from(tag) << 32) | u64::from(data);
      return Ok(Node::Scalar(Scalar::Float(f64::from_bits(bits))));
    }
    let node = match tag {
      NULL | UNDEFINED => Node::null(),
      BOOLEAN => Node::Scalar(Scalar::Bool(data != 0)),
      INT32 => Node::Scalar(Scalar::Int(i64::from(data as i32))),
      STRING => Node::text(self.read_string(data)?),
      DATE_OBJECT => {
        let ms = self.read_f64()?;
        self.register(date_node(ms))
      }
      REGEXP_OBJECT => {
        let (str_tag, str_data) = self.read_pair()?;
        if str_tag != STRING {
          return Err(CloneError::Invalid("regexp source is not a string".into()));
        }
        let source = self.read_string(str_data)?;
        self.register(Node::text(format!("/{}/{}", source, regexp_flags(data))))
      }
      BOOLEAN_OBJECT => self.register(Node::Scalar(Scalar::Bool(data != 0))),
      STRING_OBJECT => {
        let s = self.read_string(data)?;
        self.register(Node::text(s))
      }
      NUMBER_OBJECT => {
        let f = self.read_f64()?;
        self.register(Node::Scalar(Scalar::Float(f)))
      }
      ARRAY_OBJECT => self.read_array(data, depth)?,
      OBJECT_OBJECT => self.read_object(depth)?,
      MAP_OBJECT => self.read_map(depth)?,
      SET_OBJECT => self.read_set(depth)?,
      BACK_REFERENCE_OBJECT => self
        .all_objs
        .get(data as usize)
        .cloned()
        .ok_or_else(|| CloneError::Invalid(format!("dangling back reference {data}")))?,
      ARRAY_BUFFER_OBJECT_V2 => {
        let bytes = self.read_bytes(u64::from(data))?;
        self.register(Node::Scalar(Scalar::Bytes(bytes)))
      }
      ARRAY_BUFFER_OBJECT => {
        let len = self.read_u64()?;
        let bytes = self.read_bytes(len)?;
        self.register(Node::Scalar(Scalar::Bytes(bytes)))
      }
      TYPED_ARRAY_OBJECT => self.read_typed_array(data, depth)?,
      BIGINT | BIGINT_OBJECT => return Err(CloneError::Unsupported("BigInt")),
      TRANSFER_MAP_HEADER => return Err(CloneError::Unsupported("transfer map")),
      other => return Err(CloneError::UnknownTag(other)),
    };
    Ok(node)
  }

  fn read_array(&mut self, length: u32, depth: usize) -> Result<Node, CloneError> {
    if length > MAX_ARRAY_LENGTH {
      return Err(CloneError::Unsupported("array longer than the decode limit"));
    }
    let seq = Rc::new(Sequence::new("Array", vec![Node::null(); length as usize]));
    self.register(Node::Sequence(seq.clone()));
    loop {
      let (tag, data) = self.read_pair()?;
      let index = match tag {
        END_OF_KEYS => break,
        INT32 => Some(data),
        STRING => {
          let key = self.read_string(data)?;
          key.parse::<u32>().ok().filter(|i| i.to_string() == key)
        }
        _ => return Err(CloneError::Invalid(format!("bad array key tag 0x{tag:08x}"))),
      };
      let value = self.read_value(depth + 1)?;
      // Anything that is not an index below the length is a plain property.
      if let Some(i) = index.filter(|i| *i < length) {
        seq.set(i as usize, value);
      }
    }
    Ok(Node::Sequence(seq))
  }

  fn read_object(&mut self, depth: usize) -> Result<Node, CloneError> {
    let map = Rc::new(MemoryMapping::new("Object"));
    self.register(Node::Mapping(map.clone()));
    loop {
      let (tag, data) = self.read_pair()?;
      let key = match tag {
        END_OF_KEYS => break,
        INT32 => (data as i32).to_string(),
        STRING => self.read_string(data)?,
        _ => return Err(CloneError::Invalid(format!("bad object key tag 0x{tag:08x}"))),
      };
      let value = self.read_value(depth + 1)?;
      map.insert(Scalar::Text(key), value);
    }
    Ok(Node::Mapping(map))
  }

  fn read_map(&mut self, depth: usize) -> Result<Node, CloneError> {
    let map = Rc::new(MemoryMapping::new("Map"));
    self.register(Node::Mapping(map.clone()));
    loop {
      let (tag, data) = self.read_pair()?;
      if tag == END_OF_KEYS {
        break;
      }
      let key = match self.value_for(tag, data, depth + 1)? {
        Node::Scalar(s) => s,
        _ => return Err(CloneError::Unsupported("Map with object keys")),
      };
      let value = self.read_value(depth + 1)?;
      map.insert(key, value);
    }
    Ok(Node::Mapping(map))
  }

  fn read_set(&mut self, depth: usize) -> Result<Node, CloneError> {
    let seq = Rc::new(Sequence::new("Set", Vec::new()));
    self.register(Node::Sequence(seq.clone()));
    loop {
      let (tag, data) = self.read_pair()?;
      if tag == END_OF_KEYS {
        break;
      }
      let value = self.value_for(tag, data, depth + 1)?;
      seq.push(value);
    }
    Ok(Node::Sequence(seq))
  }

  fn read_typed_array(&mut self, array_type: u32, depth: usize) -> Result<Node, CloneError> {
    let elem_size = TYPED_ARRAY_ELEMENT_SIZES
      .get(array_type as usize)
      .copied()
      .ok_or_else(|| CloneError::Invalid(format!("unknown typed array type {array_type}")))?;
    let nelems = self.read_u64()?;
    // The typed array is numbered before its buffer.
    let slot = self.all_objs.len();
    self.all_objs.push(Node::null());
    let buffer = match self.read_value(depth + 1)? {
      Node::Scalar(Scalar::Bytes(b)) => b,
      _ => return Err(CloneError::Invalid("typed array without buffer".into())),
    };
    let offset = self.read_u64()?;
    let len = nelems.saturating_mul(elem_size);
    let end = offset.saturating_add(len);
    if end > buffer.len() as u64 {
      return Err(CloneError::Invalid(format!(
        "typed array range {offset}..{end} beyond buffer of {} bytes",
        buffer.len()
      )));
    }
    let node = Node::Scalar(Scalar::Bytes(buffer[offset as usize..end as usize].to_vec()));
    self.all_objs[slot] = node.clone();
    Ok(node)
  }
}

fn date_node(ms: f64) -> Node {
  if !ms.is_finite() {
    return Node::null();
  }
  match DateTime::from_timestamp_millis(ms as i64) {
    Some(dt) => Node::text(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
    None => Node::Scalar(Scalar::Float(ms)),
  }
}

fn regexp_flags(flags: u32) -> String {
  const FLAGS: [(u32, char); 8] = [
    (0x40, 'd'),
    (0x02, 'g'),
    (0x01, 'i'),
    (0x04, 'm'),
    (0x20, 's'),
    (0x10, 'u'),
    (0x80, 'v'),
    (0x08, 'y'),
  ];
  FLAGS
    .iter()
    .filter(|(bit, _)| flags & bit != 0)
    .map(|(_, c)| *c)
    .collect()
}
