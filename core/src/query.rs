use std::rc::Rc;

use thiserror::Error;

use crate::{
  models::{Node, Scalar, Sequence},
  store::StoreError,
};

#[derive(Debug, Error)]
pub enum QueryError {
  #[error("query syntax error at {pos}: {message}")]
  Syntax { pos: usize, message: String },
  #[error("query type error: {0}")]
  Type(String),
  #[error(transparent)]
  Access(#[from] StoreError),
}

/// Something that can select a subtree of a (lazy) node tree.
pub trait QueryEvaluator {
  fn evaluate(&self, query: &str, root: &Node) -> Result<Node, QueryError>;
}

/// One step of a path query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
  Key(String),
  Index(i64),
  /// Every value of a sequence or mapping.
  Iterate,
}

/// Path expressions: `.`, `.name`, `."quoted name"`, `[0]`, `[-1]`,
/// `["quoted"]`, `[]`, chained (`.tabs[].url`).
///
/// Missing keys and out-of-range indexes select `null`. Once a path fans out
/// through `[]`, the result is the list of everything selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathQuery;

impl PathQuery {
  pub fn parse(query: &str) -> Result<Vec<PathSegment>, QueryError> {
    Parser {
      src: query.trim(),
      pos: 0,
    }
    .parse()
  }
}

impl QueryEvaluator for PathQuery {
  fn evaluate(&self, query: &str, root: &Node) -> Result<Node, QueryError> {
    let segments = PathQuery::parse(query)?;
    let mut current = vec![root.clone()];
    let mut fanned_out = false;

    for seg in &segments {
      let mut next = Vec::with_capacity(current.len());
      for node in &current {
        match seg {
          PathSegment::Key(k) => next.push(select_key(node, k)?),
          PathSegment::Index(i) => next.push(select_index(node, *i)?),
          PathSegment::Iterate => {
            fanned_out = true;
            next.extend(iterate(node)?);
          }
        }
      }
      current = next;
    }

    if fanned_out {
      return Ok(Node::Sequence(Rc::new(Sequence::list(current))));
    }
    Ok(current.pop().unwrap_or_else(Node::null))
  }
}

fn lookup_or_null(node: &Node, key: &Scalar) -> Result<Node, QueryError> {
  let Node::Mapping(map) = node else {
    return Ok(Node::null());
  };
  match map.get(key) {
    Ok(v) => Ok(v),
    Err(e) if e.is_not_found() => Ok(Node::null()),
    Err(e) => Err(e.into()),
  }
}

fn select_key(node: &Node, key: &str) -> Result<Node, QueryError> {
  match node {
    Node::Mapping(_) | Node::Scalar(Scalar::Null) => {
      lookup_or_null(node, &Scalar::Text(key.to_string()))
    }
    other => Err(QueryError::Type(format!(
      "cannot index {} with {key:?}",
      other.type_name()
    ))),
  }
}

fn select_index(node: &Node, idx: i64) -> Result<Node, QueryError> {
  match node {
    Node::Sequence(seq) => {
      let len = seq.len() as i64;
      let resolved = if idx < 0 { len + idx } else { idx };
      if resolved < 0 {
        return Ok(Node::null());
      }
      Ok(seq.get(resolved as usize).unwrap_or_else(Node::null))
    }
    Node::Mapping(_) | Node::Scalar(Scalar::Null) => lookup_or_null(node, &Scalar::Int(idx)),
    other => Err(QueryError::Type(format!(
      "cannot index {} with {idx}",
      other.type_name()
    ))),
  }
}

fn iterate(node: &Node) -> Result<Vec<Node>, QueryError> {
  match node {
    Node::Sequence(seq) => Ok(seq.items()),
    Node::Mapping(map) => {
      let mut out = Vec::with_capacity(map.len());
      for k in map.keys() {
        out.push(map.get(&k)?);
      }
      Ok(out)
    }
    other => Err(QueryError::Type(format!(
      "cannot iterate over {}",
      other.type_name()
    ))),
  }
}

struct Parser<'a> {
  src: &'a str,
  pos: usize,
}

impl<'a> Parser<'a> {
  fn err<T>(&self, message: impl Into<String>) -> Result<T, QueryError> {
    Err(QueryError::Syntax {
      pos: self.pos,
      message: message.into(),
    })
  }

  fn peek(&self) -> Option<char> {
    self.src[self.pos..].chars().next()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += c.len_utf8();
    Some(c)
  }

  fn parse(mut self) -> Result<Vec<PathSegment>, QueryError> {
    if self.src.is_empty() || self.src == "." {
      return Ok(Vec::new());
    }
    let mut out = Vec::new();
    while let Some(c) = self.peek() {
      match c {
        '.' => {
          self.bump();
          match self.peek() {
            Some('"') => out.push(PathSegment::Key(self.string()?)),
            Some('[') => {}
            Some(c) if is_ident_char(c) => out.push(PathSegment::Key(self.ident())),
            Some(c) => return self.err(format!("unexpected {c:?} after '.'")),
            None => return self.err("expected a key after '.'"),
          }
        }
        '[' => out.push(self.bracket()?),
        c => return self.err(format!("unexpected {c:?}")),
      }
    }
    Ok(out)
  }

  fn ident(&mut self) -> String {
    let start = self.pos;
    while matches!(self.peek(), Some(c) if is_ident_char(c)) {
      self.bump();
    }
    self.src[start..self.pos].to_string()
  }

  fn string(&mut self) -> Result<String, QueryError> {
    let start = self.pos;
    self.bump();
    let mut escaped = false;
    loop {
      match self.bump() {
        None => {
          self.pos = start;
          return self.err("unterminated string");
        }
        Some('\\') if !escaped => escaped = true,
        Some('"') if !escaped => break,
        Some(_) => escaped = false,
      }
    }
    match serde_json::from_str::<String>(&self.src[start..self.pos]) {
      Ok(s) => Ok(s),
      Err(e) => {
        self.pos = start;
        self.err(format!("bad string literal: {e}"))
      }
    }
  }

  fn bracket(&mut self) -> Result<PathSegment, QueryError> {
    self.bump();
    let seg = match self.peek() {
      Some(']') => PathSegment::Iterate,
      Some('"') => PathSegment::Key(self.string()?),
      Some(c) if c == '-' || c.is_ascii_digit() => {
        let start = self.pos;
        self.bump();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
          self.bump();
        }
        match self.src[start..self.pos].parse::<i64>() {
          Ok(n) => PathSegment::Index(n),
          Err(e) => {
            self.pos = start;
            return self.err(format!("bad index: {e}"));
          }
        }
      }
      _ => return self.err("expected ']', an index or a string"),
    };
    if self.bump() != Some(']') {
      return self.err("expected ']'");
    }
    Ok(seg)
  }
}

fn is_ident_char(c: char) -> bool {
  c.is_alphanumeric() || matches!(c, '_' | '-' | '$' | '@')
}
