//! Deterministic, JSON-compatible text for a node tree.
//!
//! Rendering happens in two passes: the tree is walked once into a small
//! layout document (so every mapping value is read exactly once), then the
//! document is laid out either on one line (`OutputMode::Json`) or indented
//! within a target width (`OutputMode::Pretty`).

use std::{cmp::Ordering, collections::HashSet};

use base64::Engine as _;

use crate::models::{Node, OutputMode, RenderOptions, Rendered, Scalar};

/// Per-call render state. Discarded when the render returns.
struct RenderContext {
  mode: OutputMode,
  max_depth: Option<usize>,
  sort_keys: bool,
  /// Identities of composites currently being descended into.
  in_progress: HashSet<usize>,
  decode_errors: usize,
}

enum Doc {
  Atom(String),
  Block {
    open: &'static str,
    close: &'static str,
    entries: Vec<(Option<String>, Doc)>,
    /// Length of the one-line form, in chars.
    width: usize,
  },
}

impl Doc {
  fn width(&self) -> usize {
    match self {
      Doc::Atom(s) => s.chars().count(),
      Doc::Block { width, .. } => *width,
    }
  }
}

pub fn render(node: &Node, opts: &RenderOptions) -> Rendered {
  let mut ctx = RenderContext {
    mode: opts.mode,
    max_depth: opts.max_depth,
    sort_keys: opts.sort_keys,
    in_progress: HashSet::new(),
    decode_errors: 0,
  };
  let doc = build(node, &mut ctx, 1);
  let text = match opts.mode {
    OutputMode::Json => flat(&doc),
    OutputMode::Pretty => {
      let mut out = String::new();
      layout(&doc, 0, opts.indent, opts.width, &mut out);
      out
    }
  };
  Rendered {
    text,
    decode_errors: ctx.decode_errors,
  }
}

/// Encode a scalar with JSON rules. Bytes become base64 strings and
/// non-finite floats become `null`.
pub fn encode_scalar(s: &Scalar) -> String {
  match s {
    Scalar::Null => "null".into(),
    Scalar::Bool(b) => b.to_string(),
    Scalar::Int(n) => n.to_string(),
    Scalar::Float(f) if f.is_finite() => {
      serde_json::to_string(f).unwrap_or_else(|_| "null".into())
    }
    Scalar::Float(_) => "null".into(),
    Scalar::Text(t) => json_quote(t),
    Scalar::Bytes(b) => json_quote(&base64::engine::general_purpose::STANDARD.encode(b)),
  }
}

fn json_quote(s: &str) -> String {
  serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "\\\"")))
}

/// Best-effort total order over keys, used only to make output stable.
///
/// Numbers compare numerically and same-kind scalars naturally; anything else
/// falls back to type name, then encoded content.
pub fn key_order(a: &Scalar, b: &Scalar) -> Ordering {
  let direct = match (a, b) {
    (Scalar::Null, Scalar::Null) => Some(Ordering::Equal),
    (Scalar::Bool(x), Scalar::Bool(y)) => Some(x.cmp(y)),
    (Scalar::Int(x), Scalar::Int(y)) => Some(x.cmp(y)),
    (Scalar::Float(x), Scalar::Float(y)) => Some(x.total_cmp(y)),
    (Scalar::Int(x), Scalar::Float(y)) => (*x as f64).partial_cmp(y),
    (Scalar::Float(x), Scalar::Int(y)) => x.partial_cmp(&(*y as f64)),
    (Scalar::Text(x), Scalar::Text(y)) => Some(x.cmp(y)),
    (Scalar::Bytes(x), Scalar::Bytes(y)) => Some(x.cmp(y)),
    _ => None,
  };
  direct.unwrap_or_else(|| {
    a.type_name()
      .cmp(b.type_name())
      .then_with(|| encode_scalar(a).cmp(&encode_scalar(b)))
  })
}

impl RenderContext {
  /// Markers are bare in pretty output and JSON strings in interchange output.
  fn marker(&self, text: String) -> Doc {
    match self.mode {
      OutputMode::Json => Doc::Atom(json_quote(&text)),
      OutputMode::Pretty => Doc::Atom(text),
    }
  }

  fn key_text(&self, key: &Scalar) -> String {
    match (self.mode, key) {
      (OutputMode::Json, Scalar::Text(_) | Scalar::Bytes(_)) => encode_scalar(key),
      (OutputMode::Json, other) => json_quote(&encode_scalar(other)),
      (OutputMode::Pretty, other) => encode_scalar(other),
    }
  }
}

fn build(node: &Node, ctx: &mut RenderContext, level: usize) -> Doc {
  let (open, close) = match node {
    Node::Scalar(s) => return Doc::Atom(encode_scalar(s)),
    Node::Sequence(seq) if seq.is_empty() => return Doc::Atom("[]".into()),
    Node::Mapping(map) if map.is_empty() => return Doc::Atom("{}".into()),
    Node::Sequence(_) => ("[", "]"),
    Node::Mapping(_) => ("{", "}"),
  };

  let id = node.identity().unwrap_or_default();
  if ctx.in_progress.contains(&id) {
    return ctx.marker(format!("<Recursion on {} with id={id}>", node.type_name()));
  }
  if ctx.max_depth.is_some_and(|max| level > max) {
    return ctx.marker(format!("{open}...{close}"));
  }

  ctx.in_progress.insert(id);
  let entries: Vec<(Option<String>, Doc)> = match node {
    Node::Sequence(seq) => seq
      .items()
      .iter()
      .map(|item| (None, build(item, ctx, level + 1)))
      .collect(),
    Node::Mapping(map) => {
      let mut keys = map.keys();
      if ctx.sort_keys {
        keys.sort_by(key_order);
      }
      let mut entries = Vec::with_capacity(keys.len());
      for key in keys {
        let value = match map.get(&key) {
          Ok(v) => build(&v, ctx, level + 1),
          Err(e) => {
            tracing::warn!("key {key}: {e}");
            ctx.decode_errors += 1;
            ctx.marker(format!("<decode error: {e}>"))
          }
        };
        entries.push((Some(ctx.key_text(&key)), value));
      }
      entries
    }
    Node::Scalar(_) => Vec::new(),
  };
  ctx.in_progress.remove(&id);

  let width = 2
    + 2 * entries.len().saturating_sub(1)
    + entries
      .iter()
      .map(|(key, value)| key.as_ref().map_or(0, |k| k.chars().count() + 2) + value.width())
      .sum::<usize>();
  Doc::Block {
    open,
    close,
    entries,
    width,
  }
}

fn flat(doc: &Doc) -> String {
  let mut out = String::new();
  write_flat(doc, &mut out);
  out
}

fn write_flat(doc: &Doc, out: &mut String) {
  match doc {
    Doc::Atom(s) => out.push_str(s),
    Doc::Block {
      open,
      close,
      entries,
      ..
    } => {
      out.push_str(open);
      for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        if let Some(k) = key {
          out.push_str(k);
          out.push_str(": ");
        }
        write_flat(value, out);
      }
      out.push_str(close);
    }
  }
}

/// `column` is where `doc` starts on the current line.
fn layout(doc: &Doc, column: usize, indent: usize, width: usize, out: &mut String) {
  if column + doc.width() <= width {
    write_flat(doc, out);
    return;
  }
  let Doc::Block {
    open,
    close,
    entries,
    ..
  } = doc
  else {
    write_flat(doc, out);
    return;
  };

  // Nested blocks are indented relative to the start of their line.
  let line_start = out.rfind('\n').map_or(0, |i| i + 1);
  let base = out[line_start..].len() - out[line_start..].trim_start().len();
  let inner = base + indent;

  out.push_str(open);
  for (i, (key, value)) in entries.iter().enumerate() {
    out.push('\n');
    out.push_str(&" ".repeat(inner));
    let mut col = inner;
    if let Some(k) = key {
      out.push_str(k);
      out.push_str(": ");
      col += k.chars().count() + 2;
    }
    layout(value, col, indent, width, out);
    if i + 1 < entries.len() {
      out.push(',');
    }
  }
  out.push('\n');
  out.push_str(&" ".repeat(base));
  out.push_str(close);
}
