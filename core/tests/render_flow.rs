use std::rc::Rc;

use idb_core::{
  render::{key_order, render},
  MemoryMapping, Node, OutputMode, RenderOptions, Scalar, Sequence,
};
use serde_json::json;

fn json_opts() -> RenderOptions {
  RenderOptions {
    mode: OutputMode::Json,
    ..RenderOptions::default()
  }
}

fn wide_pretty() -> RenderOptions {
  RenderOptions {
    width: 200,
    ..RenderOptions::default()
  }
}

#[test]
fn json_mode_round_trips_plain_trees() {
  let value = json!({
    "a": [1, 2.5, "x", null, true, {"b": []}],
    "c": {},
    "quote\"d": "line\nbreak",
    "neg": -7
  });
  let text = render(&Node::from_json(&value), &json_opts()).text;
  let back: serde_json::Value = serde_json::from_str(&text).unwrap();
  assert_eq!(back, value);
}

#[test]
fn scalars_use_json_encoding() {
  let cases = [
    (Scalar::Null, "null"),
    (Scalar::Bool(false), "false"),
    (Scalar::Int(-3), "-3"),
    (Scalar::Float(1.0), "1.0"),
    (Scalar::Float(f64::NAN), "null"),
    (Scalar::Text("tab\there".into()), "\"tab\\there\""),
    (Scalar::Bytes(vec![1, 2, 3]), "\"AQID\""),
  ];
  for (s, want) in cases {
    assert_eq!(render(&Node::Scalar(s), &wide_pretty()).text, want);
  }
}

#[test]
fn self_referencing_mapping_gets_one_marker() {
  let map = Rc::new(MemoryMapping::new("dict"));
  map.insert(Scalar::from("name"), Node::text("root"));
  let node = Node::Mapping(map.clone());
  map.insert(Scalar::from("me"), node.clone());

  let out = render(&node, &wide_pretty()).text;
  assert_eq!(out.matches("<Recursion on dict with id=").count(), 1);
  assert!(out.starts_with("{\"name\": \"root\", \"me\": <Recursion on dict"));

  // Interchange output stays parseable.
  let text = render(&node, &json_opts()).text;
  let back: serde_json::Value = serde_json::from_str(&text).unwrap();
  assert!(back["me"].as_str().unwrap().starts_with("<Recursion on dict"));
}

#[test]
fn cycle_through_a_sequence_terminates() {
  let seq = Rc::new(Sequence::list(vec![Node::Scalar(Scalar::Int(1))]));
  let map = Rc::new(MemoryMapping::new("dict"));
  map.insert(Scalar::from("items"), Node::Sequence(seq.clone()));
  seq.push(Node::Mapping(map.clone()));

  let out = render(&Node::Sequence(seq), &wide_pretty()).text;
  assert_eq!(out.matches("<Recursion on list with id=").count(), 1);
  assert!(out.starts_with("[1, {\"items\": <Recursion on list"));
}

#[test]
fn aliased_subtree_is_not_a_cycle() {
  let shared = Node::from_json(&json!({"k": 1}));
  let list = Node::Sequence(Rc::new(Sequence::list(vec![shared.clone(), shared])));
  let out = render(&list, &wide_pretty()).text;
  assert_eq!(out, r#"[{"k": 1}, {"k": 1}]"#);
}

#[test]
fn max_depth_truncates_composites() {
  let node = Node::from_json(&json!({"a": {"b": {"c": 1}}, "l": [[1]]}));
  let opts = RenderOptions {
    max_depth: Some(2),
    ..wide_pretty()
  };
  assert_eq!(
    render(&node, &opts).text,
    r#"{"a": {"b": {...}}, "l": [[...]]}"#
  );

  let opts = RenderOptions {
    max_depth: Some(1),
    ..json_opts()
  };
  let back: serde_json::Value = serde_json::from_str(&render(&node, &opts).text).unwrap();
  assert_eq!(back, json!({"a": "{...}", "l": "[...]"}));
}

#[test]
fn sort_keys_orders_mixed_key_types() {
  let map = MemoryMapping::new("Map");
  for key in [
    Scalar::from("b"),
    Scalar::Int(10),
    Scalar::from("a"),
    Scalar::Int(2),
    Scalar::Float(2.5),
    Scalar::Bool(true),
    Scalar::Null,
  ] {
    map.insert(key, Node::Scalar(Scalar::Int(1)));
  }
  let node = Node::Mapping(Rc::new(map));

  let unsorted = render(&node, &wide_pretty()).text;
  assert!(unsorted.starts_with(r#"{"b": 1, 10: 1"#));

  let sorted = render(
    &node,
    &RenderOptions {
      sort_keys: true,
      ..wide_pretty()
    },
  )
  .text;
  assert_eq!(sorted, r#"{true: 1, 2: 1, 2.5: 1, 10: 1, null: 1, "a": 1, "b": 1}"#);
}

#[test]
fn key_order_is_total_over_mixed_kinds() {
  use std::cmp::Ordering;
  assert_eq!(key_order(&Scalar::Int(2), &Scalar::Float(2.5)), Ordering::Less);
  assert_eq!(key_order(&Scalar::from("a"), &Scalar::Int(1)), Ordering::Greater);
  assert_eq!(
    key_order(&Scalar::Float(f64::NAN), &Scalar::Float(f64::NAN)),
    Ordering::Equal
  );
  assert_eq!(key_order(&Scalar::Null, &Scalar::Null), Ordering::Equal);
}

#[test]
fn pretty_mode_wraps_past_width() {
  let node = Node::from_json(&json!({"a": [1, 2], "b": "long text value here"}));
  let opts = RenderOptions {
    width: 20,
    indent: 2,
    ..RenderOptions::default()
  };
  assert_eq!(
    render(&node, &opts).text,
    "{\n  \"a\": [1, 2],\n  \"b\": \"long text value here\"\n}"
  );

  let nested = Node::from_json(&json!({"outer": {"first": 111111, "second": 222222}}));
  let opts = RenderOptions {
    width: 30,
    indent: 2,
    ..RenderOptions::default()
  };
  assert_eq!(
    render(&nested, &opts).text,
    "{\n  \"outer\": {\n    \"first\": 111111,\n    \"second\": 222222\n  }\n}"
  );
}

#[test]
fn json_mode_stringifies_non_text_keys() {
  let map = MemoryMapping::new("Map");
  map.insert(Scalar::Int(1), Node::text("one"));
  map.insert(Scalar::Bytes(vec![0xff]), Node::text("raw"));
  let text = render(&Node::Mapping(Rc::new(map)), &json_opts()).text;
  let back: serde_json::Value = serde_json::from_str(&text).unwrap();
  assert_eq!(back, json!({"1": "one", "/w==": "raw"}));
}

#[test]
fn pretty_mode_fits_exactly_at_width() {
  let node = Node::from_json(&json!({"a": [1, 2]}));
  let flat = r#"{"a": [1, 2]}"#;
  let at = |width| {
    render(
      &node,
      &RenderOptions {
        width,
        ..RenderOptions::default()
      },
    )
    .text
  };
  assert_eq!(at(flat.len()), flat);
  assert_eq!(at(flat.len() - 1), "{\n  \"a\": [1, 2]\n}");
}

#[test]
fn pretty_mode_handles_deep_nesting() {
  let depth = 200;
  let mut node = Node::Scalar(Scalar::Int(1));
  for _ in 0..depth {
    node = Node::Sequence(Rc::new(Sequence::list(vec![node])));
  }
  let text = render(
    &node,
    &RenderOptions {
      width: 0,
      indent: 1,
      ..RenderOptions::default()
    },
  )
  .text;
  let lines: Vec<&str> = text.lines().collect();
  assert_eq!(lines.len(), 2 * depth + 1);
  assert_eq!(lines[depth], format!("{}1", " ".repeat(depth)));
  assert_eq!(lines[lines.len() - 1], "]");
}
