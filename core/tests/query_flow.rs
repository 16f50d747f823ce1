use std::{cell::Cell, rc::Rc};

use idb_core::{
  render::render, LazyRecordView, Node, OutputMode, PathQuery, PathSegment, QueryError,
  QueryEvaluator, RecordStore, RenderOptions, Scalar, StoreError,
};
use serde_json::json;

fn eval(query: &str, root: &Node) -> Result<String, QueryError> {
  let out = PathQuery.evaluate(query, root)?;
  Ok(
    render(
      &out,
      &RenderOptions {
        mode: OutputMode::Json,
        ..RenderOptions::default()
      },
    )
    .text,
  )
}

fn sample() -> Node {
  Node::from_json(&json!({
    "tabs": [{"url": "a.example"}, {"url": "b.example"}],
    "odd key": 1,
    "count": 2
  }))
}

#[test]
fn parses_path_segments() {
  assert_eq!(PathQuery::parse(".").unwrap(), Vec::<PathSegment>::new());
  assert_eq!(PathQuery::parse("").unwrap(), Vec::<PathSegment>::new());
  assert_eq!(
    PathQuery::parse(r#".tabs[0].url"#).unwrap(),
    vec![
      PathSegment::Key("tabs".into()),
      PathSegment::Index(0),
      PathSegment::Key("url".into()),
    ]
  );
  assert_eq!(
    PathQuery::parse(r#"."odd key"[]["x"][-1]"#).unwrap(),
    vec![
      PathSegment::Key("odd key".into()),
      PathSegment::Iterate,
      PathSegment::Key("x".into()),
      PathSegment::Index(-1),
    ]
  );
  assert_eq!(
    PathQuery::parse(".ext@x.some-key").unwrap(),
    vec![
      PathSegment::Key("ext@x".into()),
      PathSegment::Key("some-key".into()),
    ]
  );
}

#[test]
fn syntax_errors_carry_position() {
  for bad in [".tabs[", ".\"open", "tabs", ".a..b", ".[x]"] {
    assert!(
      matches!(PathQuery::parse(bad), Err(QueryError::Syntax { .. })),
      "{bad} should not parse"
    );
  }
  match PathQuery::parse(".a]") {
    Err(QueryError::Syntax { pos, .. }) => assert_eq!(pos, 2),
    other => panic!("unexpected {other:?}"),
  }
}

#[test]
fn selects_and_fans_out() {
  let root = sample();
  assert_eq!(eval(".count", &root).unwrap(), "2");
  assert_eq!(eval(r#"."odd key""#, &root).unwrap(), "1");
  assert_eq!(eval(".tabs[1].url", &root).unwrap(), "\"b.example\"");
  assert_eq!(eval(".tabs[-1].url", &root).unwrap(), "\"b.example\"");
  assert_eq!(eval(".tabs[].url", &root).unwrap(), r#"["a.example", "b.example"]"#);
  assert_eq!(eval("[]", &Node::from_json(&json!({"a": 1, "b": 2}))).unwrap(), "[1, 2]");
}

#[test]
fn missing_is_null_and_scalars_are_type_errors() {
  let root = sample();
  assert_eq!(eval(".nope", &root).unwrap(), "null");
  assert_eq!(eval(".nope.deeper", &root).unwrap(), "null");
  assert_eq!(eval(".tabs[9]", &root).unwrap(), "null");
  assert!(matches!(eval(".count.x", &root), Err(QueryError::Type(_))));
  assert!(matches!(eval(".count[]", &root), Err(QueryError::Type(_))));
  assert!(matches!(eval(".tabs.url", &root), Err(QueryError::Type(_))));
}

struct TwoRecords {
  decodes: Rc<Cell<usize>>,
}

impl RecordStore for TwoRecords {
  fn list_keys(&self) -> Result<Vec<Scalar>, StoreError> {
    Ok(vec![Scalar::from("wanted"), Scalar::from("corrupt")])
  }

  fn decode(&self, key: &Scalar) -> Result<Node, StoreError> {
    self.decodes.set(self.decodes.get() + 1);
    match key.as_text() {
      Some("wanted") => Ok(Node::from_json(&json!({"v": 1}))),
      _ => Err(StoreError::Decode {
        key: key.to_string(),
        reason: "corrupt".into(),
      }),
    }
  }
}

#[test]
fn query_only_decodes_visited_keys() {
  let decodes = Rc::new(Cell::new(0));
  let view = LazyRecordView::new(TwoRecords {
    decodes: decodes.clone(),
  })
  .unwrap();
  let root = Node::Mapping(Rc::new(view));

  assert_eq!(eval(".wanted.v", &root).unwrap(), "1");
  assert_eq!(decodes.get(), 1);

  assert!(matches!(
    eval(".corrupt", &root),
    Err(QueryError::Access(StoreError::Decode { .. }))
  ));
  assert_eq!(eval(".absent", &root).unwrap(), "null");
  assert_eq!(decodes.get(), 2);
}
