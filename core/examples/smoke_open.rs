use std::{path::PathBuf, rc::Rc};

use idb_core::{CoreEngine, CoreOptions, Mapping, Node, OutputMode, RenderOptions, StorageLocation};

fn main() -> Result<(), String> {
  let path = std::env::args()
    .nth(1)
    .ok_or_else(|| "usage: cargo run -p idb_core --example smoke_open -- <path-to-sqlite>".to_string())?;
  let location = StorageLocation::Explicit(PathBuf::from(path));

  let eng = CoreEngine::new(CoreOptions {
    object_store: None,
    render: RenderOptions {
      mode: OutputMode::Json,
      max_depth: Some(2),
      ..RenderOptions::default()
    },
  });

  let view = eng.open(&location).map_err(|e| e.to_string())?;
  println!("records={}", view.len());
  if let Some(k0) = view.keys().first() {
    println!("first.key={k0}");
  }
  let root = Node::Mapping(Rc::new(view));
  let out = eng.query(&root, ".").map_err(|e| e.to_string())?;
  println!("preview={}", out.text);
  println!("decode_errors={}", out.decode_errors);
  Ok(())
}
