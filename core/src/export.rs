use std::{
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  rc::Rc,
};

use crate::{
  engine::CoreError,
  models::{ExportResult, Node, OutputMode, RenderOptions},
  render::render,
  view::{Mapping, MemoryMapping},
};

/// Materialize `source` and write it to `output_path` as one JSON document.
///
/// Unlike rendering, a snapshot is all-or-nothing: the first record that fails
/// to decode aborts the export before the output file is created.
pub(crate) fn export_snapshot(
  source: &dyn Mapping,
  output_path: &Path,
) -> Result<ExportResult, CoreError> {
  let entries = source.materialize()?;
  let records_written = entries.len() as u64;
  let snapshot = Node::Mapping(Rc::new(MemoryMapping::from_entries(
    source.type_name(),
    entries,
  )));

  let rendered = render(
    &snapshot,
    &RenderOptions {
      mode: OutputMode::Json,
      ..RenderOptions::default()
    },
  );

  if let Some(parent) = output_path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  let out_file = File::create(output_path)?;
  let mut writer = BufWriter::new(out_file);
  writer.write_all(rendered.text.as_bytes())?;
  writer.write_all(b"\n")?;
  writer.flush()?;

  tracing::debug!(records_written, path = %output_path.display(), "exported snapshot");
  Ok(ExportResult {
    output_path: output_path.to_string_lossy().to_string(),
    records_written,
  })
}
