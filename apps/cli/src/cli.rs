use std::path::PathBuf;

use clap::Parser;
use idb_core::{CoreOptions, OutputMode, RenderOptions, ResolveRequest};

#[derive(Debug, Parser)]
#[command(
  name = "mozidb",
  version,
  about = "Query Firefox IndexedDB storage (extension storage, containers, raw files) without running the browser"
)]
pub struct Cli {
  /// Path query to apply (`.`, `.key`, `."quoted key"`, `[0]`, `[]`, chained)
  #[arg(value_name = "QUERY", default_value = ".")]
  pub query: String,

  /// IndexedDB SQLite file to read directly
  #[arg(short = 'f', long, value_name = "FILE")]
  pub path: Option<PathBuf>,

  /// Extension id whose `storage.local` database to read (needs --profile)
  #[arg(short = 'e', long, value_name = "ID")]
  pub extension: Option<String>,

  /// Browser profile directory
  #[arg(short = 'p', long, value_name = "DIR", env = "MOZIDB_PROFILE")]
  pub profile: Option<PathBuf>,

  /// Container to read from: numeric user context id or container name
  #[arg(short = 'c', long, value_name = "ID|NAME")]
  pub context: Option<String>,

  /// Object store inside the database (default: the first one)
  #[arg(long, value_name = "NAME")]
  pub object_store: Option<String>,

  /// Print single-line JSON instead of the indented layout
  #[arg(short = 'j', long)]
  pub json: bool,

  /// Sort mapping keys for stable output
  #[arg(short = 's', long)]
  pub sort_keys: bool,

  /// Collapse containers nested deeper than this
  #[arg(long, value_name = "N")]
  pub depth: Option<usize>,

  /// Target line width for the indented layout
  #[arg(long, value_name = "COLS", default_value_t = 80)]
  pub width: usize,

  /// Indentation step for the indented layout
  #[arg(long, value_name = "N", default_value_t = 2)]
  pub indent: usize,

  /// Write a JSON snapshot of every record to FILE instead of querying
  #[arg(long, value_name = "FILE")]
  pub export: Option<PathBuf>,

  /// Log resolution and store details to stderr
  #[arg(short, long)]
  pub verbose: bool,
}

impl Cli {
  pub fn resolve_request(&self) -> ResolveRequest {
    ResolveRequest {
      path: self.path.clone(),
      extension_id: self.extension.clone(),
      profile: self.profile.clone(),
      context: self.context.clone(),
    }
  }

  pub fn core_options(&self) -> CoreOptions {
    CoreOptions {
      object_store: self.object_store.clone(),
      render: RenderOptions {
        mode: if self.json {
          OutputMode::Json
        } else {
          OutputMode::Pretty
        },
        indent: self.indent,
        width: self.width,
        max_depth: self.depth,
        sort_keys: self.sort_keys,
      },
    }
  }
}
