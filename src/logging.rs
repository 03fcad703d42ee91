//! File logger. The terminal belongs to the UI, so records go to
//! `homo.log` in the data directory, truncated on every start.

use std::fs::{self, File};
use std::path::Path;

const LOG_FILE: &str = "homo.log";
const DEFAULT_FILTER: &str = "homotui=info,ht_base=info,ht_api=info";

/// Install the global logger. `RUST_LOG` overrides the default filter.
pub fn init(data_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create {}: {}", data_dir.display(), e))?;
    let path = data_dir.join(LOG_FILE);
    let file = File::create(&path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| format!("Failed to install logger: {}", e))
}
