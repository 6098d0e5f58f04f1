use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::GraphSpec;

pub fn load_graph(path: &Path) -> Result<GraphSpec> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::ConfigIo(format!("failed to read graph '{}': {}", path.display(), err))
    })?;
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("");

    match ext {
        "toml" => toml::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse TOML: {}", err))),
        "json" => serde_json::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse JSON: {}", err))),
        "" => Err(Error::UnsupportedConfigFormat("unknown".to_string())),
        _ => Err(Error::UnsupportedConfigFormat(ext.to_string())),
    }
}
