pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Typed input from `--input <file>` if given, else piped stdin, else `None`
/// so the caller can fall back to individual flags.
pub fn load<T: DeserializeOwned>(path: Option<&str>) -> Result<Option<T>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        tracing::debug!(path, "reading input file");
        return Ok(Some(file::read_json(path)?));
    }
    match stdin::read_stdin()? {
        Some(data) => {
            tracing::debug!("reading input from stdin");
            Ok(Some(serde_json::from_value(data)?))
        }
        None => Ok(None),
    }
}
