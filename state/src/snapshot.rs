use std::fs;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use warden_protocol::Mission;

use crate::error::StateError;

/// Reads a snapshot: a JSON object mapping mission id to mission. A missing
/// file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> Result<IndexMap<String, Mission>, StateError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(IndexMap::new()),
        Err(source) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&contents).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Rewrites the whole snapshot. The new contents are written to a sibling
/// file first and renamed into place.
pub fn write_snapshot(path: &Path, missions: &IndexMap<String, Mission>) -> Result<(), StateError> {
    let write_err = |source: io::Error| StateError::Write {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(missions)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(write_err)?;
    fs::rename(&tmp_path, path).map_err(write_err)
}
