//! Guest OS release info JSON update.
//!
//! The release info file is a one-element array of objects. Versions of
//! `open-vm-tools` and `cloud-init` observed during the run are added when
//! the file does not list them yet, and `Release` is kept as the first key.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

type ReleaseRecord = IndexMap<String, JsonValue>;

pub const CLOUDINIT_KEY: &str = "cloud-init";
pub const OVT_KEY: &str = "open-vm-tools";
pub const RELEASE_KEY: &str = "Release";

/// Adds missing package versions to the release info file.
///
/// Returns whether the file was rewritten. Nothing is written when both
/// keys are present already or no version is known.
pub fn update_release_info(
    path: &Path,
    cloudinit_version: Option<&str>,
    ovt_version: Option<&str>,
) -> Result<bool> {
    let content = fs::read_to_string(path)?;
    let mut records: Vec<ReleaseRecord> =
        serde_json::from_str(&content).map_err(|e| Error::OsReleaseLayout {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if records.len() != 1 {
        return Err(Error::OsReleaseLayout {
            path: path.to_path_buf(),
            message: format!("expected one release record, found {}", records.len()),
        });
    }

    let record = &mut records[0];
    let mut changed = false;
    for (key, version) in [(CLOUDINIT_KEY, cloudinit_version), (OVT_KEY, ovt_version)] {
        let Some(version) = version.filter(|v| !v.is_empty()) else {
            continue;
        };
        if !record.contains_key(key) {
            prepend(record, key, JsonValue::String(version.to_string()));
            changed = true;
        }
    }

    if !changed {
        return Ok(false);
    }

    if let Some(release) = record.shift_remove(RELEASE_KEY) {
        prepend(record, RELEASE_KEY, release);
    }

    fs::write(path, to_json_indent4(&records)?)?;
    Ok(true)
}

fn prepend(record: &mut ReleaseRecord, key: &str, value: JsonValue) {
    let mut reordered = ReleaseRecord::with_capacity(record.len() + 1);
    reordered.insert(key.to_string(), value);
    reordered.extend(record.drain(..));
    *record = reordered;
}

/// Serializes with four-space indentation.
pub fn to_json_indent4<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
