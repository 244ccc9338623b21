//! Testing vars file lookup.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{Error, Result};

/// Variables from the testing vars YAML file.
#[derive(Debug, Clone, Default)]
pub struct TestingVars {
    path: Option<PathBuf>,
    values: Mapping,
}

impl TestingVars {
    /// Loads the vars file. A file holding anything but a mapping yields
    /// no values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::VarsFileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let values = match serde_yaml::from_str::<YamlValue>(&content)? {
            YamlValue::Mapping(map) => map,
            _ => Mapping::new(),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            values,
        })
    }

    /// Builds vars from an in-memory mapping.
    pub fn from_mapping(values: Mapping) -> Self {
        Self { path: None, values }
    }

    /// Path the vars were read from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A scalar variable as a non-empty string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        let value = match self.values.get(key)? {
            YamlValue::String(s) => s.clone(),
            YamlValue::Number(n) => n.to_string(),
            YamlValue::Bool(b) => b.to_string(),
            _ => return None,
        };
        let value = value.trim().to_string();
        (!value.is_empty()).then_some(value)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
