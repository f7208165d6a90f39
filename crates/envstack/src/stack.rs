// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Stack file parsing and on-disk sources.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::value::{Mapping, Value};
use crate::{Error, Platform, Result};

#[cfg(test)]
#[path = "./stack_test.rs"]
mod stack_test;

/// Sections every stack file must declare.
const REQUIRED_KEYS: [&str; 4] = ["all", "darwin", "linux", "windows"];

/// What to do with a stack file that exists but cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MalformedPolicy {
    /// Report the file as an error.
    #[default]
    Fail,
    /// Log a warning and treat the file as empty.
    Skip,
}

/// The contents of one stack file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackFile {
    /// Names of stacks loaded before this one.
    pub include: Vec<String>,

    /// Values shared by every platform.
    pub all: Mapping,

    /// Per platform sections, `None` when the section is empty.
    pub darwin: Option<Mapping>,
    pub linux: Option<Mapping>,
    pub windows: Option<Mapping>,
}

impl StackFile {
    /// Parse stack file text. `path` is only used in error reports.
    pub fn from_yaml<S: AsRef<str>>(yaml: S, path: &Path) -> Result<Self> {
        let invalid = |reason: String, location: Option<serde_yaml::Location>| Error::InvalidStack {
            path: path.to_path_buf(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
            reason,
        };
        let yaml_error = |e: serde_yaml::Error| invalid(e.to_string(), e.location());

        let mut document: serde_yaml::Value =
            serde_yaml::from_str(yaml.as_ref()).map_err(yaml_error)?;
        document.apply_merge().map_err(yaml_error)?;

        let serde_yaml::Value::Mapping(mut document) = document else {
            return Err(invalid("expected a mapping at the top level".to_string(), None));
        };
        for key in REQUIRED_KEYS {
            if !document.contains_key(key) {
                return Err(invalid(format!("missing required key '{key}'"), None));
            }
        }

        let mut section = |key: &str| -> Result<Option<Mapping>> {
            match document.remove(key).map(Value::from_yaml) {
                None => Ok(None),
                Some(Value::Map(mut mapping)) => {
                    mapping.shift_remove("<<");
                    Ok(Some(mapping))
                }
                Some(value) if value.is_empty() => Ok(None),
                Some(_) => Err(invalid(format!("'{key}' must be a mapping"), None)),
            }
        };

        let all = section("all")?.unwrap_or_default();
        let darwin = section("darwin")?;
        let linux = section("linux")?;
        let windows = section("windows")?;
        let include = match section_include(&mut document) {
            Some(include) => include,
            None => return Err(invalid("'include' must be a list of stack names".to_string(), None)),
        };

        Ok(Self {
            include,
            all,
            darwin,
            linux,
            windows,
        })
    }

    /// Read and parse a stack file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;
        Self::from_yaml(yaml, path)
    }

    /// The declared section for `platform`, if any.
    pub fn platform(&self, platform: Platform) -> Option<&Mapping> {
        match platform {
            Platform::Darwin => self.darwin.as_ref(),
            Platform::Linux => self.linux.as_ref(),
            Platform::Windows => self.windows.as_ref(),
        }
    }

    pub fn platform_mut(&mut self, platform: Platform) -> &mut Option<Mapping> {
        match platform {
            Platform::Darwin => &mut self.darwin,
            Platform::Linux => &mut self.linux,
            Platform::Windows => &mut self.windows,
        }
    }

    /// The values seen on `platform`: its own section, else `all`.
    pub fn section(&self, platform: Platform) -> &Mapping {
        self.platform(platform).unwrap_or(&self.all)
    }
}

/// `None` when the include key holds something other than names.
fn section_include(document: &mut serde_yaml::Mapping) -> Option<Vec<String>> {
    match document.remove("include").map(Value::from_yaml) {
        None => Some(Vec::new()),
        Some(Value::Str(name)) if name.is_empty() => Some(Vec::new()),
        Some(Value::Str(name)) => Some(vec![name]),
        Some(Value::List(items)) => items
            .into_iter()
            .map(|item| item.as_str().map(String::from))
            .collect(),
        Some(_) => None,
    }
}

/// One stack file on disk.
///
/// Contents are read on first use and shared between clones. Two sources
/// are equal when they point at the same path.
#[derive(Debug, Clone)]
pub struct Source {
    path: PathBuf,
    policy: MalformedPolicy,
    data: Arc<OnceCell<StackFile>>,
}

impl Source {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_policy(path, MalformedPolicy::default())
    }

    pub fn with_policy<P: Into<PathBuf>>(path: P, policy: MalformedPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            data: Arc::new(OnceCell::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// The stack name this file provides, its file stem.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Parsed contents, read from disk once.
    pub fn data(&self) -> Result<&StackFile> {
        self.data.get_or_try_init(|| {
            tracing::debug!(path = ?self.path, "loading stack file");
            match StackFile::load(&self.path) {
                Err(err @ Error::InvalidStack { .. }) if self.policy == MalformedPolicy::Skip => {
                    tracing::warn!("skipping malformed stack file: {err}");
                    Ok(StackFile::default())
                }
                result => result,
            }
        })
    }

    /// Stack names this file includes, without following them.
    pub fn includes(&self) -> Result<Vec<String>> {
        Ok(self.data()?.include.clone())
    }

    /// The values this file defines for `platform`.
    pub fn load(&self, platform: Platform) -> Result<Mapping> {
        Ok(self.data()?.section(platform).clone())
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Source {}

impl Hash for Source {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}
