// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Platform sections and path list handling.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./platform_test.rs"]
mod platform_test;

/// A drive letter, optionally preceded by the separator that ended the last path.
static DRIVE_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[:;]?([A-Z]:[/\\])").expect("valid drive letter pattern"));

/// The operating system sections of a stack file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Darwin,
    Linux,
    Windows,
}

impl Platform {
    /// Every platform, in the order sections are written.
    pub const ALL: [Platform; 3] = [Platform::Darwin, Platform::Linux, Platform::Windows];

    /// The platform this process is running on.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Darwin
        } else {
            Self::Linux
        }
    }

    /// The section key used in stack files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }

    /// Separator used to join path lists.
    pub fn list_separator(&self) -> char {
        match self {
            Self::Windows => ';',
            _ => ':',
        }
    }

    /// Split a path list string into its non-empty entries.
    pub fn split_paths(&self, paths: &str) -> Vec<String> {
        match self {
            Self::Windows => split_windows_paths(paths),
            _ => split_posix_paths(paths),
        }
    }

    /// Remove repeated entries from a path list, keeping the first of each,
    /// and rejoin with this platform's separator.
    pub fn dedupe_paths(&self, paths: &str) -> String {
        let unique: IndexSet<String> = self.split_paths(paths).into_iter().collect();
        let separator = self.list_separator().to_string();
        unique.into_iter().collect::<Vec<_>>().join(&separator)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "darwin" | "macos" => Ok(Self::Darwin),
            "linux" => Ok(Self::Linux),
            "windows" | "win32" => Ok(Self::Windows),
            other => Err(format!(
                "unknown platform '{other}', expected one of: darwin, linux, windows"
            )),
        }
    }
}

fn split_posix_paths(paths: &str) -> Vec<String> {
    paths
        .split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Windows path lists may mix `;` and `:` separators. Colons that belong to
/// an uppercase drive letter are kept.
fn split_windows_paths(paths: &str) -> Vec<String> {
    let mut result = Vec::new();
    for token in paths.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        let windows_style = token.contains('\\') || starts_with_drive(token);
        if !windows_style {
            result.extend(split_posix_paths(token));
            continue;
        }
        let marked = DRIVE_LETTER.replace_all(token, "|$1");
        for part in marked.split('|').filter(|p| !p.is_empty()) {
            let (drive, rest) = if starts_with_drive(part) {
                part.split_at(2)
            } else {
                ("", part)
            };
            let mut pieces = rest.split(':');
            if let Some(first) = pieces.next() {
                let first = format!("{drive}{first}");
                if !first.is_empty() {
                    result.push(first);
                }
            }
            result.extend(pieces.filter(|p| !p.is_empty()).map(String::from));
        }
    }
    result
}

fn starts_with_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_uppercase()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}
