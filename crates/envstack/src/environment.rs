// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Merging sources into a single raw environment.

use std::path::Path;

use crate::discovery::{DiscoveryOptions, resolve_sources};
use crate::stack::Source;
use crate::value::{Mapping, Value};
use crate::{DEFAULT_STACK, DEFAULT_STACK_VAR, Platform};

#[cfg(test)]
#[path = "./environment_test.rs"]
mod environment_test;

/// Variable holding the short name of the loaded stack.
pub const STACK_VAR: &str = "STACK";

/// An ordered set of variables and the sources that defined them.
///
/// Later sources override earlier ones key by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    values: Mapping,
    sources: Vec<Source>,
    names: Vec<String>,
    platform: Platform,
}

impl Environment {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            ..Default::default()
        }
    }

    /// An environment with values but no sources.
    pub fn from_mapping(values: Mapping, platform: Platform) -> Self {
        Self {
            values,
            platform,
            ..Default::default()
        }
    }

    /// Merge `sources` in order for `platform`, and name the result after
    /// the last of `names`.
    pub fn merge<S: AsRef<str>>(
        sources: &[Source],
        platform: Platform,
        names: &[S],
    ) -> crate::Result<Self> {
        let mut env = Self::merge_sources(sources, platform)?;
        env.names = names.iter().map(|n| n.as_ref().to_string()).collect();
        if !env.values.contains_key(STACK_VAR) {
            env.values
                .insert(STACK_VAR.to_string(), Value::from(stack_name(names)));
        }
        Ok(env)
    }

    /// Merge `sources` in order without setting the stack name.
    pub fn merge_sources(sources: &[Source], platform: Platform) -> crate::Result<Self> {
        let mut env = Self::new(platform);
        for source in sources {
            env.update(source)?;
        }
        Ok(env)
    }

    /// Layer one more source on top.
    pub fn update(&mut self, source: &Source) -> crate::Result<()> {
        for (key, value) in source.load(self.platform)? {
            self.values.insert(key, value);
        }
        self.sources.push(source.clone());
        Ok(())
    }

    /// The same sources and platform with different values.
    pub fn with_values(&self, values: Mapping) -> Self {
        Self {
            values,
            sources: self.sources.clone(),
            names: self.names.clone(),
            platform: self.platform,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    pub fn values(&self) -> &Mapping {
        &self.values
    }

    pub fn into_values(self) -> Mapping {
        self.values
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// The stack names this environment was loaded for.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.values.iter()
    }

    /// Flatten to plain string pairs for a child process.
    ///
    /// Lists and mappings are written as JSON.
    pub fn encode(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_text()))
            .collect()
    }

    /// The last source that defines `key`.
    pub fn trace(&self, key: &str) -> crate::Result<Option<&Source>> {
        for source in self.sources.iter().rev() {
            if source.load(self.platform)?.contains_key(key) {
                return Ok(Some(source));
            }
        }
        Ok(None)
    }
}

/// Short stack name for a request: the last name without directories or
/// extension, else the default stack name.
pub fn stack_name<S: AsRef<str>>(names: &[S]) -> String {
    let Some(name) = names.last() else {
        return default_stack_name();
    };
    Path::new(name.as_ref())
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(default_stack_name)
}

/// The stack loaded when none is named, from DEFAULT_ENV_STACK.
pub fn default_stack_name() -> String {
    std::env::var(DEFAULT_STACK_VAR)
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_STACK.to_string())
}

/// Discover and merge the named stacks.
pub fn load_environ<S: AsRef<str>>(
    names: &[S],
    options: &DiscoveryOptions,
    platform: Platform,
) -> crate::Result<Environment> {
    let sources = resolve_sources(names, options)?;
    tracing::debug!(count = sources.len(), "merging sources");
    Environment::merge(&sources, platform, names)
}
