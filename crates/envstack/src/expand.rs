// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Expansion of variable references in a merged environment.
//!
//! Each reference is looked up in three places:
//!
//! - the environment being resolved,
//! - the *included* environment, which is what the layers below the
//!   last source resolve to on their own,
//! - the process environment, which overrides the included one.
//!
//! A reference to the variable being defined, such as `PATH: /bin:${PATH}`,
//! means the outer value of that variable and never recurses.

use indexmap::IndexMap;

use crate::codec::KeyContext;
use crate::environment::Environment;
use crate::template::{Modifier, TemplateString, Token, has_tokens};
use crate::value::{Mapping, Value};
use crate::{Error, Platform, Result};

#[cfg(test)]
#[path = "./expand_test.rs"]
mod expand_test;

/// Nesting allowed before a reference chain counts as a cycle.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Resolves raw environments into plain values.
#[derive(Debug, Clone)]
pub struct Expander {
    process_env: IndexMap<String, String>,
    keys: KeyContext,
    max_depth: usize,
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

impl Expander {
    /// An expander that sees an empty process environment.
    pub fn new() -> Self {
        Self {
            process_env: IndexMap::new(),
            keys: KeyContext::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// An expander that sees the variables of this process.
    pub fn from_env() -> Self {
        Self::new().with_process_env(std::env::vars())
    }

    /// Replace the process environment used for overrides and keys.
    pub fn with_process_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.process_env = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Keys that take precedence over any found in the environments.
    pub fn with_keys(mut self, keys: KeyContext) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Fully resolve `env`, returning a new environment with the same
    /// sources.
    pub fn resolve(&self, env: &Environment) -> Result<Environment> {
        let included = self.included(env)?;
        let values = self.resolve_layer(env.values(), &included, env.platform(), true)?;
        Ok(env.with_values(values))
    }

    /// Resolve a plain mapping on the current platform, with nothing
    /// included below it.
    pub fn resolve_mapping(&self, values: &Mapping) -> Result<Mapping> {
        self.resolve_layer(values, &Mapping::new(), Platform::current(), true)
    }

    /// Expand a single expression against `values`.
    pub fn expand_str(&self, expr: &str, values: &Mapping) -> Result<String> {
        let included = Mapping::new();
        let scope = self.scope(values, &included, Platform::current());
        let raw = self.decode_nodes(values, &scope.keys);
        let scope = Scope { values: &raw, ..scope };
        let expanded = scope.expand_text(expr, None, 0)?;
        Ok(sanitize(expanded, scope.platform))
    }

    /// The key material visible while resolving `values`.
    pub fn keys_for(&self, values: &Mapping) -> KeyContext {
        let plain = |name: &str| {
            values
                .get(name)
                .and_then(Value::as_str)
                .filter(|v| !has_tokens(v))
                .map(String::from)
        };
        let from_values = KeyContext::from_lookup(plain);
        let from_process = KeyContext::from_lookup(|name| self.process_env.get(name).cloned());
        from_values.overlay(&from_process).overlay(&self.keys)
    }

    /// What every source but the last resolves to, layer by layer.
    ///
    /// Variables that fail to resolve in a lower layer are left out, the
    /// layers above may still define them.
    fn included(&self, env: &Environment) -> Result<Mapping> {
        let sources = env.sources();
        let mut included = Mapping::new();
        for end in 1..sources.len() {
            let layer = Environment::merge_sources(&sources[..end], env.platform())?;
            included = self.resolve_layer(layer.values(), &included, env.platform(), false)?;
        }
        Ok(included)
    }

    fn resolve_layer(
        &self,
        values: &Mapping,
        included: &Mapping,
        platform: Platform,
        strict: bool,
    ) -> Result<Mapping> {
        let scope = self.scope(values, included, platform);
        let raw = self.decode_nodes(values, &scope.keys);
        let scope = Scope { values: &raw, ..scope };

        let mut resolved = Mapping::with_capacity(raw.len());
        for (key, value) in &raw {
            match scope.expand_value(value, key) {
                Ok(value) => {
                    resolved.insert(key.clone(), value);
                }
                Err(err) if !strict => {
                    tracing::debug!(%key, "skipping included variable: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(resolved)
    }

    fn scope<'a>(&'a self, values: &'a Mapping, included: &'a Mapping, platform: Platform) -> Scope<'a> {
        Scope {
            values,
            included,
            process_env: &self.process_env,
            keys: self.keys_for(values),
            platform,
            max_depth: self.max_depth,
        }
    }

    /// Replace typed nodes by their decoded values.
    fn decode_nodes(&self, values: &Mapping, keys: &KeyContext) -> Mapping {
        values
            .iter()
            .map(|(k, v)| (k.clone(), decode_value(v, keys)))
            .collect()
    }
}

/// Expand one expression against `values` and the process environment.
pub fn expand_str(expr: &str, values: &Mapping) -> Result<String> {
    Expander::from_env().expand_str(expr, values)
}

/// Resolve a plain mapping against the process environment.
pub fn resolve_mapping(values: &Mapping) -> Result<Mapping> {
    Expander::from_env().resolve_mapping(values)
}

fn decode_value(value: &Value, keys: &KeyContext) -> Value {
    match value {
        Value::Node(node) => Value::safe_eval(&node.resolve(keys)),
        Value::List(items) => Value::List(items.iter().map(|v| decode_value(v, keys)).collect()),
        Value::Map(mapping) => Value::Map(
            mapping
                .iter()
                .map(|(k, v)| (k.clone(), decode_value(v, keys)))
                .collect(),
        ),
        Value::Str(_) => value.clone(),
    }
}

/// Lookup tables for one resolution pass.
struct Scope<'a> {
    values: &'a Mapping,
    included: &'a Mapping,
    process_env: &'a IndexMap<String, String>,
    keys: KeyContext,
    platform: Platform,
    max_depth: usize,
}

impl Scope<'_> {
    fn expand_value(&self, value: &Value, key: &str) -> Result<Value> {
        match value {
            Value::Str(text) => {
                let expanded = self.expand_text(text, Some(key), 0)?;
                Ok(Value::Str(sanitize(expanded, self.platform)))
            }
            Value::List(items) => items
                .iter()
                .map(|item| self.expand_value(item, key))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Value::Map(mapping) => {
                let mut expanded = Mapping::with_capacity(mapping.len());
                for (k, v) in mapping {
                    expanded.insert(k.clone(), self.expand_value(v, key)?);
                }
                Ok(Value::Map(expanded))
            }
            Value::Node(node) => Ok(Value::Str(node.resolve(&self.keys))),
        }
    }

    /// Substitute every reference in `text`, repeating while references
    /// remain. `current` names the variable whose value `text` is.
    fn expand_text(&self, text: &str, current: Option<&str>, depth: usize) -> Result<String> {
        let template = TemplateString::new(text);
        if !template.has_tokens() {
            return Ok(text.to_string());
        }
        if depth > self.max_depth {
            return Err(Error::CyclicalReference(text.to_string()));
        }

        let result = template.replace_with(|token| self.substitute(token, current, depth))?;
        if result != text && has_tokens(&result) {
            return self.expand_text(&result, current, depth + 1);
        }
        Ok(result)
    }

    fn substitute(&self, token: &Token<'_>, current: Option<&str>, depth: usize) -> Result<String> {
        let name = token.name;
        let parent = self
            .included
            .get(name)
            .map(Value::to_text)
            .unwrap_or_default();
        let outer = self
            .process_env
            .get(name)
            .cloned()
            .unwrap_or_else(|| parent.clone());

        // the definition being resolved is not its own value
        let mut value = if current == Some(name) {
            String::new()
        } else {
            self.values
                .get(name)
                .map(Value::to_text)
                .unwrap_or_else(|| parent.clone())
        };
        let self_reference = format!("${{{name}}}");
        if value.contains(&self_reference) {
            value = value.replace(&self_reference, &outer);
        }

        match token.modifier {
            Some(Modifier::Assign | Modifier::Default) => {
                // process environment, then this layer, then the layers below
                if let Some(process) = self.process_env.get(name).filter(|v| !v.is_empty()) {
                    return Ok(process.clone());
                }
                // a definition that loops back here falls through to the default
                let value = match self.expand_definition(&value, name, depth) {
                    Err(Error::CyclicalReference(cycle)) => {
                        tracing::debug!(name, %cycle, "default used for cyclical definition");
                        String::new()
                    }
                    result => result?,
                };
                if !value.is_empty() {
                    return Ok(value);
                }
                if !parent.is_empty() {
                    return Ok(parent);
                }
                self.expand_text(token.argument, current, depth + 1)
            }
            Some(Modifier::Required) => {
                let value = self.expand_definition(&value, name, depth)?;
                let value = if value.is_empty() { outer } else { value };
                if value.is_empty() {
                    let message = if token.argument.is_empty() {
                        format!("{name} is not set")
                    } else {
                        self.expand_text(token.argument, current, depth + 1)?
                    };
                    return Err(Error::MissingRequiredVariable {
                        name: name.to_string(),
                        message,
                    });
                }
                Ok(value)
            }
            None => {
                let value = self.expand_definition(&value, name, depth)?;
                if value.is_empty() { Ok(outer) } else { Ok(value) }
            }
        }
    }

    /// Expand the raw definition of `name` found while substituting.
    fn expand_definition(&self, value: &str, name: &str, depth: usize) -> Result<String> {
        if has_tokens(value) {
            self.expand_text(value, Some(name), depth + 1)
        } else {
            Ok(value.to_string())
        }
    }
}

/// Tidy an expanded string.
///
/// A single stray `}` left by unbalanced references is trimmed, and path
/// lists lose repeated entries.
pub fn sanitize(value: String, platform: Platform) -> String {
    let mut value = value;
    if value.ends_with('}')
        && !value.starts_with("${")
        && value.matches('}').count() > value.matches('{').count()
    {
        value.pop();
    }

    let is_list = match platform {
        Platform::Windows => value.contains(':') || value.contains(';'),
        _ => value.contains(':'),
    };
    let is_path = value.contains('/') || value.contains('\\');
    if is_list && is_path && !value.contains("://") {
        value = platform.dedupe_paths(&value);
    }
    value
}
