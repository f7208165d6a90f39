// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Flattening layered sources into a single stack file.

use std::path::Path;

use crate::codec::{Codec, KeyContext};
use crate::environment::Environment;
use crate::expand::Expander;
use crate::node::TypedNode;
use crate::stack::{Source, StackFile};
use crate::template::TemplateString;
use crate::value::{Mapping, Value};
use crate::{Error, Platform, Result, SHEBANG};

#[cfg(test)]
#[path = "./bake_test.rs"]
mod bake_test;

/// Options for [`bake`].
#[derive(Debug, Clone, Default)]
pub struct BakeOptions {
    /// Number of layers to keep from the end of the source list.
    /// Zero or less flattens everything and drops the includes.
    pub depth: i32,

    /// Wrap every plain value in an `!encrypt` node.
    pub encrypt: bool,
}

/// Bake `sources` using the process environment for self references.
pub fn bake(sources: &[Source], options: &BakeOptions) -> Result<StackFile> {
    bake_with(sources, options, &Expander::from_env())
}

/// Merge `sources` into one stack file.
///
/// When fully flattening, a variable that extends its own value from an
/// earlier layer (`PATH: /bin:${PATH}`) is written already resolved, since
/// the layer it extended is no longer included.
pub fn bake_with(sources: &[Source], options: &BakeOptions, expander: &Expander) -> Result<StackFile> {
    let flatten = options.depth <= 0;
    let retained = if flatten {
        sources
    } else {
        let keep = usize::try_from(options.depth).unwrap_or(usize::MAX);
        &sources[sources.len().saturating_sub(keep)..]
    };
    let include = match retained.first() {
        Some(deepest) if !flatten => deepest.includes()?,
        _ => Vec::new(),
    };
    tracing::debug!(layers = retained.len(), ?include, "baking sources");

    let mut sections: [Mapping; 3] = Default::default();
    for (platform, section) in Platform::ALL.into_iter().zip(sections.iter_mut()) {
        let env = Environment::merge_sources(retained, platform)?;
        let mut values = env.values().clone();
        if flatten {
            inline_self_references(&env, &mut values, expander)?;
        }
        if options.encrypt {
            values = encrypt_mapping(values);
        }
        *section = values;
    }

    Ok(partition(include, sections))
}

/// Replace layered self references by their resolved values.
fn inline_self_references(env: &Environment, values: &mut Mapping, expander: &Expander) -> Result<()> {
    let layers = env
        .sources()
        .iter()
        .map(|source| source.load(env.platform()))
        .collect::<Result<Vec<_>>>()?;

    let mut resolved: Option<Mapping> = None;
    for (key, value) in values.iter_mut() {
        let Value::Str(text) = value else {
            continue;
        };
        if !TemplateString::new(text.as_str()).referenced_names().contains(&key.as_str()) {
            continue;
        }
        let definitions = layers.iter().filter(|layer| layer.contains_key(key)).count();
        if definitions < 2 {
            continue;
        }
        if resolved.is_none() {
            resolved = Some(expander.resolve(env)?.into_values());
        }
        if let Some(inlined) = resolved.as_ref().and_then(|r| r.get(key)) {
            tracing::debug!(%key, "inlining self reference");
            *value = inlined.clone();
        }
    }
    Ok(())
}

/// Wrap every value of `env` that is not already typed in a pending
/// `!encrypt` node.
pub fn encrypt_environ(env: &Environment) -> Environment {
    env.with_values(encrypt_mapping(env.values().clone()))
}

fn encrypt_mapping(values: Mapping) -> Mapping {
    values
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Node(_) => value,
                other => Value::Node(TypedNode::pending(Codec::Encrypt, other.to_text())),
            };
            (key, value)
        })
        .collect()
}

/// Split per platform values into a stack file.
///
/// A variable moves into `all` only when every platform holds the same
/// value for it. `sections` are in [`Platform::ALL`] order; each keeps its
/// complete mapping, the writer omits what `all` already provides.
pub fn partition(include: Vec<String>, sections: [Mapping; 3]) -> StackFile {
    let [darwin, linux, windows] = sections;
    let all: Mapping = darwin
        .iter()
        .filter(|(key, value)| linux.get(*key) == Some(*value) && windows.get(*key) == Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    StackFile {
        include,
        all,
        darwin: Some(darwin),
        linux: Some(linux),
        windows: Some(windows),
    }
}

/// Render a stack file as YAML, encoding pending nodes with `keys`.
pub fn to_yaml(stack: &StackFile, keys: &KeyContext) -> Result<String> {
    let include: Vec<String> = stack.include.iter().map(|name| scalar(name)).collect();
    let mut lines = vec![
        SHEBANG.to_string(),
        format!("include: [{}]", include.join(", ")),
    ];

    if stack.all.is_empty() {
        lines.push("all: &all {}".to_string());
    } else {
        lines.push("all: &all".to_string());
        lines.extend(entries(stack.all.iter(), keys)?);
    }

    for platform in Platform::ALL {
        lines.push(format!("{platform}:"));
        lines.push("  <<: *all".to_string());
        if let Some(section) = stack.platform(platform) {
            let own = section
                .iter()
                .filter(|(key, value)| stack.all.get(*key) != Some(*value));
            lines.extend(entries(own, keys)?);
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

/// Write a stack file to disk and make it executable.
pub fn write_stack<P: AsRef<Path>>(path: P, stack: &StackFile, keys: &KeyContext) -> Result<()> {
    let path = path.as_ref();
    let yaml = to_yaml(stack, keys)?;
    std::fs::write(path, yaml).map_err(|error| Error::WriteFailed {
        path: path.to_path_buf(),
        error,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let executable = std::fs::Permissions::from_mode(0o755);
        if let Err(err) = std::fs::set_permissions(path, executable) {
            tracing::debug!(?path, "failed to mark stack file executable: {err}");
        }
    }
    tracing::info!(?path, "wrote stack file");
    Ok(())
}

/// Indented `KEY: value` lines sorted by key.
fn entries<'a, I>(entries: I, keys: &KeyContext) -> Result<Vec<String>>
where
    I: Iterator<Item = (&'a String, &'a Value)>,
{
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(key, value)| Ok(format!("  {}: {}", scalar(key), format_value(value, keys)?)))
        .collect()
}

/// A value as written after `KEY: ` in a stack file.
pub fn format_value(value: &Value, keys: &KeyContext) -> Result<String> {
    match value {
        Value::Str(text) => Ok(scalar(text)),
        Value::List(_) | Value::Map(_) => Ok(value.to_json().to_string()),
        Value::Node(node) => {
            let encoded = scalar(&node.encoded(keys)?);
            Ok(match node.codec().tag() {
                Some(tag) => format!("{tag} {encoded}"),
                None => encoded,
            })
        }
    }
}

/// Text as a YAML scalar, quoted unless it reads back unchanged as a
/// plain string.
fn scalar(text: &str) -> String {
    let plain = !text.contains(['\n', '\r', '\t'])
        && matches!(
            serde_yaml::from_str::<serde_yaml::Value>(text),
            Ok(serde_yaml::Value::String(parsed)) if parsed == text
        );
    if plain {
        text.to_string()
    } else {
        serde_json::Value::from(text).to_string()
    }
}
