// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Variable references inside values.
//!
//! Recognized forms are `$NAME`, `${NAME}`, `${NAME:=default}`,
//! `${NAME:-default}` and `${NAME:?message}`. A modifier argument may hold
//! further references, so `${ROOT:=${HOME}/${PROJECT}}` is a single token.

use std::fmt;
use std::ops::Range;

use crate::value::Mapping;

#[cfg(test)]
#[path = "./template_test.rs"]
mod template_test;

/// The suffix of a braced reference controlling defaults and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// `:=`
    Assign,
    /// `:-`
    Default,
    /// `:?`
    Required,
}

impl Modifier {
    /// Whether the argument supplies a fallback value.
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Assign | Self::Default)
    }
}

/// One variable reference found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Byte range of the whole reference.
    pub span: Range<usize>,
    pub name: &'a str,
    pub modifier: Option<Modifier>,
    /// Text after the modifier, empty when there is none.
    pub argument: &'a str,
}

/// A string that may contain variable references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TemplateString(String);

impl TemplateString {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// All references, in order of appearance.
    pub fn tokens(&self) -> Vec<Token<'_>> {
        scan(&self.0)
    }

    pub fn has_tokens(&self) -> bool {
        has_tokens(&self.0)
    }

    /// Names of referenced variables, first appearance first, including
    /// those nested inside modifier arguments.
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_names(&self.0, &mut names);
        names
    }

    /// Rebuild the string, replacing every reference with the result of `f`.
    pub fn replace_with<F, E>(&self, mut f: F) -> Result<String, E>
    where
        F: FnMut(&Token<'_>) -> Result<String, E>,
    {
        let mut out = String::with_capacity(self.0.len());
        let mut last = 0;
        for token in self.tokens() {
            out.push_str(&self.0[last..token.span.start]);
            out.push_str(&f(&token)?);
            last = token.span.end;
        }
        out.push_str(&self.0[last..]);
        Ok(out)
    }

    /// Single pass substitution from a plain mapping.
    ///
    /// Missing names become empty, default modifiers apply when the value
    /// is empty. Required modifiers are not enforced here.
    pub fn substitute(&self, values: &Mapping) -> String {
        let result: Result<String, std::convert::Infallible> = self.replace_with(|token| {
            let value = values
                .get(token.name)
                .map(|v| v.to_text())
                .unwrap_or_default();
            match token.modifier {
                Some(modifier) if modifier.is_default() && value.is_empty() => {
                    Ok(TemplateString::new(token.argument).substitute(values))
                }
                _ => Ok(value),
            }
        });
        match result {
            Ok(text) => text,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for TemplateString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateString {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for TemplateString {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Whether `text` contains at least one reference.
pub fn has_tokens(text: &str) -> bool {
    text.bytes()
        .enumerate()
        .any(|(i, b)| b == b'$' && parse_token(text, i).is_some())
}

/// Find every top level reference in `text`.
pub fn scan(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < text.len() {
        if text.as_bytes()[i] != b'$' {
            i += 1;
            continue;
        }
        match parse_token(text, i) {
            Some(token) => {
                i = token.span.end;
                tokens.push(token);
            }
            None => i += 1,
        }
    }
    tokens
}

fn collect_names<'a>(text: &'a str, names: &mut Vec<&'a str>) {
    for token in scan(text) {
        if !names.contains(&token.name) {
            names.push(token.name);
        }
        collect_names(token.argument, names);
    }
}

fn parse_token(text: &str, start: usize) -> Option<Token<'_>> {
    let bytes = text.as_bytes();
    let braced = bytes.get(start + 1) == Some(&b'{');
    let name_start = if braced { start + 2 } else { start + 1 };
    let name_end = name_end(bytes, name_start)?;
    let name = &text[name_start..name_end];

    if !braced {
        return Some(Token {
            span: start..name_end,
            name,
            modifier: None,
            argument: "",
        });
    }

    match bytes.get(name_end)? {
        b'}' => Some(Token {
            span: start..name_end + 1,
            name,
            modifier: None,
            argument: "",
        }),
        b':' => {
            let modifier = match bytes.get(name_end + 1)? {
                b'=' => Modifier::Assign,
                b'-' => Modifier::Default,
                b'?' => Modifier::Required,
                _ => return None,
            };
            let argument_start = name_end + 2;
            let argument_end = matching_brace(bytes, argument_start)?;
            Some(Token {
                span: start..argument_end + 1,
                name,
                modifier: Some(modifier),
                argument: &text[argument_start..argument_end],
            })
        }
        _ => None,
    }
}

fn name_end(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    Some(end)
}

/// Position of the `}` closing an argument, skipping nested `${...}`.
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
                continue;
            }
            b'}' if depth == 0 => return Some(i),
            b'}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}
