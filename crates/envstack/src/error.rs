// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for envstack operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with envstack Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during envstack operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// A requested or included stack matched no files
    #[error("Stack not found: {0}")]
    #[diagnostic(
        code(envstack::template_not_found),
        help("Check that {0}.env exists in one of the ENVPATH directories")
    )]
    TemplateNotFound(String),

    /// A stack includes itself, directly or through other stacks
    #[error("Cyclic include detected for stack '{name}': {}", .chain.join(" -> "))]
    #[diagnostic(
        code(envstack::cyclic_include),
        help("Remove the circular reference from the include lists")
    )]
    CyclicInclude { name: String, chain: Vec<String> },

    /// Variable expansion did not terminate
    #[error("Cyclical reference detected in {0}")]
    #[diagnostic(
        code(envstack::cyclical_reference),
        help("A variable refers back to itself through other variables without a default")
    )]
    CyclicalReference(String),

    /// A `${NAME:?message}` token found no value
    #[error("{message}")]
    #[diagnostic(code(envstack::missing_required_variable))]
    MissingRequiredVariable { name: String, message: String },

    /// Stack file content could not be parsed
    #[error("Invalid stack file {path:?}{}: {reason}", location(.line, .column))]
    #[diagnostic(
        code(envstack::invalid_stack),
        help("Stack files need 'all', 'darwin', 'linux' and 'windows' mappings")
    )]
    InvalidStack {
        path: PathBuf,
        line: Option<usize>,
        column: Option<usize>,
        reason: String,
    },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(envstack::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to write file
    #[error("Failed to write file: {path:?}")]
    #[diagnostic(code(envstack::write_failed))]
    WriteFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Key material that cannot be used for encoding
    #[error("Invalid key in {name}: {reason}")]
    #[diagnostic(
        code(envstack::invalid_key),
        help("Generate new keys with 'envstack keygen'")
    )]
    InvalidKey { name: String, reason: String },

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(envstack::io_error))]
    Io(#[from] std::io::Error),
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" at line {line} column {column}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}
