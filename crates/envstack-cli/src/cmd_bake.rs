// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envstack bake` command.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use envstack::bake::{BakeOptions, bake, to_yaml, write_stack};
use envstack::KeyContext;
use miette::Result;

use crate::StackFlags;

/// Flatten stacks into a single stack file
#[derive(Debug, Args)]
pub struct CmdBake {
    #[clap(flatten)]
    stack: StackFlags,

    /// Write the stack file here instead of printing it
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,

    /// Keep this many layers and their includes, 0 flattens everything
    #[clap(short = 'd', long, default_value_t = 0)]
    depth: i32,

    /// Encrypt every value that is not already encoded
    #[clap(short = 'e', long)]
    encrypt: bool,
}

impl CmdBake {
    pub fn run(&mut self) -> Result<i32> {
        let options = self.stack.discovery_options()?;
        let sources = envstack::resolve_sources(self.stack.stacks().as_slice(), &options)?;
        if sources.is_empty() {
            tracing::warn!(stacks = ?self.stack.stacks, "no stack files found");
        }

        let baked = bake(
            &sources,
            &BakeOptions {
                depth: self.depth,
                encrypt: self.encrypt,
            },
        )?;
        let keys = KeyContext::from_env();

        match &self.output {
            Some(path) => {
                write_stack(path, &baked, &keys)?;
                eprintln!("{} {}", "baked".green(), path.display());
            }
            None => print!("{}", to_yaml(&baked, &keys)?),
        }
        Ok(0)
    }
}
