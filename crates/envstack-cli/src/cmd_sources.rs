// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envstack sources` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

use crate::StackFlags;

/// List the stack files that make up an environment
#[derive(Debug, Args)]
pub struct CmdSources {
    #[clap(flatten)]
    stack: StackFlags,
}

impl CmdSources {
    pub fn run(&mut self) -> Result<i32> {
        let options = self.stack.discovery_options()?;
        let sources = envstack::resolve_sources(self.stack.stacks().as_slice(), &options)?;

        println!("{}", "Stack Files:".bold());
        println!();
        if sources.is_empty() {
            println!("  {}", "(no stack files found)".dimmed());
        }
        for (i, source) in sources.iter().enumerate() {
            let includes = source.includes()?;
            let marker = if includes.is_empty() {
                String::new()
            } else {
                format!(" [includes: {}]", includes.join(", "))
            };
            println!(
                "  {}. {}{}",
                i + 1,
                source.path().display().to_string().cyan(),
                marker.blue()
            );
        }

        println!();
        println!("Total: {} file(s)", sources.len());
        Ok(0)
    }
}
