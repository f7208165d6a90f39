// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envstack trace` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

use crate::StackFlags;

/// Report which stack file sets each variable
#[derive(Debug, Args)]
pub struct CmdTrace {
    #[clap(flatten)]
    stack: StackFlags,

    /// Variables to trace
    #[clap(short = 't', long = "var", required = true)]
    vars: Vec<String>,
}

impl CmdTrace {
    pub fn run(&mut self) -> Result<i32> {
        let env = self.stack.load()?;
        let mut code = 0;
        for var in &self.vars {
            match env.trace(var)? {
                Some(source) => {
                    println!("{}: {}", var.cyan(), source.path().display());
                }
                None => {
                    println!("{}: {}", var.cyan(), "not set".dimmed());
                    code = 1;
                }
            }
        }
        Ok(code)
    }
}
