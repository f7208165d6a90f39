// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envstack encrypt` command.

use clap::Args;
use envstack::bake::format_value;
use envstack::{KeyContext, encrypt_environ};
use miette::Result;

use crate::StackFlags;

/// Print variables as encrypted stack file entries
#[derive(Debug, Args)]
pub struct CmdEncrypt {
    #[clap(flatten)]
    stack: StackFlags,

    /// Only encrypt these variables
    #[clap(short = 'k', long = "key")]
    keys: Vec<String>,
}

impl CmdEncrypt {
    pub fn run(&mut self) -> Result<i32> {
        let env = self.stack.load()?;
        let encrypted = encrypt_environ(&env);
        let keys = KeyContext::from_env();

        for (key, value) in encrypted.iter() {
            if !self.keys.is_empty() && !self.keys.contains(key) {
                continue;
            }
            println!("{key}: {}", format_value(value, &keys)?);
        }
        Ok(0)
    }
}
