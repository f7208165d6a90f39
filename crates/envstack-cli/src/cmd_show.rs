// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envstack show` command.

use clap::Args;
use colored::Colorize;
use envstack::Mapping;
use miette::{IntoDiagnostic, Result};

use crate::StackFlags;

/// Display the merged, unresolved variables
#[derive(Debug, Args)]
pub struct CmdShow {
    #[clap(flatten)]
    stack: StackFlags,

    /// Only show these variables
    #[clap(short = 'k', long = "key")]
    keys: Vec<String>,

    /// Output format: table, json
    #[clap(long, default_value = "table")]
    format: String,
}

impl CmdShow {
    pub fn run(&mut self) -> Result<i32> {
        let env = self.stack.load()?;
        print_values(env.values(), &self.keys, &self.format)?;
        Ok(0)
    }
}

/// Print variables as `KEY=value` lines or a JSON object.
pub fn print_values(values: &Mapping, keys: &[String], format: &str) -> Result<()> {
    let selected = values
        .iter()
        .filter(|(key, _)| keys.is_empty() || keys.contains(*key));

    if format == "json" {
        let object: serde_json::Map<String, serde_json::Value> = selected
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();
        let text = serde_json::to_string_pretty(&object).into_diagnostic()?;
        println!("{text}");
        return Ok(());
    }

    let mut count = 0;
    for (key, value) in selected {
        println!("{}={}", key.cyan(), value.to_text().green());
        count += 1;
    }
    if count == 0 {
        println!("{}", "(no variables)".dimmed());
    }
    Ok(())
}
