// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command line host for the container resources policy.
//!
//! Reads a settings document or a validation request from a file or stdin and
//! prints the JSON response on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use container_resources_policy::policy;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// Caps container cpu and memory limits and requests in Kubernetes workloads
#[derive(Parser, Debug)]
#[command(name = "container-resources-policy")]
#[command(version)]
#[command(about = "Caps container cpu and memory limits and requests", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a settings document
    ValidateSettings {
        /// Path to the settings JSON, or "-" for stdin
        #[arg(long, default_value = "-")]
        settings: PathBuf,
    },
    /// Evaluate a validation request
    Validate {
        /// Path to the validation request JSON, or "-" for stdin
        #[arg(long, default_value = "-")]
        request: PathBuf,
    },
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let output = match args.command {
        Commands::ValidateSettings { settings } => {
            debug!(path = %settings.display(), "reading settings");
            let payload = read_input(&settings)?;
            serde_json::to_string(&policy::validate_settings(&payload))
        }
        Commands::Validate { request } => {
            debug!(path = %request.display(), "reading validation request");
            let payload = read_input(&request)?;
            serde_json::to_string(&policy::validate(&payload))
        }
    }
    .context("failed to encode response")?;

    println!("{}", output);
    Ok(())
}
