// Copyright 2025 eraflo
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

// Reconnect runtime
// Replays a recorded landmark stream through a session and prints what the
// collaborator would have received.

mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reconnect_control::{ExerciseSpec, ReconnectConfig};
use reconnect_core::SessionDomain;
use replay::ReplayOptions;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "reconnect-runtime")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream a JSONL landmark recording through a session
    Replay {
        /// One JSON array of points per line, `null` for no detection
        #[arg(long)]
        frames: PathBuf,

        /// Built-in exercise id
        #[arg(long, conflicts_with = "schema", required_unless_present = "schema")]
        exercise: Option<String>,

        /// Universal exercise schema (JSON)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Landmark model: BODY, HAND or FACE
        #[arg(long, default_value = "BODY")]
        domain: String,

        /// Session id (a UUID is generated when omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report service base URL, overrides the configuration
        #[arg(long)]
        endpoint: Option<String>,
    },
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay {
            frames,
            exercise,
            schema,
            domain,
            session_id,
            config,
            endpoint,
        } => {
            let config = ReconnectConfig::load_or_default(config.as_deref()).context("invalid configuration")?;
            let domain = domain
                .parse::<SessionDomain>()
                .map_err(anyhow::Error::msg)
                .context("invalid --domain")?;
            let exercise = match (exercise, schema) {
                (_, Some(path)) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read schema {}", path.display()))?;
                    ExerciseSpec::from_schema_json(&text)
                        .with_context(|| format!("invalid schema {}", path.display()))?
                }
                (Some(id), None) => ExerciseSpec::Builtin(id),
                (None, None) => anyhow::bail!("either --exercise or --schema is required"),
            };
            let text = std::fs::read_to_string(&frames)
                .with_context(|| format!("failed to read frames {}", frames.display()))?;
            let recording = replay::parse_frames(&text)?;

            let endpoint = endpoint.or_else(|| config.telemetry.endpoint.clone());
            let uploader = reconnect_telemetry::uploader_for(endpoint.as_deref(), config.request_timeout());

            let options = ReplayOptions {
                session_id,
                domain,
                exercise,
            };
            let stdout = std::io::stdout();
            replay::run(config, options, recording, uploader, &mut stdout.lock())?;
        }
    }
    Ok(())
}
