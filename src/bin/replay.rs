//! room-sync-replay binary
//!
//! Replays a recorded scenario (rooms, joins, entity events, messages)
//! through the sync core and prints where the client ended up as JSON.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                                   | Default          | Description                       |
//! |---------------------------------------|------------------|-----------------------------------|
//! | `ROOM_SYNC__SCENE_PRELOADER_PREFIX`   | `ScenePreloader` | Loading-stage context key prefix  |
//! | `ROOM_SYNC__UI__RIGHT_BOX`            | `true`           | Create the player-name box        |
//! | `ROOM_SYNC__UI__SCENE_LABEL`          | `true`           | Create the scene label            |
//! | `ROOM_SYNC__UI__PLAYER_STATS`         | `true`           | Create the stats panel            |
//! | `REPLAY_PRELOAD_DELAY_MS` (CLI/env)   | `10`             | Simulated preload duration        |

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use room_sync::{
    replay::{self, ReplayOptions, Scenario},
    ClientConfig,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "room-sync-replay", about = "Replay room traffic through the sync core", version)]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Client config file (TOML, optional)
    #[arg(long, env = "REPLAY_CONFIG", default_value = "room-sync.toml")]
    config: PathBuf,

    /// Simulated preload duration in milliseconds
    #[arg(long, env = "REPLAY_PRELOAD_DELAY_MS", default_value_t = 10)]
    preload_delay_ms: u64,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

fn load_config(path: &Path) -> Result<ClientConfig> {
    config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("ROOM_SYNC").separator("__"))
        .build()
        .with_context(|| format!("Failed to load config from {}", path.display()))?
        .try_deserialize()
        .context("Invalid client config")
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("room_sync=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    let raw = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("Failed to read scenario {}", args.scenario.display()))?;
    let scenario = Scenario::from_json(&raw).context("Invalid scenario file")?;

    log::info!(
        "Replaying {} ({} rooms, {} steps, preload delay {}ms)",
        args.scenario.display(),
        scenario.rooms.len(),
        scenario.steps.len(),
        args.preload_delay_ms,
    );

    let options = ReplayOptions {
        preload_delay: Duration::from_millis(args.preload_delay_ms),
    };

    let report = tokio::select! {
        result = replay::run(scenario, config, options) => result.context("Replay aborted")?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Replay interrupted (SIGINT)");
            return Ok(());
        }
    };

    let out = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("Failed to serialise report")?;
    println!("{}", out);
    Ok(())
}
