use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use savant_video::{Config, PlayOfInterest, VideoPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Savant Video")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Resolve and download Baseball Savant pitch videos")
        .arg(
            Arg::new("play")
                .short('p')
                .long("play")
                .value_name("GAME:INNING:AT_BAT:PITCH")
                .help("Pitch to download (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("plays-file")
                .short('f')
                .long("plays-file")
                .value_name("FILE")
                .help("JSON array of {game_id, inning, at_bat_number, pitch_number}"),
        )
        .arg(
            Arg::new("game")
                .short('g')
                .long("game")
                .value_name("GAME_ID")
                .help("Download every pitch of one game")
                .conflicts_with_all(["play", "plays-file"]),
        )
        .arg(
            Arg::new("sv-id")
                .long("sv-id")
                .value_name("SV_ID")
                .help("Only pitches with this sv_id (repeatable, needs --game)")
                .requires("game")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for downloaded videos"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let default_filter = if verbose {
        "savant_video=debug,warn"
    } else {
        "savant_video=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.download.output_dir = PathBuf::from(dir);
    }

    info!("🚀 Savant Video starting...");
    info!("{}", config.summary());

    let pipeline = VideoPipeline::new(&config)?;

    let result = if let Some(game) = matches.get_one::<String>("game") {
        let game_id: u64 = game
            .parse()
            .with_context(|| format!("invalid game id '{}'", game))?;
        let sv_ids: Option<Vec<String>> = matches
            .get_many::<String>("sv-id")
            .map(|values| values.cloned().collect());
        pipeline.run_game(game_id, sv_ids.as_deref()).await
    } else {
        let plays = collect_plays(&matches).await?;
        if plays.is_empty() {
            return Err(anyhow!("nothing to do: pass --play, --plays-file or --game"));
        }
        pipeline.run(&plays).await
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!("Run aborted: {}", e);
            return Err(e.into());
        }
    };

    info!("✅ Downloaded: {}", report.downloaded());
    info!(
        "📊 Requested {}, matched {}, with video {}",
        report.requested, report.resolved, report.with_video_url
    );
    for file in &report.files {
        println!("{}", file.display());
    }

    Ok(())
}

async fn collect_plays(matches: &clap::ArgMatches) -> Result<Vec<PlayOfInterest>> {
    let mut plays = Vec::new();

    if let Some(values) = matches.get_many::<String>("play") {
        for value in values {
            plays.push(value.parse::<PlayOfInterest>().map_err(|e| anyhow!(e))?);
        }
    }

    if let Some(path) = matches.get_one::<String>("plays-file") {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path))?;
        let from_file: Vec<PlayOfInterest> =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;
        plays.extend(from_file);
    }

    Ok(plays)
}
