//! Drive the sticker keyboard core from a terminal.
//!
//! Usage:
//!   ewesticker --stickers ./stickers packs
//!   ewesticker --stickers ./stickers send cats/wave.webp --accept image/png
//!   ewesticker --stickers ./stickers recent --json
//!
//! State (caches, active pack) lives in a TOML preference file, so repeated
//! invocations behave like successive keyboard sessions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ewesticker_core::{
    Config, InputTarget, KeyboardSession, PackTab, PreferenceStore, TapOutcome, TomlPreferences,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ewesticker")]
#[command(about = "Send stickers through the EweSticker keyboard core")]
struct Args {
    /// Sticker root directory (one subdirectory per pack)
    #[arg(short, long)]
    stickers: Option<PathBuf>,

    /// Preference file holding caches and the active pack
    #[arg(short, long, default_value = "ewesticker-prefs.toml")]
    prefs: PathBuf,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loaded packs
    Packs {
        #[arg(long)]
        json: bool,
    },
    /// Send a sticker to a simulated text field
    Send {
        /// Sticker path, absolute or relative to the sticker root
        sticker: PathBuf,

        /// Mime types the text field accepts (repeatable, wildcards allowed)
        #[arg(short, long = "accept", default_value = "image/png")]
        accept: Vec<String>,

        /// Package name of the receiving app
        #[arg(long, default_value = "org.example.chat")]
        package: String,
    },
    /// Show recently sent stickers, newest first
    Recent {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML, followed by the stored
    /// preferences
    Config,
}

#[derive(Serialize)]
struct PackSummary {
    name: String,
    stickers: usize,
    thumbnail: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_toml(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = &args.stickers {
        config.sticker_dir = dir.clone();
    }

    let prefs = TomlPreferences::open(&args.prefs)?;
    config.apply_preferences(&prefs);
    debug!(sticker_dir = %config.sticker_dir.display(), "configuration ready");

    let mut session = KeyboardSession::start(config, prefs)?;
    session.activate_initial();

    match args.command {
        Command::Packs { json } => list_packs(&session, json)?,
        Command::Send {
            sticker,
            accept,
            package,
        } => send(&mut session, sticker, &accept, package)?,
        Command::Recent { json } => list_recent(&session, json)?,
        Command::Config => show_config(&session)?,
    }

    session.end()?;
    Ok(())
}

fn list_packs<S: PreferenceStore>(session: &KeyboardSession<S>, json: bool) -> Result<()> {
    let summaries: Vec<PackSummary> = session
        .pack_tabs()
        .into_iter()
        .filter_map(|tab| match tab {
            PackTab::Pack { name, thumbnail } => {
                let stickers = session.pack(&name).map_or(0, |p| p.len());
                Some(PackSummary {
                    name,
                    stickers,
                    thumbnail,
                })
            }
            _ => None,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("(no sticker packs found)");
    }
    for s in &summaries {
        println!("{:<24} {:>4} stickers  {}", s.name, s.stickers, s.thumbnail.display());
    }
    Ok(())
}

fn send<S: PreferenceStore>(
    session: &mut KeyboardSession<S>,
    sticker: PathBuf,
    accept: &[String],
    package: String,
) -> Result<()> {
    let sticker = if sticker.is_absolute() {
        sticker
    } else {
        session.config().sticker_dir.join(sticker)
    };
    anyhow::ensure!(sticker.is_file(), "no such sticker: {}", sticker.display());

    session.on_focus(InputTarget {
        package_name: Some(package),
        content_mime_types: accept.to_vec(),
    });

    match session.tap(&sticker) {
        TapOutcome::Converting(pending) => {
            println!("converting {} to PNG...", sticker.display());
            session.finish_conversion(pending);
        }
        TapOutcome::Committed(_) | TapOutcome::Unsupported(_) | TapOutcome::AlreadyConverting => {}
        TapOutcome::Failed(err) => eprintln!("error: {}", err),
    }

    let ctx = session.context_mut();
    for notice in ctx.take_notices() {
        println!("! {}", notice);
    }
    if !ctx.has_commit() {
        println!("nothing committed");
    }
    for commit in ctx.take_commits() {
        println!(
            "committed {} ({}) grant_read={}",
            commit.path.display(),
            commit.mime_type,
            commit.grant_read
        );
    }

    session.on_blur()
}

fn show_config(session: &KeyboardSession<TomlPreferences>) -> Result<()> {
    print!("{}", session.config().to_toml_string()?);
    let prefs = session.prefs();
    println!("\n# preferences ({})", prefs.path().display());
    for (key, value) in prefs.entries() {
        println!("# {} = {:?}", key, value);
    }
    Ok(())
}

fn list_recent<S: PreferenceStore>(session: &KeyboardSession<S>, json: bool) -> Result<()> {
    let mut recent = session.recent_cache().to_ordered_list();
    recent.reverse();
    if json {
        println!("{}", serde_json::to_string_pretty(&recent)?);
        return Ok(());
    }
    for (i, path) in recent.iter().enumerate() {
        println!("{:>3}. {}", i + 1, path);
    }
    Ok(())
}
