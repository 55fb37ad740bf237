#![forbid(unsafe_code)]

//! Scrapes YouTube comments for a channel, a playlist or a list of videos
//! into JSON collections under the data root. Channel scrapes keep a
//! checkpoint so an interrupted run continues where it stopped.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use ytcomments_tools::{
    config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config},
    error::StateDriftError,
    logging,
    prompt::{PresetPrompter, ask_seed_video},
    run::{CancelToken, ChannelSeed, RunReport, Session, StopReason},
    store::JsonFileStore,
    youtube::YoutubeClient,
};

#[derive(Debug, Parser)]
#[command(name = "scrape_comments", about = "Resumable YouTube comment scraper")]
struct Cli {
    /// Directory holding collections and channel state (default: $DATA_ROOT or ./data).
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// Tuning file (default: ./scraper.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape every upload of a channel, newest first, resuming from the last checkpoint.
    Channel(ChannelArgs),
    /// Scrape the given videos into one collection.
    Videos {
        #[arg(long)]
        save_name: String,
        #[arg(required = true)]
        video_ids: Vec<String>,
    },
    /// Scrape the videos of one playlist.
    Playlist {
        playlist_id: String,
        #[arg(long)]
        save_name: String,
        #[arg(long)]
        cap: Option<usize>,
    },
    /// Scrape the videos of every playlist a channel owns.
    ChannelPlaylists {
        channel_id: String,
        #[arg(long)]
        save_name: String,
        #[arg(long)]
        cap: Option<usize>,
    },
    /// Print the ids of the videos stored in a collection.
    ListIds { save_name: String },
}

#[derive(Debug, Args)]
struct ChannelArgs {
    /// Any video uploaded by the channel. Asked for when omitted.
    #[arg(conflicts_with = "channel_id")]
    video_id: Option<String>,
    #[arg(long)]
    channel_id: Option<String>,
    /// Category the collection is filed under when the channel is new.
    #[arg(long)]
    category: Option<String>,
    /// Collection name for a new channel, saved as <category>/<name>_comments.
    #[arg(long)]
    name: Option<String>,
    /// Scrape a fully scraped channel again without asking.
    #[arg(long)]
    rescrape: bool,
    /// Drop the saved position and start from the newest upload.
    #[arg(long)]
    restart: bool,
}

enum Outcome {
    Report(RunReport),
    Ids(Vec<String>),
}

fn execute(command: Command, runtime: RuntimeConfig, cancel: CancelToken) -> Result<Outcome> {
    let client = YoutubeClient::new(
        &runtime.api_base,
        runtime.credentials.clone(),
        &runtime.tuning.http,
    );
    let store = JsonFileStore::new(&runtime.data_root);
    let session = Session::new(client, store, runtime.tuning, cancel);
    let interactive = std::io::stdin().is_terminal();

    let report = match command {
        Command::Channel(args) => {
            let seed = match (args.video_id, args.channel_id) {
                (Some(video_id), _) => ChannelSeed::Video(video_id),
                (None, Some(channel_id)) => ChannelSeed::Channel(channel_id),
                (None, None) if interactive => ChannelSeed::Video(ask_seed_video()?),
                (None, None) => bail!("pass a video id or --channel-id"),
            };
            let prompter = PresetPrompter {
                category: args.category,
                name: args.name,
                rescrape: args.rescrape.then_some(true),
                interactive,
            };
            session.scrape_channel(&seed, &prompter, args.restart)?
        }
        Command::Videos {
            save_name,
            video_ids,
        } => session.scrape_videos(&video_ids, &save_name)?,
        Command::Playlist {
            playlist_id,
            save_name,
            cap,
        } => session.scrape_playlist(&playlist_id, &save_name, cap)?,
        Command::ChannelPlaylists {
            channel_id,
            save_name,
            cap,
        } => session.scrape_channel_playlists(&channel_id, &save_name, cap)?,
        Command::ListIds { save_name } => {
            return Ok(Outcome::Ids(session.collected_video_ids(&save_name)?));
        }
    };
    Ok(Outcome::Report(report))
}

/// Ctrl+C asks the item loop to stop after the current video and save.
/// Further presses only repeat the notice.
fn watch_for_interrupt(cancel: CancelToken) {
    tokio::spawn(async move {
        loop {
            if let Err(err) = signal::ctrl_c().await {
                eprintln!("Failed to install Ctrl+C handler: {err}");
                return;
            }
            eprintln!("\nInterrupted: finishing the current video, then saving.");
            cancel.cancel();
        }
    });
}

fn print_report(report: &RunReport) {
    println!();
    println!("===================================");
    match report.stop {
        StopReason::Completed | StopReason::NothingToDo => println!("Scrape complete"),
        StopReason::AlreadyComplete => println!("Nothing scraped"),
        StopReason::Cancelled | StopReason::Halted(_) => println!("Scrape stopped early"),
    }
    println!("===================================");
    println!("{report}");
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let runtime = resolve_runtime_config(RuntimeOverrides {
        data_root: cli.data_root.clone(),
        env_path: cli.env_file.clone(),
        config_path: cli.config.clone(),
    })?;

    println!("===================================");
    println!("YouTube Comment Scraper");
    println!("===================================");
    println!("Data root: {}", runtime.data_root.display());
    println!();

    let cancel = CancelToken::default();
    watch_for_interrupt(cancel.clone());

    let command = cli.command;
    let outcome = tokio::task::spawn_blocking(move || execute(command, runtime, cancel))
        .await
        .context("scrape task failed")?;
    let outcome = match outcome {
        Err(err) if err.downcast_ref::<StateDriftError>().is_some() => {
            eprintln!(
                "The saved position no longer matches the channel's uploads. \
                 Rerun with --restart to scrape from the newest upload; collected videos are skipped."
            );
            return Err(err);
        }
        other => other?,
    };

    match outcome {
        Outcome::Report(report) => print_report(&report),
        Outcome::Ids(ids) => {
            for id in &ids {
                println!("{id}");
            }
            eprintln!("{} video ids", ids.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn channel_flags_parse() {
        let cli = Cli::try_parse_from([
            "scrape_comments",
            "--data-root",
            "/srv/data",
            "channel",
            "pFPd_Dhs51s",
            "--category",
            "lb",
            "--name",
            "example",
            "--restart",
        ])
        .unwrap();
        assert_eq!(cli.data_root, Some(PathBuf::from("/srv/data")));
        let Command::Channel(args) = cli.command else {
            panic!("expected channel command");
        };
        assert_eq!(args.video_id.as_deref(), Some("pFPd_Dhs51s"));
        assert_eq!(args.category.as_deref(), Some("lb"));
        assert!(args.restart);
        assert!(!args.rescrape);
    }

    #[test]
    fn video_and_channel_seed_conflict() {
        let result = Cli::try_parse_from([
            "scrape_comments",
            "channel",
            "vid",
            "--channel-id",
            "UC1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn videos_command_needs_ids() {
        assert!(Cli::try_parse_from(["scrape_comments", "videos", "--save-name", "x/y"]).is_err());
        let cli =
            Cli::try_parse_from(["scrape_comments", "videos", "--save-name", "x/y", "a", "b"])
                .unwrap();
        let Command::Videos { video_ids, .. } = cli.command else {
            panic!("expected videos command");
        };
        assert_eq!(video_ids, vec!["a", "b"]);
    }
}
