//! `audiobook-mix`: build, remix and maintain episode audio from the command line.

mod manifest;
mod reporter;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use audiobook_mix_core::storage::timing_migration::{migrate_timings, split_page_texts, MigrationOptions};
use audiobook_mix_core::{
    AssemblyJob, BackgroundTrack, EpisodeAudio, EpisodePipeline, PipelineConfiguration, PipelineDelegate,
    TimingRecord,
};

use crate::manifest::EpisodeManifest;
use crate::reporter::LogDelegate;

#[derive(Parser, Debug)]
#[command(name = "audiobook-mix")]
#[command(about = "Assemble page clips into episode audio with background music")]
#[command(version)]
struct Args {
    /// Pipeline configuration (JSON); defaults apply when omitted
    #[arg(short, long, global = true, env = "AUDIOBOOK_MIX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an episode from a manifest and print its metadata
    Assemble {
        /// Episode manifest (JSON)
        manifest: PathBuf,

        /// Directory for the finished episode
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Give up (and cancel) after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Lay background tracks under an existing episode file
    Remix {
        /// Existing episode WAV
        episode: PathBuf,

        /// Page timings of the episode (JSON array)
        #[arg(long)]
        timings: PathBuf,

        /// Background tracks (JSON array of {audioPath, startTime, endTime, volume})
        #[arg(long)]
        tracks: PathBuf,

        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Normalize stored page timings into structured records
    MigrateTimings {
        /// JSON file holding the stored value (array, or a string containing one)
        input: PathBuf,

        /// Episode text with `---` page separators, used to fill missing texts
        #[arg(long)]
        text: Option<PathBuf>,

        /// Fill texts that are still missing with "[페이지 N]"
        #[arg(long)]
        placeholder: bool,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Assemble {
            manifest,
            out_dir,
            timeout_secs,
        } => assemble(config, &manifest, out_dir, timeout_secs),
        Command::Remix {
            episode,
            timings,
            tracks,
            out_dir,
        } => remix(config, &episode, &timings, &tracks, out_dir),
        Command::MigrateTimings {
            input,
            text,
            placeholder,
            output,
        } => migrate(&input, text.as_deref(), placeholder, output.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfiguration> {
    match path {
        Some(path) => PipelineConfiguration::load(path).with_context(|| format!("invalid configuration {}", path.display())),
        None => Ok(PipelineConfiguration::default()),
    }
}

fn assemble(
    mut config: PipelineConfiguration,
    manifest_path: &Path,
    out_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    if let Some(dir) = out_dir {
        config.output_directory = dir;
    }
    let request = EpisodeManifest::load(manifest_path)?.into_request();
    let pipeline = EpisodePipeline::new(config)?;

    let delegate: Arc<dyn PipelineDelegate> = Arc::new(LogDelegate);
    let job = AssemblyJob::spawn(pipeline, request, Some(delegate))?;
    let result = match timeout_secs {
        Some(secs) => job.wait_timeout(Duration::from_secs(secs)).inspect_err(|_| job.cancel()),
        None => job.wait(),
    };
    let episode = result.context("episode build failed")?;

    print_episode(&episode)
}

fn remix(
    mut config: PipelineConfiguration,
    episode: &Path,
    timings_path: &Path,
    tracks_path: &Path,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    if let Some(dir) = out_dir {
        config.output_directory = dir;
    }
    let timings: Vec<TimingRecord> = read_json(timings_path)?;
    let tracks: Vec<BackgroundTrack> = read_json(tracks_path)?;

    let pipeline = EpisodePipeline::new(config)?;
    let remixed = pipeline
        .mix_existing(episode, timings, &tracks)
        .with_context(|| format!("failed to remix {}", episode.display()))?;
    for layer in &remixed.skipped_layers {
        log::warn!("Layer {} skipped: {}", layer.name, layer.error);
    }

    print_episode(&remixed)
}

fn migrate(input: &Path, text: Option<&Path>, placeholder: bool, output: Option<&Path>) -> Result<()> {
    let value: serde_json::Value = read_json(input)?;
    let page_texts = match text {
        Some(path) => Some(split_page_texts(
            &fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?,
        )),
        None => None,
    };

    let options = MigrationOptions {
        page_texts,
        placeholder_text: placeholder,
    };
    let (records, report) = migrate_timings(&value, &options)?;
    if report.already_current {
        log::info!("{}: already current", input.display());
    } else {
        log::info!(
            "{}: {} records (from string: {}, start times backfilled: {}, end times backfilled: {}, texts filled: {})",
            input.display(),
            records.len(),
            report.parsed_from_string,
            report.backfilled_start_times,
            report.backfilled_end_times,
            report.filled_texts
        );
    }

    let json = serde_json::to_string_pretty(&records)?;
    match output {
        Some(path) => fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_episode(episode: &EpisodeAudio) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&episode.metadata)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn parses_assemble_with_options() {
        let args = Args::parse_from(["audiobook-mix", "assemble", "ep.json", "--out-dir", "/tmp/out", "--timeout-secs", "60"]);
        match args.command {
            Command::Assemble {
                manifest,
                out_dir,
                timeout_secs,
            } => {
                assert_eq!(manifest, PathBuf::from("ep.json"));
                assert_eq!(out_dir, Some(PathBuf::from("/tmp/out")));
                assert_eq!(timeout_secs, Some(60));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn migrate_writes_structured_records() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("stored.json");
        let output = dir.path().join("timings.json");
        fs::write(&input, r#""[{\"endTime\": 5000}, {\"endTime\": 7000}]""#).unwrap();

        migrate(&input, None, true, Some(&output)).unwrap();

        let records: Vec<TimingRecord> = read_json(&output).unwrap();
        assert_eq!(records[0].start_time_ms, 3000);
        assert_eq!(records[1].start_time_ms, 5500);
        assert_eq!(records[1].text.as_deref(), Some("[페이지 2]"));
    }
}
