use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod clipper;
mod collection;
mod config;
mod error;
mod pipeline;
mod subtitles;
mod task;
mod youtube;

use crate::clipper::FfmpegClipper;
use crate::collection::AnkiConnectStore;
use crate::config::Config;
use crate::pipeline::{GenerationEvent, GenerationPipeline};
use crate::task::{Dimensions, FieldsConfiguration, GenerateVideoTask};
use crate::youtube::YouTubeClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("ytanki=info,warn")
        .init();

    let matches = Command::new("YouTube to Anki")
        .version("0.1.0")
        .about("Generates one flashcard per spoken sentence of a YouTube video")
        .arg(
            Arg::new("url")
                .value_name("URL")
                .help("YouTube video link")
                .required(true),
        )
        .arg(
            Arg::new("language")
                .short('l')
                .long("language")
                .value_name("LANG")
                .help("Subtitle language code")
                .default_value("en"),
        )
        .arg(
            Arg::new("fallback")
                .long("fallback")
                .help("Use auto-generated captions when no manual track exists")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("optimize")
                .long("optimize")
                .help("Merge captions into full sentences before clipping")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("note-type")
                .long("note-type")
                .value_name("NAME")
                .help("Note type (model) to create notes with")
                .default_value("Basic"),
        )
        .arg(
            Arg::new("text-field")
                .long("text-field")
                .value_name("FIELD")
                .help("Destination field for the sentence text")
                .default_value("Front"),
        )
        .arg(
            Arg::new("audio-field")
                .long("audio-field")
                .value_name("FIELD")
                .help("Destination field for the audio clip")
                .default_value("Audio"),
        )
        .arg(
            Arg::new("picture-field")
                .long("picture-field")
                .value_name("FIELD")
                .help("Destination field for the still frame")
                .default_value("Picture"),
        )
        .arg(
            Arg::new("dimensions")
                .short('s')
                .long("dimensions")
                .value_name("WxH")
                .help("Still-frame dimensions (defaults from config)"),
        )
        .arg(
            Arg::new("limit")
                .short('n')
                .long("limit")
                .value_name("NUM")
                .help("Maximum number of cards (0 = unlimited)")
                .default_value("0"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for the clipped media files"),
        )
        .arg(
            Arg::new("list-languages")
                .long("list-languages")
                .help("List available subtitle languages and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    let url = matches.get_one::<String>("url").cloned().unwrap_or_default();
    let language = matches
        .get_one::<String>("language")
        .cloned()
        .unwrap_or_default();
    let fallback = matches.get_flag("fallback");

    let youtube = Arc::new(YouTubeClient::new(config.tools.ytdlp.clone()));
    if !youtube.is_valid_link(&url) {
        error!("Not a valid YouTube video link: {}", url);
        return Err(anyhow::anyhow!("invalid YouTube link"));
    }

    if matches.get_flag("list-languages") {
        let langs = youtube.list_subtitle_languages(&url, fallback).await?;
        if langs.is_empty() {
            info!("No subtitle tracks available");
        }
        for (name, code) in langs {
            info!("{}: {}", code, name);
        }
        return Ok(());
    }

    let dimensions: Dimensions = match matches.get_one::<String>("dimensions") {
        Some(spec) => spec
            .parse()
            .map_err(|e: String| anyhow::anyhow!("invalid --dimensions: {e}"))?,
        None => config.defaults.dimensions,
    };
    let limit: usize = matches
        .get_one::<String>("limit")
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(0);
    let output_dir = matches
        .get_one::<String>("output-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output_dir());

    let fields = FieldsConfiguration {
        note_type: matches
            .get_one::<String>("note-type")
            .cloned()
            .unwrap_or_default(),
        text_field: matches
            .get_one::<String>("text-field")
            .cloned()
            .unwrap_or_default(),
        audio_field: matches
            .get_one::<String>("audio-field")
            .cloned()
            .unwrap_or_default(),
        picture_field: matches
            .get_one::<String>("picture-field")
            .cloned()
            .unwrap_or_default(),
    };

    let task = GenerateVideoTask {
        youtube_video_url: url,
        language,
        fallback,
        optimize_by_punctuation: matches.get_flag("optimize"),
        dimensions,
        limit,
        output_dir: output_dir.clone(),
        fields,
    };

    info!("🚀 YouTube to Anki starting...");
    info!("🔗 Video: {}", task.youtube_video_url);
    info!("🌐 Language: {} (fallback: {})", task.language, task.fallback);
    info!("📂 Media output: {}", output_dir.display());

    let clipper = Arc::new(FfmpegClipper::new(config.tools.ffmpeg.clone(), output_dir));
    let store = Arc::new(AnkiConnectStore::new(
        config.collection.endpoint.clone(),
        Duration::from_secs(config.collection.timeout_secs),
    )?);

    let pipeline = GenerationPipeline::new(youtube, clipper, store);
    let mut handle = pipeline.spawn(task)?;

    loop {
        let event = tokio::select! {
            event = handle.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupt received, cancelling after the current clip...");
                handle.cancel();
                continue;
            }
        };

        match event {
            Some(GenerationEvent::AcquisitionProgress(percent)) => {
                info!("⬇️ Downloading: {}%", percent);
            }
            Some(GenerationEvent::ClippingProgress(percent)) => {
                info!("🎞️ Generating cards: {}%", percent);
            }
            Some(GenerationEvent::Completed {
                elapsed,
                cards_emitted,
            }) => {
                info!(
                    "🎉 Generated {} cards in {:.1}s",
                    cards_emitted,
                    elapsed.as_secs_f64()
                );
                break;
            }
            Some(GenerationEvent::Cancelled) => {
                warn!("Run cancelled");
                break;
            }
            Some(GenerationEvent::AcquisitionFailed(reason)) => {
                error!("Download failed: {}", reason);
                return Err(anyhow::anyhow!(reason));
            }
            Some(GenerationEvent::Failed(reason)) => {
                error!("Generation failed: {}", reason);
                return Err(anyhow::anyhow!(reason));
            }
            None => break,
        }
    }

    Ok(())
}
