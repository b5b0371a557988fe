use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::GenerationError;
use crate::task::GenerateVideoTask;

/// Callback receiving download percentages (0..=100)
pub type ProgressFn = dyn Fn(u8) + Send + Sync;

/// What one acquisition produced: the downloaded video file, the caption-track
/// file next to it, and the video title.
#[derive(Debug, Clone)]
pub struct DownloadedSources {
    pub title: String,
    pub video_path: PathBuf,
    pub subtitle_path: PathBuf,
}

/// Acquisition boundary: fetch a video plus a subtitle track into the run's
/// working directory, reporting percentage progress along the way.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn fetch(
        &self,
        task: &GenerateVideoTask,
        work_dir: &Path,
        on_progress: &ProgressFn,
    ) -> Result<DownloadedSources, GenerationError>;
}

/// yt-dlp subprocess adapter.
pub struct YouTubeClient {
    ytdlp: String,
    link: Regex,
    percent: Regex,
}

impl YouTubeClient {
    pub fn new(ytdlp: impl Into<String>) -> Self {
        Self {
            ytdlp: ytdlp.into(),
            link: Regex::new(r"^http(s)?://(www\.)?youtu(be\.com/watch\?v=|\.be/)[\w\-]+")
                .unwrap(),
            percent: Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").unwrap(),
        }
    }

    /// Whether the string looks like a single-video YouTube link
    pub fn is_valid_link(&self, link: &str) -> bool {
        self.link.is_match(link)
    }

    /// Available subtitle tracks as a name -> language-code map. Manual
    /// tracks win; auto-generated ones are offered only under fallback.
    pub async fn list_subtitle_languages(
        &self,
        url: &str,
        fallback: bool,
    ) -> Result<BTreeMap<String, String>, GenerationError> {
        let output = Command::new(&self.ytdlp)
            .args(["-J", "--skip-download", "--no-warnings", url])
            .output()
            .await
            .map_err(|e| GenerationError::DownloadFailed(format!("{}: {}", self.ytdlp, e)))?;

        if !output.status.success() {
            return Err(GenerationError::DownloadFailed(format!(
                "{} exited with {} while listing subtitles",
                self.ytdlp, output.status
            )));
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| GenerationError::DownloadFailed(format!("bad video metadata: {e}")))?;

        let manual = collect_langs(&info["subtitles"]);
        if !manual.is_empty() {
            return Ok(manual);
        }
        if fallback {
            return Ok(collect_langs(&info["automatic_captions"]));
        }
        Ok(BTreeMap::new())
    }

    /// Fetch the video title; the downloader's fallback title when empty
    async fn fetch_title(&self, url: &str) -> Result<String, GenerationError> {
        let output = Command::new(&self.ytdlp)
            .args(["--print", "title", "--skip-download", "--no-warnings", url])
            .output()
            .await
            .map_err(|e| GenerationError::DownloadFailed(format!("{}: {}", self.ytdlp, e)))?;

        if !output.status.success() {
            return Err(GenerationError::DownloadFailed(format!(
                "{} exited with {} while fetching the title",
                self.ytdlp, output.status
            )));
        }

        let title = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if title.is_empty() {
            "YouTube Video".to_string()
        } else {
            title
        })
    }

    /// Run yt-dlp streaming its `--newline` output, forwarding `[download]`
    /// percentage lines to the callback. Unparseable lines are ignored.
    async fn run_with_progress(
        &self,
        args: &[&str],
        on_progress: &ProgressFn,
    ) -> Result<(), GenerationError> {
        debug!("running {} {}", self.ytdlp, args.join(" "));
        let mut child = Command::new(&self.ytdlp)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| GenerationError::DownloadFailed(format!("{}: {}", self.ytdlp, e)))?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(percent) = self.parse_percent(&line) {
                    on_progress(percent);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| GenerationError::DownloadFailed(format!("{}: {}", self.ytdlp, e)))?;
        if !status.success() {
            return Err(GenerationError::DownloadFailed(format!(
                "{} exited with {}",
                self.ytdlp, status
            )));
        }
        Ok(())
    }

    fn parse_percent(&self, line: &str) -> Option<u8> {
        let caps = self.percent.captures(line)?;
        let value: f64 = caps[1].parse().ok()?;
        Some(value.round().min(100.0) as u8)
    }

    /// Download the caption track; retries with auto-generated captions when
    /// fallback is enabled, fails with `NoSubtitlesAvailable` otherwise.
    async fn download_subtitles(
        &self,
        task: &GenerateVideoTask,
        subs_dir: &Path,
        on_progress: &ProgressFn,
    ) -> Result<PathBuf, GenerationError> {
        tokio::fs::create_dir_all(subs_dir).await?;
        let template = subs_dir.join("%(title)s-%(id)s.%(ext)s");
        let template = template.to_string_lossy();

        let base_args: [&str; 11] = [
            "--skip-download",
            "--write-subs",
            "--sub-langs",
            &task.language,
            "--sub-format",
            "vtt",
            "--no-warnings",
            "--newline",
            "-o",
            &template,
            &task.youtube_video_url,
        ];

        self.run_with_progress(&base_args, on_progress).await?;

        if let Some(path) = first_file(subs_dir).await? {
            return Ok(path);
        }

        if !task.fallback {
            return Err(GenerationError::NoSubtitlesAvailable);
        }

        info!("no manual subtitles written, falling back to auto-generated captions");
        let mut fallback_args = vec!["--write-auto-subs"];
        fallback_args.extend_from_slice(&base_args);
        self.run_with_progress(&fallback_args, on_progress).await?;

        first_file(subs_dir)
            .await?
            .ok_or(GenerationError::NoSubtitlesAvailable)
    }

    /// Download the video itself
    async fn download_video(
        &self,
        task: &GenerateVideoTask,
        vid_dir: &Path,
        on_progress: &ProgressFn,
    ) -> Result<PathBuf, GenerationError> {
        tokio::fs::create_dir_all(vid_dir).await?;
        let template = vid_dir.join("%(title)s-%(id)s.%(ext)s");
        let template = template.to_string_lossy();

        self.run_with_progress(
            &[
                "--no-warnings",
                "--newline",
                "-o",
                &template,
                &task.youtube_video_url,
            ],
            on_progress,
        )
        .await?;

        first_file(vid_dir).await?.ok_or_else(|| {
            GenerationError::DownloadFailed("downloader wrote no video file".to_string())
        })
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn fetch(
        &self,
        task: &GenerateVideoTask,
        work_dir: &Path,
        on_progress: &ProgressFn,
    ) -> Result<DownloadedSources, GenerationError> {
        info!("downloading subtitles and video: {}", task.youtube_video_url);

        let subtitle_path = self
            .download_subtitles(task, &work_dir.join("subs"), on_progress)
            .await?;
        let video_path = self
            .download_video(task, &work_dir.join("vid"), on_progress)
            .await?;
        let title = self.fetch_title(&task.youtube_video_url).await?;

        info!("downloaded video: {}", title);

        Ok(DownloadedSources {
            title,
            video_path,
            subtitle_path,
        })
    }
}

fn collect_langs(tracks: &serde_json::Value) -> BTreeMap<String, String> {
    let mut langs = BTreeMap::new();
    if let Some(map) = tracks.as_object() {
        for (code, entries) in map {
            if let Some(name) = entries
                .get(0)
                .and_then(|t| t.get("name"))
                .and_then(|n| n.as_str())
            {
                langs.insert(name.to_string(), code.clone());
            }
        }
    }
    langs
}

/// First regular file in a freshly written download directory
async fn first_file(dir: &Path) -> Result<Option<PathBuf>, GenerationError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths.into_iter().next())
}
