use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clipper::{CardMaterial, ClippedMedia, Clipper};
use crate::collection::{render_note_fields, CardStore, DeckRef};
use crate::error::GenerationError;
use crate::subtitles::{SubtitleOptimizer, SubtitleParser, SubtitleRange};
use crate::task::{with_limit, GenerateVideoTask};
use crate::youtube::{DownloadedSources, VideoSource};

/// Discrete notifications drained by the caller; exactly one terminal event
/// (`AcquisitionFailed`, `Completed`, `Cancelled` or `Failed`) per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Download percentage from the acquisition tool, forwarded unchanged
    AcquisitionProgress(u8),
    /// The job failed during acquisition; no cards were produced
    AcquisitionFailed(String),
    /// Percentage of cards emitted so far
    ClippingProgress(u8),
    /// The run finished; final statistics
    Completed {
        elapsed: Duration,
        cards_emitted: usize,
    },
    /// The run was cancelled by the caller
    Cancelled,
    /// The job failed after acquisition (collection-store rejection)
    Failed(String),
}

impl GenerationEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            GenerationEvent::AcquisitionProgress(_) | GenerationEvent::ClippingProgress(_)
        )
    }
}

/// Cooperative cancellation flag; safe to trigger from any thread, idempotent,
/// observed by the worker between clipping items (never mid-clip).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller-side handle to one in-flight run.
pub struct PipelineHandle {
    events: mpsc::UnboundedReceiver<GenerationEvent>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PipelineHandle {
    /// Request cancellation; the in-flight clip finishes first
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, or `None` once the worker is done and drained
    pub async fn next_event(&mut self) -> Option<GenerationEvent> {
        self.events.recv().await
    }

    /// Wait for the worker task itself to finish
    pub async fn wait(self) {
        let _ = self.join.await;
    }
}

/// Orchestrates acquire -> parse -> optimize -> clip -> emit on one dedicated
/// background task, never on the caller's thread.
pub struct GenerationPipeline {
    source: Arc<dyn VideoSource>,
    clipper: Arc<dyn Clipper>,
    store: Arc<dyn CardStore>,
}

impl GenerationPipeline {
    pub fn new(
        source: Arc<dyn VideoSource>,
        clipper: Arc<dyn Clipper>,
        store: Arc<dyn CardStore>,
    ) -> Self {
        Self {
            source,
            clipper,
            store,
        }
    }

    /// Validate the task and spawn the worker for one run.
    pub fn spawn(&self, task: GenerateVideoTask) -> Result<PipelineHandle, GenerationError> {
        self.spawn_with_token(task, CancellationToken::new())
    }

    /// Like [`spawn`](Self::spawn) with a caller-provided cancellation token.
    pub fn spawn_with_token(
        &self,
        task: GenerateVideoTask,
        cancel: CancellationToken,
    ) -> Result<PipelineHandle, GenerationError> {
        task.fields.validate()?;

        let (events, receiver) = mpsc::unbounded_channel();
        let worker = Worker {
            source: Arc::clone(&self.source),
            clipper: Arc::clone(&self.clipper),
            store: Arc::clone(&self.store),
            task,
            cancel: cancel.clone(),
            events,
        };
        let join = tokio::spawn(worker.run());

        Ok(PipelineHandle {
            events: receiver,
            cancel,
            join,
        })
    }
}

struct Worker {
    source: Arc<dyn VideoSource>,
    clipper: Arc<dyn Clipper>,
    store: Arc<dyn CardStore>,
    task: GenerateVideoTask,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<GenerationEvent>,
}

impl Worker {
    async fn run(self) {
        let started = Instant::now();

        // Acquiring: a fresh working directory owned exclusively by this run
        let work_dir = match tempfile::Builder::new().prefix("ytanki-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                self.send(GenerationEvent::AcquisitionFailed(format!(
                    "could not create working directory: {e}"
                )));
                return;
            }
        };

        let progress_events = self.events.clone();
        let on_progress = move |percent: u8| {
            let _ = progress_events.send(GenerationEvent::AcquisitionProgress(percent));
        };

        let sources = match self
            .source
            .fetch(&self.task, work_dir.path(), &on_progress)
            .await
        {
            Ok(sources) => sources,
            Err(e) => {
                warn!("acquisition failed: {}", e);
                close_work_dir(work_dir);
                self.send(GenerationEvent::AcquisitionFailed(e.to_string()));
                return;
            }
        };

        // Parsing: a malformed track degrades to zero cards, never aborts
        let parser = SubtitleParser::new();
        let mut subtitles = match parser.parse(&sources.subtitle_path) {
            Ok(subtitles) => subtitles,
            Err(e) => {
                warn!("subtitle track yielded no captions: {}", e);
                Vec::new()
            }
        };
        info!("parsed {} captions", subtitles.len());

        // Optimizing (optional)
        if self.task.optimize_by_punctuation {
            subtitles = SubtitleOptimizer::optimize(subtitles);
            info!("optimized into {} sentence units", subtitles.len());
        }
        let subtitles = with_limit(subtitles, self.task.limit);
        let total = subtitles.len();

        let deck_title = format!("{} - {}", sources.title, self.task.language);
        let deck = match self.store.create_or_select_deck(&deck_title).await {
            Ok(deck) => deck,
            Err(e) => {
                warn!("deck selection failed: {}", e);
                self.cleanup(&sources, work_dir).await;
                self.send(GenerationEvent::Failed(e.to_string()));
                return;
            }
        };

        // Clipping(i): strictly sequential so cards land in chronological order
        let mut cards_emitted = 0usize;
        let mut cancelled = false;
        for (index, subtitle) in subtitles.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("cancellation requested, stopping after {} cards", cards_emitted);
                cancelled = true;
                break;
            }

            let media = match self
                .clipper
                .clip(subtitle, &sources.video_path, &deck_title, self.task.dimensions)
                .await
            {
                Ok(media) => media,
                Err(e) => {
                    // Per-item failure policy: skip this subtitle, keep going
                    warn!("skipping subtitle {}/{}: {}", index + 1, total, e);
                    continue;
                }
            };

            if let Err(e) = self.emit_card(&deck, subtitle, &media).await {
                warn!("collection rejected a card: {}", e);
                self.cleanup(&sources, work_dir).await;
                self.send(GenerationEvent::Failed(e.to_string()));
                return;
            }

            cards_emitted += 1;
            let percent = ((cards_emitted as f64 / total as f64) * 100.0).round() as u8;
            self.send(GenerationEvent::ClippingProgress(percent));
        }

        self.cleanup(&sources, work_dir).await;

        if cancelled {
            self.send(GenerationEvent::Cancelled);
        } else {
            let elapsed = started.elapsed();
            info!(
                "generated {} cards in {:.1}s",
                cards_emitted,
                elapsed.as_secs_f64()
            );
            self.send(GenerationEvent::Completed {
                elapsed,
                cards_emitted,
            });
        }
    }

    /// Import both media files and write the note; store errors are job-fatal
    async fn emit_card(
        &self,
        deck: &DeckRef,
        subtitle: &SubtitleRange,
        media: &ClippedMedia,
    ) -> Result<(), GenerationError> {
        let audio_token = self.store.import_media(&media.audio_path).await?;
        let picture_token = self.store.import_media(&media.picture_path).await?;

        let card = CardMaterial {
            subtitle: subtitle.clone(),
            media: media.clone(),
        };
        let fields = render_note_fields(&card, &audio_token, &picture_token, &self.task.fields);
        self.store
            .add_note(deck, &self.task.fields.note_type, fields)
            .await
    }

    /// Delete the downloaded files, then the working directory; unconditional
    /// on every terminal path and always before the terminal event.
    async fn cleanup(&self, sources: &DownloadedSources, work_dir: TempDir) {
        remove_file(&sources.video_path).await;
        remove_file(&sources.subtitle_path).await;
        close_work_dir(work_dir);
    }

    fn send(&self, event: GenerationEvent) {
        // The receiver side may have been dropped by an uninterested caller.
        let _ = self.events.send(event);
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("removed {}", path.display()),
        Err(e) => warn!("could not remove {}: {}", path.display(), e),
    }
}

fn close_work_dir(work_dir: TempDir) {
    if let Err(e) = work_dir.close() {
        warn!("could not remove working directory: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());

        let clone = token.clone();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_terminal_event_classification() {
        assert!(!GenerationEvent::AcquisitionProgress(10).is_terminal());
        assert!(!GenerationEvent::ClippingProgress(50).is_terminal());
        assert!(GenerationEvent::Cancelled.is_terminal());
        assert!(GenerationEvent::Failed("boom".to_string()).is_terminal());
        assert!(GenerationEvent::AcquisitionFailed("no subs".to_string()).is_terminal());
        assert!(GenerationEvent::Completed {
            elapsed: Duration::from_secs(1),
            cards_emitted: 4
        }
        .is_terminal());
    }
}
