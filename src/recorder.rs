//! Session recording.
//!
//! While a session is open its primary page is screencast over CDP and each
//! JPEG frame is appended to a scratch `.mjpeg` file. When the run ends the
//! scratch file is moved to a deterministic name in the videos directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::models::{ScrapeTarget, TargetKind};

/// Extension of stored recordings (concatenated JPEG frames).
pub const RECORDING_EXTENSION: &str = "mjpeg";

/// Deterministic filename for a run's recording.
pub fn recording_filename(kind: TargetKind, slug: &str, epoch: i64) -> String {
    let prefix = match kind {
        TargetKind::SocialProfile => "linkedin",
        TargetKind::EncyclopediaArticle => "wikipedia",
        TargetKind::GenericPage => "web",
    };
    format!("{}_{}_{}.{}", prefix, slug, epoch, RECORDING_EXTENSION)
}

/// Move a raw recording to `dest`, never replacing an existing file.
///
/// Returns the stored path relative to `working_root` (with `/` separators),
/// or `None` when there was nothing to store, the destination lies outside
/// the working root, the destination was taken, or the move failed. Failures
/// are logged and never propagate.
pub async fn persist_recording(
    raw: Option<PathBuf>,
    dest: &Path,
    working_root: &Path,
) -> Option<String> {
    let raw = raw?;

    let Some(reference) = relative_reference(dest, working_root) else {
        warn!(
            "Recording destination {} is outside the working root {}; discarding this run's video",
            dest.display(),
            working_root.display()
        );
        discard(&raw).await;
        return None;
    };

    if tokio::fs::try_exists(dest).await.unwrap_or(true) {
        warn!(
            "Recording destination {} already exists; discarding this run's video",
            dest.display()
        );
        discard(&raw).await;
        return None;
    }

    if let Some(parent) = dest.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!("Failed to create videos directory {}: {}", parent.display(), e);
            discard(&raw).await;
            return None;
        }
    }

    if let Err(e) = move_file(&raw, dest).await {
        warn!(
            "Failed to move recording {} to {}: {}",
            raw.display(),
            dest.display(),
            e
        );
        discard(&raw).await;
        return None;
    }

    debug!("Stored recording at {}", dest.display());
    Some(reference)
}

/// Where a scraper's recordings end up.
#[derive(Debug, Clone)]
pub struct VideoStore {
    videos_dir: PathBuf,
    working_root: PathBuf,
}

impl VideoStore {
    pub fn new(videos_dir: PathBuf, working_root: PathBuf) -> Self {
        Self {
            videos_dir,
            working_root,
        }
    }

    /// Destination for a run that started at `epoch`.
    pub fn destination(&self, target: &ScrapeTarget, epoch: i64) -> PathBuf {
        self.videos_dir
            .join(recording_filename(target.kind(), &target.slug(), epoch))
    }

    /// Store a run's raw recording, returning the stored reference.
    pub async fn store(
        &self,
        raw: Option<PathBuf>,
        target: &ScrapeTarget,
        epoch: i64,
    ) -> Option<String> {
        let dest = self.destination(target, epoch);
        persist_recording(raw, &dest, &self.working_root).await
    }
}

async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        // Scratch and videos directories may live on different filesystems.
        Err(_) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}

async fn discard(raw: &Path) {
    if let Err(e) = tokio::fs::remove_file(raw).await {
        debug!("Failed to remove scratch recording {}: {}", raw.display(), e);
    }
}

/// `path` relative to `working_root`, joined with `/`.
///
/// `None` when `path` is not under `working_root`; absolute filesystem paths
/// are never handed out as references.
pub fn relative_reference(path: &Path, working_root: &Path) -> Option<String> {
    let relative = path.strip_prefix(working_root).ok()?;
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

#[cfg(feature = "browser")]
pub use screencast::ScreencastRecorder;

#[cfg(feature = "browser")]
mod screencast {
    use std::path::PathBuf;

    use anyhow::Context;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chromiumoxide::cdp::browser_protocol::page::{
        EventScreencastFrame, ScreencastFrameAckParams, StartScreencastFormat,
        StartScreencastParams, StopScreencastParams,
    };
    use chromiumoxide::Page;
    use futures::StreamExt;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    use super::RECORDING_EXTENSION;
    use crate::browser::RecordingConfig;

    /// Captures a page's screencast into a scratch file.
    pub struct ScreencastRecorder {
        path: PathBuf,
        stop: oneshot::Sender<()>,
        task: JoinHandle<u64>,
    }

    impl ScreencastRecorder {
        pub async fn start(page: &Page, config: &RecordingConfig) -> anyhow::Result<Self> {
            tokio::fs::create_dir_all(&config.raw_dir)
                .await
                .with_context(|| {
                    format!("Failed to create recording dir {}", config.raw_dir.display())
                })?;
            let path = config
                .raw_dir
                .join(format!("{}.{}", uuid::Uuid::new_v4(), RECORDING_EXTENSION));
            let file = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;

            let mut frames = page
                .event_listener::<EventScreencastFrame>()
                .await
                .context("Failed to subscribe to screencast frames")?;

            let params = StartScreencastParams::builder()
                .format(StartScreencastFormat::Jpeg)
                .quality(i64::from(config.quality))
                .build();
            page.execute(params)
                .await
                .context("Failed to start screencast")?;

            let (stop, mut stopped) = oneshot::channel::<()>();
            let ack_page = page.clone();
            let task_path = path.clone();

            let task = tokio::spawn(async move {
                let mut out = tokio::io::BufWriter::new(file);
                let mut written = 0u64;
                loop {
                    tokio::select! {
                        _ = &mut stopped => break,
                        frame = frames.next() => {
                            let Some(frame) = frame else { break };
                            let encoded: &str = frame.data.as_ref();
                            match STANDARD.decode(encoded) {
                                Ok(bytes) => {
                                    if let Err(e) = out.write_all(&bytes).await {
                                        warn!("Failed to write frame to {}: {}", task_path.display(), e);
                                        break;
                                    }
                                    written += 1;
                                }
                                Err(e) => debug!("Skipping undecodable frame: {}", e),
                            }
                            let _ = ack_page
                                .execute(ScreencastFrameAckParams::new(frame.session_id))
                                .await;
                        }
                    }
                }
                if let Err(e) = out.flush().await {
                    warn!("Failed to flush recording {}: {}", task_path.display(), e);
                }
                written
            });

            debug!("Recording session to {}", path.display());
            Ok(Self { path, stop, task })
        }

        /// Stop capturing. Returns the scratch file if any frame was written.
        pub async fn stop(self, page: &Page) -> Option<PathBuf> {
            if let Err(e) = page.execute(StopScreencastParams::default()).await {
                debug!("Failed to stop screencast: {}", e);
            }
            let _ = self.stop.send(());

            let frames = match self.task.await {
                Ok(frames) => frames,
                Err(e) => {
                    warn!("Recording task failed: {}", e);
                    0
                }
            };

            if frames == 0 {
                debug!("No frames captured; dropping {}", self.path.display());
                let _ = tokio::fs::remove_file(&self.path).await;
                return None;
            }

            debug!("Captured {} frames to {}", frames, self.path.display());
            Some(self.path)
        }
    }
}
