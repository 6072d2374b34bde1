//! Transcription bridge
//!
//! Converts each base64 audio chunk a streamer emits into caption text:
//! decode, spool to a uniquely named temporary file (the external API
//! requires a multipart file upload), call the speech-to-text service,
//! and hand the trimmed text back for a `subtitle` broadcast. Chunks
//! are independent units; any failure means "no caption for this chunk"
//! and is never fatal to the hub.

mod whisper;

pub use whisper::WhisperClient;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::TranscribeConfig;
use crate::error::{AppError, Result};

/// External speech-to-text call, kept behind a trait so the bridge can
/// be exercised without the network.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe the audio file at `path`, returning the raw text.
    async fn transcribe(&self, path: &Path) -> Result<String>;
}

/// Bridges audio chunks to the speech-to-text service
pub struct TranscriptionBridge {
    stt: Arc<dyn SpeechToText>,
    spool_dir: PathBuf,
    /// Caps concurrent in-flight external calls; excess chunks wait
    /// here instead of dispatching unboundedly.
    permits: Arc<Semaphore>,
}

impl TranscriptionBridge {
    pub fn new(stt: Arc<dyn SpeechToText>, spool_dir: PathBuf, max_in_flight: usize) -> Self {
        Self {
            stt,
            spool_dir,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Build a bridge with the HTTP whisper client from configuration.
    pub fn from_config(config: &TranscribeConfig) -> Self {
        let client = WhisperClient::new(
            config.endpoint.clone(),
            config.resolved_api_key(),
            config.model.clone(),
            config.language.clone(),
        );
        Self::new(Arc::new(client), config.spool_dir_path(), config.max_in_flight)
    }

    /// Process one audio chunk end to end.
    ///
    /// Returns the trimmed caption, or `None` when the service produced
    /// empty text. The temporary file is removed whether the external
    /// call succeeds or fails.
    pub async fn relay_chunk(&self, base64_audio: &str) -> Result<Option<String>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::Internal("transcription bridge shut down".to_string()))?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(base64_audio)
            .map_err(|e| AppError::Decode(format!("invalid base64 audio chunk: {e}")))?;

        let temp_file = self
            .spool_dir
            .join(format!("chunk_{}.webm", Uuid::new_v4()));
        tokio::fs::write(&temp_file, &audio).await?;

        let result = self.stt.transcribe(&temp_file).await;

        // Cleanup is unconditional; a missing file is not an error here
        if let Err(e) = tokio::fs::remove_file(&temp_file).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(file = %temp_file.display(), "Failed to remove temp audio file: {}", e);
            }
        }

        let text = result?;
        let text = text.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text.to_string()))
        }
    }

    /// Number of additional chunks that could dispatch right now.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }
}
