use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::ConfigStore;
use crate::registry::ConnectionRegistry;
use crate::transcribe::TranscriptionBridge;
use crate::utils::LogThrottler;

/// Application-wide state shared across handlers
pub struct AppState {
    /// Configuration store
    pub config: ConfigStore,
    /// Live websocket connections and session membership
    pub registry: Arc<ConnectionRegistry>,
    /// Audio-chunk transcription (absent when disabled in config)
    pub transcriber: Option<Arc<TranscriptionBridge>>,
    /// Collapses repeated transcription/relay error logs
    pub log_throttler: LogThrottler,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(
        config: ConfigStore,
        registry: Arc<ConnectionRegistry>,
        transcriber: Option<Arc<TranscriptionBridge>>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry,
            transcriber,
            log_throttler: LogThrottler::default(),
            shutdown_tx,
        })
    }

    /// Subscribe to shutdown signal
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}
