use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server settings
    pub web: WebConfig,
    /// Signaling hub settings
    pub hub: HubConfig,
    /// Transcription bridge settings
    pub transcribe: TranscribeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            hub: HubConfig::default(),
            transcribe: TranscribeConfig::default(),
        }
    }
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address
    pub bind_address: String,
    /// HTTP port
    pub http_port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 8086,
        }
    }
}

/// Signaling hub configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    /// WebSocket heartbeat ping interval in seconds
    pub heartbeat_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { heartbeat_secs: 30 }
    }
}

/// Transcription bridge configuration
///
/// The API key is read from `LIVEHUB_TRANSCRIBE_API_KEY` when not set here,
/// so the config file does not have to carry the secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscribeConfig {
    /// Whether the transcription bridge is active
    pub enabled: bool,
    /// Speech-to-text endpoint (OpenAI-compatible multipart upload)
    pub endpoint: String,
    /// API key sent as a bearer token
    pub api_key: Option<String>,
    /// Model name passed in the multipart form
    pub model: String,
    /// Language hint passed in the multipart form
    pub language: String,
    /// Directory for temporary audio chunk files (system temp dir when unset)
    pub spool_dir: Option<String>,
    /// Maximum concurrent in-flight transcription calls
    pub max_in_flight: usize,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            language: "en".to_string(),
            spool_dir: None,
            max_in_flight: 4,
        }
    }
}

impl TranscribeConfig {
    /// Resolve the API key, preferring the config value over the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("LIVEHUB_TRANSCRIBE_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    /// Resolve the spool directory for temporary chunk files.
    pub fn spool_dir_path(&self) -> std::path::PathBuf {
        match &self.spool_dir {
            Some(dir) if !dir.trim().is_empty() => std::path::PathBuf::from(dir),
            _ => std::env::temp_dir(),
        }
    }
}
