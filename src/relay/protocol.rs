//! Wire protocol for the signaling channel
//!
//! Message names match the browser clients' socket events. SDP offers,
//! answers, ICE candidates and poll definitions are carried as raw JSON
//! values: the hub is a byte-transparent forwarder and never validates
//! or reshapes them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role a client declares when joining a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Offers media, sends audio chunks, opens Q&A and polls
    Streamer,
    /// Receives the offer, answers, votes and asks questions
    Viewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Streamer => write!(f, "streamer"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

/// Client-to-hub message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Explicit handshake: declares the session and role for this connection.
    /// Must be the first message; everything else is dropped until then.
    #[serde(rename = "join")]
    Join {
        session: String,
        role: Role,
        #[serde(default)]
        username: Option<String>,
    },

    /// Viewer finished local setup and wants an offer
    #[serde(rename = "viewer-ready")]
    ViewerReady,

    /// SDP offer from the streamer, relayed verbatim
    #[serde(rename = "stream-offer")]
    StreamOffer(Value),

    /// SDP answer from a viewer, relayed verbatim
    #[serde(rename = "stream-answer")]
    StreamAnswer(Value),

    /// Trickle ICE candidate, relayed verbatim in either direction
    #[serde(rename = "stream-ice-candidate")]
    IceCandidate(Value),

    /// Caption text relayed to the rest of the session (client-side
    /// transcription fallback; the bridge emits these server-side)
    #[serde(rename = "subtitle")]
    Subtitle(String),

    /// Base64-encoded audio chunk for the transcription bridge
    #[serde(rename = "audio_chunk")]
    AudioChunk(String),

    /// Advisory: Q&A submissions are now open
    #[serde(rename = "start-qa")]
    StartQa,

    /// Viewer question, re-emitted as `new-question`
    #[serde(rename = "question")]
    Question { username: String, message: String },

    /// Poll definition, relayed verbatim
    #[serde(rename = "start-poll")]
    StartPoll(Value),

    /// Viewer vote, re-emitted as `new-vote` with the option only
    #[serde(rename = "vote")]
    Vote { username: String, option: String },
}

/// Hub-to-client message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Handshake acknowledgement
    #[serde(rename = "joined")]
    Joined {
        connection_id: String,
        session: String,
        role: Role,
    },

    #[serde(rename = "viewer-ready")]
    ViewerReady,

    #[serde(rename = "stream-offer")]
    StreamOffer(Value),

    #[serde(rename = "stream-answer")]
    StreamAnswer(Value),

    #[serde(rename = "stream-ice-candidate")]
    IceCandidate(Value),

    #[serde(rename = "subtitle")]
    Subtitle(String),

    #[serde(rename = "start-qa")]
    StartQa,

    #[serde(rename = "new-question")]
    NewQuestion { username: String, message: String },

    #[serde(rename = "start-poll")]
    StartPoll(Value),

    #[serde(rename = "new-vote")]
    NewVote { option: String },

    /// Connection-level error notification
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    /// Event name (for logging/routing)
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::ViewerReady => "viewer-ready",
            Self::StreamOffer(_) => "stream-offer",
            Self::StreamAnswer(_) => "stream-answer",
            Self::IceCandidate(_) => "stream-ice-candidate",
            Self::Subtitle(_) => "subtitle",
            Self::StartQa => "start-qa",
            Self::NewQuestion { .. } => "new-question",
            Self::StartPoll(_) => "start-poll",
            Self::NewVote { .. } => "new-vote",
            Self::Error { .. } => "error",
        }
    }
}
