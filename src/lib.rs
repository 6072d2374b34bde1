//! livehub - WebRTC signaling and live-session relay hub
//!
//! This crate provides the signaling core for a live event-streaming
//! platform: a WebSocket hub that brokers the SDP offer/answer and ICE
//! candidate exchange between one streamer and many viewers, relays
//! audio chunks to an external transcription service, and fans out
//! ephemeral Q&A and live-poll traffic over the same channel.

pub mod config;
pub mod error;
pub mod poll;
pub mod registry;
pub mod relay;
pub mod state;
pub mod transcribe;
pub mod utils;
pub mod web;

pub use error::{AppError, Result};
