//! Signaling relay: wire protocol and handshake tracking

pub mod handshake;
pub mod protocol;

pub use handshake::{AnswerLatch, ViewerHandshake};
pub use protocol::{ClientMessage, Role, ServerMessage};
