//! Protocol primitives for larkircd.
//!
//! Everything in this crate is transport-agnostic: CRLF line framing,
//! parsing of raw command lines into typed [`Intent`]s, the numeric reply
//! catalog, and nick validation. The server crate owns all state; nothing
//! here touches a socket or a directory.

pub mod error;
pub mod intent;
pub mod line;
pub mod nick;
pub mod numeric;

pub use error::ProtocolError;
pub use intent::{Intent, IntentKind};
pub use line::LineCodec;
pub use nick::valid_nick;
