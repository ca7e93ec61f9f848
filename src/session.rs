//! Per-connection session state and outbound send primitives.
//!
//! A session's socket halves live with its connection tasks; the mutable
//! identity fields belong to the dispatcher once registration begins.
//! Outbound lines go through an unbounded queue drained by one writer task,
//! which is what keeps concurrent sends to the same connection from
//! interleaving on the wire.

use lark_proto::numeric::pad_numeric;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// One live connection's identity and send handle.
pub struct Session {
    /// Remote socket address, used as the display host when no cloak is set.
    pub addr: SocketAddr,
    outgoing: UnboundedSender<String>,
    alive: AtomicBool,
    teardown: CancellationToken,
    /// Mutable fields. Written only by the dispatcher; the framing task may
    /// read them for logging.
    pub state: Mutex<SessionState>,
}

/// Dispatcher-owned mutable session fields.
#[derive(Debug, Default)]
pub struct SessionState {
    pub nick: String,
    pub username: String,
    pub realname: String,
    /// Display host substitute. Empty means the real address shows.
    pub cloak: String,
    /// User mode flag characters.
    pub mode: String,
    /// Joined channel names, kept sorted for binary-search membership tests.
    pub channels: Vec<String>,
    pub registered: bool,
    /// Unix timestamp of the last PING or PONG seen from this client.
    pub last_seen: i64,
}

impl Session {
    pub fn new(addr: SocketAddr, cloak: Option<&str>, outgoing: UnboundedSender<String>) -> Self {
        let state = SessionState {
            cloak: cloak.unwrap_or("").to_string(),
            ..SessionState::default()
        };
        Self {
            addr,
            outgoing,
            alive: AtomicBool::new(true),
            teardown: CancellationToken::new(),
            state: Mutex::new(state),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark the session dead and cancel its connection tasks. Returns
    /// whether the session had still been alive.
    pub fn shutdown(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::SeqCst);
        self.teardown.cancel();
        was_alive
    }

    /// Resolves once the session is being torn down.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.teardown.cancelled()
    }

    /// Queue one raw line for the writer task. Dropped once the session is
    /// no longer alive. The codec appends the line terminator.
    pub fn send_raw(&self, line: &str) {
        if self.is_alive() {
            let _ = self.outgoing.send(line.to_string());
        }
    }

    /// Queue a line with the leading `:` prefix marker.
    pub fn send_message(&self, line: &str) {
        self.send_raw(&format!(":{line}"));
    }

    /// `:<host> <code> <nick> :<message>`
    pub fn send_numeric(&self, host: &str, code: u16, message: &str) {
        let nick = self.nick();
        self.send_message(&format!("{host} {} {nick} :{message}", pad_numeric(code)));
    }

    /// `:<host> <code> <nick> <target> :<message>`
    pub fn send_targeted_numeric(&self, host: &str, code: u16, target: &str, message: &str) {
        let nick = self.nick();
        self.send_message(&format!(
            "{host} {} {nick} {target} :{message}",
            pad_numeric(code)
        ));
    }

    /// `nick!username@host`, where host is the cloak when one is set and the
    /// remote address otherwise.
    pub fn identity(&self) -> String {
        let state = self.state.lock();
        let host = if state.cloak.is_empty() {
            self.addr.ip().to_string()
        } else {
            state.cloak.clone()
        };
        format!("{}!{}@{host}", state.nick, state.username)
    }

    pub fn nick(&self) -> String {
        self.state.lock().nick.clone()
    }

    /// Logarithmic membership test against the sorted channel list.
    pub fn joined(&self, channel: &str) -> bool {
        sorted_find(&self.state.lock().channels, channel).is_some()
    }

    /// Record a joined channel, re-sorting so membership tests stay valid.
    pub fn join_channel(&self, channel: &str) {
        let mut state = self.state.lock();
        if sorted_find(&state.channels, channel).is_none() {
            state.channels.push(channel.to_string());
            state.channels.sort();
        }
    }

    pub fn leave_channel(&self, channel: &str) {
        let mut state = self.state.lock();
        if let Some(index) = sorted_find(&state.channels, channel) {
            state.channels.remove(index);
        }
    }
}

/// Binary search over a sorted name list. Returns the index of `term`, or
/// `None` when the term is absent.
pub fn sorted_find(space: &[String], term: &str) -> Option<usize> {
    space.binary_search_by(|probe| probe.as_str().cmp(term)).ok()
}
