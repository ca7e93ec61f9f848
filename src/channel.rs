//! Named broadcast groups.
//!
//! A channel owns its member list; the dispatcher owns the channel. Members
//! are kept in insertion order, which fixes the order of broadcast delivery
//! and of NAMES listings.

use crate::session::Session;
use lark_proto::numeric::{RPL_ENDOFNAMES, RPL_NAMREPLY};
use std::sync::Arc;
use tracing::debug;

/// Channel mode flag: only members may send to the channel.
pub const NO_EXTERNAL_MESSAGES: char = 'n';

/// Names per RPL_NAMREPLY line.
const NAMES_BATCH: usize = 8;

pub struct Channel {
    /// Stable key, case-sensitive as received.
    pub name: String,
    /// Empty means "no topic is set".
    pub topic: String,
    /// Mode flag characters.
    pub mode: String,
    members: Vec<Arc<Session>>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        debug!(channel = %name, "Creating channel");
        Self {
            name: name.to_string(),
            topic: String::new(),
            mode: NO_EXTERNAL_MESSAGES.to_string(),
            members: Vec::new(),
        }
    }

    pub fn has_mode(&self, flag: char) -> bool {
        self.mode.contains(flag)
    }

    pub fn add_member(&mut self, session: Arc<Session>) {
        self.members.push(session);
    }

    pub fn members(&self) -> &[Arc<Session>] {
        &self.members
    }

    /// Linear scan by case-insensitive nick; removes at most one member.
    pub fn remove_member(&mut self, nick: &str) {
        let wanted = nick.to_lowercase();
        if let Some(index) = self
            .members
            .iter()
            .position(|m| m.nick().to_lowercase() == wanted)
        {
            self.members.remove(index);
            debug!(channel = %self.name, nick = %nick, "Removed member");
        }
    }

    /// Send `:<origin identity> <verb> <name>[ :<body>]` to every member in
    /// join order. PRIVMSG broadcasts skip the origin; membership events
    /// (JOIN, PART, QUIT, TOPIC) echo back to it.
    pub fn broadcast(&self, origin: &Arc<Session>, verb: &str, body: &str, skip_origin: bool) {
        let prefix = origin.identity();
        let line = if body.is_empty() {
            format!("{prefix} {verb} {}", self.name)
        } else {
            format!("{prefix} {verb} {} :{body}", self.name)
        };
        for member in &self.members {
            if skip_origin && Arc::ptr_eq(member, origin) {
                continue;
            }
            member.send_message(&line);
        }
    }

    /// Send the member listing to one recipient: RPL_NAMREPLY lines in
    /// batches of eight names, then RPL_ENDOFNAMES.
    pub fn name_reply(&self, host: &str, recipient: &Arc<Session>) {
        let nicks: Vec<String> = self.members.iter().map(|m| m.nick()).collect();
        for batch in nicks.chunks(NAMES_BATCH) {
            recipient.send_targeted_numeric(
                host,
                RPL_NAMREPLY,
                &format!("= {}", self.name),
                &batch.join(" "),
            );
        }
        recipient.send_targeted_numeric(host, RPL_ENDOFNAMES, &self.name, "End of NAMES list");
    }
}
