//! Command parsing: one raw protocol line in, one typed [`Intent`] out.
//!
//! Parsing never fails. Syntactically broken commands come back with
//! `valid == false` so the dispatcher can decide the user-visible
//! consequence in one place.

/// The command a client asked for, before any state is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Help,
    Join,
    Mode,
    Motd,
    Nick,
    Part,
    Pass,
    Ping,
    Pong,
    PrivMsg,
    Quit,
    Rules,
    Topic,
    User,
    Version,
    Unknown,
}

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub kind: IntentKind,
    /// Normalized target: a channel list, a nick, or empty.
    pub target: String,
    /// Free-text tail: message body, reason, new topic, and so on.
    pub body: String,
    /// False when the command failed its per-command syntax check.
    pub valid: bool,
}

impl Intent {
    fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            target: String::new(),
            body: String::new(),
            valid: true,
        }
    }

    /// Synthetic quit used when a connection goes away without sending QUIT.
    pub fn disconnect() -> Self {
        Self::new(IntentKind::Quit)
    }

    /// Parse one raw line. The keyword is case-insensitive; everything after
    /// it is interpreted per-command. An empty line is the internal
    /// disconnect signal and parses to a quit.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::disconnect();
        }

        let words: Vec<&str> = raw.split(' ').collect();
        let command = words[0].to_ascii_lowercase();
        // Argument tail: everything after the keyword and one space.
        let rest = raw.get(words[0].len() + 1..).unwrap_or("");

        let mut intent = Self::new(IntentKind::Unknown);

        match command.as_str() {
            "help" => {
                intent.kind = IntentKind::Help;
                if words.len() >= 2 {
                    intent.body = rest.trim_matches([' ', ':']).to_string();
                }
            }
            "join" => {
                intent.kind = IntentKind::Join;
                intent.body = rest.trim_matches(' ').to_string();
            }
            "mode" => {
                intent.kind = IntentKind::Mode;
                intent.body = rest.trim_matches(' ').to_string();
                if words.len() >= 2 {
                    intent.target = words[1].to_ascii_lowercase();
                } else {
                    intent.valid = false;
                }
            }
            "motd" => intent.kind = IntentKind::Motd,
            "nick" => {
                intent.kind = IntentKind::Nick;
                if words.len() == 2 {
                    intent.body = words[1].trim_matches(' ').to_string();
                } else {
                    intent.valid = false;
                }
            }
            "part" => {
                intent.kind = IntentKind::Part;
                // Comma-separated channel list, then an optional reason
                // after the first colon.
                match rest.split_once(':') {
                    Some((channels, reason)) => {
                        intent.target = channels.trim_matches([' ', ':']).to_string();
                        intent.body = reason.trim_matches([' ', ':']).to_string();
                    }
                    None => intent.target = rest.trim_matches([' ', ':']).to_string(),
                }
            }
            "pass" => intent.kind = IntentKind::Pass,
            "ping" => {
                intent.kind = IntentKind::Ping;
                if words.len() == 2 {
                    intent.body = words[1].trim_matches([' ', ':']).to_string();
                }
            }
            "pong" => intent.kind = IntentKind::Pong,
            "privmsg" => {
                intent.kind = IntentKind::PrivMsg;
                match rest.split_once(':') {
                    Some((target, message)) => {
                        intent.target = target.trim_matches([' ', ':']).to_string();
                        intent.body = message.trim_matches([' ', ':']).to_string();
                    }
                    None => intent.valid = false,
                }
            }
            "quit" => {
                intent.kind = IntentKind::Quit;
                if let Some((_, reason)) = rest.split_once(':') {
                    intent.body = reason.trim_matches([' ', ':']).to_string();
                }
            }
            "rules" => intent.kind = IntentKind::Rules,
            "topic" => {
                intent.kind = IntentKind::Topic;
                if words.len() == 2 || words.len() == 3 {
                    intent.target = words[1].to_string();
                    // Empty remainder after the colon is a valid clear.
                    if let Some((_, topic)) = raw.split_once(':') {
                        intent.body = topic.to_string();
                    }
                } else {
                    intent.valid = false;
                }
            }
            "user" => {
                intent.kind = IntentKind::User;
                // Realnames may contain spaces, so keep the tail intact and
                // let the dispatcher split off the first three fields.
                if words.len() >= 5 {
                    intent.body = rest.to_string();
                } else {
                    intent.valid = false;
                }
            }
            "version" => intent.kind = IntentKind::Version,
            _ => intent.kind = IntentKind::Unknown,
        }

        intent
    }
}
