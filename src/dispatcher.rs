//! The state loop: sole owner of the user and channel directories.
//!
//! Exactly one dispatcher task drains the intent queue. Sequential
//! consumption is what makes the directories safe to mutate without locks:
//! at most one mutation is ever in flight, and intents apply in FIFO
//! arrival order across all connections. Every send issued from here is
//! fire-and-forget through the target session's outbound queue.

use crate::channel::{Channel, NO_EXTERNAL_MESSAGES};
use crate::config::ServerInfo;
use crate::session::Session;
use chrono::Utc;
use lark_proto::intent::{Intent, IntentKind};
use lark_proto::nick::valid_nick;
use lark_proto::numeric::{
    ERR_CANNOTSENDTOCHAN, ERR_ERRONEUSNICKNAME, ERR_NEEDMOREPARAMS, ERR_NICKNAMEINUSE,
    ERR_NORECIPIENT, ERR_NOSUCHCHANNEL, ERR_NOSUCHNICK, ERR_NOTONCHANNEL, ERR_UNKNOWNCOMMAND,
    RPL_CHANNELMODEIS, RPL_CREATED, RPL_ENDOFMOTD, RPL_ISUPPORT, RPL_MOTD, RPL_MOTDSTART,
    RPL_MYINFO, RPL_NOTOPIC, RPL_TOPIC, RPL_UMODEIS, RPL_VERSION, RPL_WELCOME, RPL_YOURHOST,
    pad_numeric,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const TIME_FORMAT: &str = "%a, %b %e %Y at %H:%M:%S (%Z)";

/// One parsed command line plus the session it arrived on.
pub struct Event {
    pub session: Arc<Session>,
    pub intent: Intent,
}

/// The protocol state machine and its directories.
pub struct Dispatcher {
    server: Arc<ServerInfo>,
    /// Live sessions by nick, case-sensitive.
    users: HashMap<String, Arc<Session>>,
    /// Channels by name. Never pruned: empty channels persist for the
    /// process lifetime (known limitation).
    channels: HashMap<String, Channel>,
}

impl Dispatcher {
    pub fn new(server: Arc<ServerInfo>) -> Self {
        Self {
            server,
            users: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    /// Drain the intent queue until every producer is gone. This task is
    /// the only code path that mutates the directories.
    pub async fn run(mut self, mut events: UnboundedReceiver<Event>) {
        while let Some(event) = events.recv().await {
            self.apply(event);
        }
    }

    /// Apply one intent. Strictly sequential.
    pub fn apply(&mut self, event: Event) {
        let Event { session, intent } = event;
        match intent.kind {
            IntentKind::Help => {
                debug!(topic = %intent.body, "HELP requested");
            }
            IntentKind::Join => self.handle_join(&session, &intent),
            IntentKind::Mode => self.handle_mode(&session, &intent),
            IntentKind::Motd => self.send_motd(&session),
            IntentKind::Nick => self.handle_nick(&session, &intent),
            IntentKind::Part => self.handle_part(&session, &intent),
            IntentKind::Pass => {
                // Accepted, unvalidated.
            }
            IntentKind::Ping => self.handle_ping(&session, &intent),
            IntentKind::Pong => {
                session.state.lock().last_seen = Utc::now().timestamp();
                debug!(nick = %session.nick(), "PONG received");
            }
            IntentKind::PrivMsg => self.handle_privmsg(&session, &intent),
            IntentKind::Quit => self.handle_quit(&session, &intent.body),
            IntentKind::Rules => {
                debug!(nick = %session.nick(), "RULES requested");
            }
            IntentKind::Topic => self.handle_topic(&session, &intent),
            IntentKind::User => self.handle_user(&session, &intent),
            IntentKind::Version => {
                session.send_targeted_numeric(
                    &self.server.hostname,
                    RPL_VERSION,
                    &format!("larkd-{VERSION} {}", self.server.hostname),
                    "A light and speedy IRC server",
                );
            }
            IntentKind::Unknown => {
                session.send_numeric(&self.server.hostname, ERR_UNKNOWNCOMMAND, "Unknown command");
            }
        }
    }

    fn handle_nick(&mut self, session: &Arc<Session>, intent: &Intent) {
        let nick = intent.body.as_str();
        if !intent.valid || !valid_nick(nick) {
            session.send_numeric(&self.server.hostname, ERR_ERRONEUSNICKNAME, "Erroneus nickname.");
            return;
        }

        match self.users.get(nick) {
            Some(holder) if !Arc::ptr_eq(holder, session) => {
                session.send_numeric(
                    &self.server.hostname,
                    ERR_NICKNAMEINUSE,
                    "Nickname is already in use.",
                );
            }
            Some(_) => {
                // Renaming to the nick this session already holds.
            }
            None => {
                let old = session.nick();
                if old.is_empty() {
                    info!(nick = %nick, "New user");
                } else {
                    info!(old = %old, new = %nick, "Nick changed");
                    self.users.remove(&old);
                }
                self.users.insert(nick.to_string(), Arc::clone(session));
                session.state.lock().nick = nick.to_string();
            }
        }
    }

    fn handle_join(&mut self, session: &Arc<Session>, intent: &Intent) {
        // The body may carry a key list after the channel list; keys are
        // not modeled, so only the first field matters.
        let names = intent.body.split(' ').next().unwrap_or("");
        for name in names.split(',') {
            let name = name.trim();
            if name.is_empty() || !name.starts_with(['#', '&']) {
                session.send_numeric(
                    &self.server.hostname,
                    ERR_NOSUCHCHANNEL,
                    &format!("The channel \"{name}\" does not exist"),
                );
                continue;
            }

            if session.joined(name) {
                continue;
            }

            // Both sides of the membership relation move together.
            session.join_channel(name);
            let channel = self
                .channels
                .entry(name.to_string())
                .or_insert_with(|| Channel::new(name));
            channel.add_member(Arc::clone(session));

            channel.broadcast(session, "JOIN", "", false);
            if channel.topic.is_empty() {
                session.send_targeted_numeric(
                    &self.server.hostname,
                    RPL_NOTOPIC,
                    name,
                    "No topic is set",
                );
            } else {
                session.send_targeted_numeric(
                    &self.server.hostname,
                    RPL_TOPIC,
                    name,
                    &channel.topic,
                );
            }
            channel.name_reply(&self.server.hostname, session);
        }
    }

    fn handle_part(&mut self, session: &Arc<Session>, intent: &Intent) {
        let reason = intent.body.trim();
        for name in intent.target.split(',') {
            let Some(channel) = self.channels.get_mut(name) else {
                session.send_numeric(
                    &self.server.hostname,
                    ERR_NOSUCHCHANNEL,
                    "That channel does not exist",
                );
                continue;
            };

            if session.joined(name) {
                channel.broadcast(session, "PART", reason, false);
                let nick = session.nick();
                channel.remove_member(&nick);
                session.leave_channel(name);
            } else {
                session.send_numeric(
                    &self.server.hostname,
                    ERR_NOTONCHANNEL,
                    "You can't leave a channel you aren't in.",
                );
            }
        }
    }

    fn handle_privmsg(&mut self, session: &Arc<Session>, intent: &Intent) {
        let target = intent.target.as_str();
        if !intent.valid || target.len() <= 1 {
            session.send_numeric(
                &self.server.hostname,
                ERR_NORECIPIENT,
                "No recipient given (PRIVMSG)",
            );
            return;
        }

        if target.starts_with(['#', '&']) {
            match self.channels.get(target) {
                Some(channel) => {
                    let restricted = channel.has_mode(NO_EXTERNAL_MESSAGES);
                    if restricted && !session.joined(target) {
                        session.send_targeted_numeric(
                            &self.server.hostname,
                            ERR_CANNOTSENDTOCHAN,
                            target,
                            "Cannot send to channel (you need to join first)",
                        );
                    } else {
                        channel.broadcast(session, "PRIVMSG", &intent.body, true);
                    }
                }
                None => {
                    session.send_targeted_numeric(
                        &self.server.hostname,
                        ERR_CANNOTSENDTOCHAN,
                        target,
                        "Cannot send to channel",
                    );
                }
            }
        } else {
            match self.users.get(target) {
                Some(recipient) => {
                    recipient.send_message(&format!(
                        "{} PRIVMSG {} :{}",
                        session.nick(),
                        recipient.nick(),
                        intent.body
                    ));
                }
                None => {
                    session.send_targeted_numeric(
                        &self.server.hostname,
                        ERR_NOSUCHNICK,
                        target,
                        "No such nick",
                    );
                }
            }
        }
    }

    fn handle_mode(&mut self, session: &Arc<Session>, intent: &Intent) {
        let target = intent.target.as_str();
        if !intent.valid || target.is_empty() {
            session.send_targeted_numeric(
                &self.server.hostname,
                ERR_NEEDMOREPARAMS,
                "MODE",
                "Need more parameters",
            );
            return;
        }

        if target.len() > 1 && target.starts_with(['#', '&']) {
            match self.channels.get(target) {
                Some(channel) => {
                    session.send_message(&format!(
                        "{} {} {} {target} +{}",
                        self.server.hostname,
                        pad_numeric(RPL_CHANNELMODEIS),
                        session.nick(),
                        channel.mode
                    ));
                }
                None => {
                    session.send_targeted_numeric(
                        &self.server.hostname,
                        ERR_NOSUCHCHANNEL,
                        target,
                        "No such channel",
                    );
                }
            }
        } else if target.len() > 1 {
            match self.users.get(target) {
                Some(user) => {
                    let mode = user.state.lock().mode.clone();
                    session.send_message(&format!(
                        "{} {} {} {target} +{mode}",
                        self.server.hostname,
                        pad_numeric(RPL_UMODEIS),
                        session.nick()
                    ));
                }
                None => {
                    session.send_targeted_numeric(
                        &self.server.hostname,
                        ERR_NOSUCHNICK,
                        target,
                        "No such nick",
                    );
                }
            }
        } else {
            warn!(target = %target, "MODE target too short to resolve");
        }
    }

    fn handle_topic(&mut self, session: &Arc<Session>, intent: &Intent) {
        if !intent.valid {
            debug!(nick = %session.nick(), "Malformed TOPIC ignored");
            return;
        }

        match self.channels.get_mut(&intent.target) {
            Some(channel) => {
                channel.topic = intent.body.clone();
                channel.broadcast(session, "TOPIC", &intent.body, false);
            }
            None => {
                session.send_numeric(
                    &self.server.hostname,
                    ERR_NOSUCHCHANNEL,
                    &format!("{}: No such channel", intent.target),
                );
            }
        }
    }

    fn handle_ping(&mut self, session: &Arc<Session>, intent: &Intent) {
        session.state.lock().last_seen = Utc::now().timestamp();
        let host = &self.server.hostname;
        session.send_message(&format!("{host} PONG {host} :{}", intent.body));
    }

    fn handle_user(&mut self, session: &Arc<Session>, intent: &Intent) {
        if !intent.valid {
            debug!("Invalid USER command");
            return;
        }

        let nick = session.nick();
        if nick.len() <= 1 {
            // The client must register a nick first and resend USER.
            debug!("USER before NICK; ignoring");
            return;
        }

        // <username> <mode> <unused> :<realname>
        let mut fields = intent.body.splitn(4, ' ');
        let username = fields.next().unwrap_or("").trim().to_string();
        let _mode = fields.next();
        let _unused = fields.next();
        let realname = fields
            .next()
            .unwrap_or("")
            .trim_matches([' ', ':'])
            .to_string();

        {
            let mut state = session.state.lock();
            state.username = username;
            state.realname = realname;
            state.registered = true;
            info!(nick = %nick, realname = %state.realname, "User registered");
        }

        session.send_raw(&format!("PING :{}", self.server.hostname));
        self.send_welcome(session);
    }

    fn handle_quit(&mut self, session: &Arc<Session>, reason: &str) {
        let was_alive = session.shutdown();
        let nick = session.nick();
        if was_alive {
            let state = session.state.lock();
            info!(
                nick = %nick,
                registered = state.registered,
                last_seen = state.last_seen,
                "Session quit"
            );
        }

        // Draining the joined list makes a second quit (command followed by
        // the synthetic disconnect) a no-op.
        let joined = std::mem::take(&mut session.state.lock().channels);
        for name in &joined {
            if let Some(channel) = self.channels.get_mut(name) {
                channel.broadcast(session, "QUIT", reason, false);
                channel.remove_member(&nick);
                debug!(channel = %name, remaining = channel.members().len(), "Membership pruned");
            }
        }

        // Only unmap the nick if it still points at this session; a newer
        // session may have claimed it in the meantime.
        let still_mapped = self
            .users
            .get(&nick)
            .is_some_and(|holder| Arc::ptr_eq(holder, session));
        if still_mapped {
            self.users.remove(&nick);
        }
    }

    fn send_welcome(&self, session: &Arc<Session>) {
        let host = &self.server.hostname;
        session.send_numeric(
            host,
            RPL_WELCOME,
            &format!("Welcome to the Internet Relay Network {}", session.identity()),
        );
        session.send_numeric(
            host,
            RPL_YOURHOST,
            &format!("Your host is {host}, running version {VERSION}"),
        );
        session.send_numeric(
            host,
            RPL_CREATED,
            &format!(
                "This server was started on {}",
                self.server.started.format(TIME_FORMAT)
            ),
        );
        session.send_numeric(host, RPL_MYINFO, &format!("{host} {VERSION} + +"));
        session.send_numeric(
            host,
            RPL_ISUPPORT,
            &format!("CASEMAPPING NICKLEN=16 NETWORK={}", self.server.network),
        );
        self.send_motd(session);
    }

    fn send_motd(&self, session: &Arc<Session>) {
        let host = &self.server.hostname;
        session.send_numeric(
            host,
            RPL_MOTDSTART,
            &format!("- {host} message of the day"),
        );
        for line in &self.server.motd {
            session.send_numeric(host, RPL_MOTD, line);
        }
        session.send_numeric(host, RPL_ENDOFMOTD, "End of MOTD command");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn test_server() -> Arc<ServerInfo> {
        Arc::new(ServerInfo {
            hostname: "irc.test".into(),
            network: "TestNet".into(),
            default_cloak: None,
            motd: vec!["welcome".into()],
            started: Local::now(),
        })
    }

    fn connect() -> (Arc<Session>, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session::new("127.0.0.1:50000".parse().unwrap(), None, tx));
        (session, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    fn send(dispatcher: &mut Dispatcher, session: &Arc<Session>, line: &str) {
        dispatcher.apply(Event {
            session: Arc::clone(session),
            intent: Intent::parse(line),
        });
    }

    #[test]
    fn join_creates_channel_with_sole_member() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        drain(&mut rx);

        send(&mut dispatcher, &anna, "JOIN #test");

        assert!(dispatcher.channels.contains_key("#test"));
        assert_eq!(dispatcher.channels["#test"].members().len(), 1);
        assert!(anna.joined("#test"));

        let lines = drain(&mut rx);
        assert_eq!(lines[0], ":anna!@127.0.0.1 JOIN #test");
        assert_eq!(lines[1], ":irc.test 331 anna #test :No topic is set");
        assert_eq!(lines[2], ":irc.test 353 anna = #test :anna");
        assert_eq!(lines[3], ":irc.test 366 anna #test :End of NAMES list");
    }

    #[test]
    fn join_rejects_malformed_channel_names() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        drain(&mut rx);

        send(&mut dispatcher, &anna, "JOIN badname");
        let lines = drain(&mut rx);
        assert!(lines[0].contains("403"));
        assert!(dispatcher.channels.is_empty());
    }

    #[test]
    fn channel_privmsg_reaches_others_without_self_echo() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut anna_rx) = connect();
        let (bob, mut bob_rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        send(&mut dispatcher, &bob, "NICK bob");
        send(&mut dispatcher, &anna, "JOIN #test");
        send(&mut dispatcher, &bob, "JOIN #test");
        drain(&mut anna_rx);
        drain(&mut bob_rx);

        send(&mut dispatcher, &anna, "PRIVMSG #test :hello there");

        assert_eq!(
            drain(&mut bob_rx),
            vec![":anna!@127.0.0.1 PRIVMSG #test :hello there"]
        );
        assert!(drain(&mut anna_rx).is_empty());
    }

    #[test]
    fn external_privmsg_is_rejected_on_n_mode() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut anna_rx) = connect();
        let (eve, mut eve_rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        send(&mut dispatcher, &eve, "NICK eve");
        send(&mut dispatcher, &anna, "JOIN #test");
        drain(&mut anna_rx);

        send(&mut dispatcher, &eve, "PRIVMSG #test :let me in");

        let lines = drain(&mut eve_rx);
        assert_eq!(
            lines,
            vec![":irc.test 404 eve #test :Cannot send to channel (you need to join first)"]
        );
        assert!(drain(&mut anna_rx).is_empty());
    }

    #[test]
    fn direct_privmsg_is_delivered() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut anna_rx) = connect();
        let (bob, mut bob_rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        send(&mut dispatcher, &bob, "NICK bob");
        drain(&mut anna_rx);
        drain(&mut bob_rx);

        send(&mut dispatcher, &anna, "PRIVMSG bob :psst");
        assert_eq!(drain(&mut bob_rx), vec![":anna PRIVMSG bob :psst"]);

        send(&mut dispatcher, &anna, "PRIVMSG ghost :anyone");
        assert_eq!(
            drain(&mut anna_rx),
            vec![":irc.test 401 anna ghost :No such nick"]
        );
    }

    #[test]
    fn nick_in_use_leaves_own_nick_unchanged() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut anna_rx) = connect();
        let (bob, mut bob_rx) = connect();
        send(&mut dispatcher, &anna, "NICK cameron");
        send(&mut dispatcher, &bob, "NICK bob");
        drain(&mut anna_rx);
        drain(&mut bob_rx);

        send(&mut dispatcher, &bob, "NICK cameron");

        let lines = drain(&mut bob_rx);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("433"));
        assert_eq!(bob.nick(), "bob");
        assert!(Arc::ptr_eq(&dispatcher.users["cameron"], &anna));
    }

    #[test]
    fn invalid_nick_is_erroneus() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        drain(&mut rx);

        send(&mut dispatcher, &anna, "NICK loooooooooongnick");

        let lines = drain(&mut rx);
        assert!(lines[0].contains("432"));
        assert_eq!(anna.nick(), "anna");
    }

    #[test]
    fn nick_change_moves_directory_key() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        send(&mut dispatcher, &anna, "NICK annie");
        drain(&mut rx);

        assert!(!dispatcher.users.contains_key("anna"));
        assert!(Arc::ptr_eq(&dispatcher.users["annie"], &anna));
        assert_eq!(anna.nick(), "annie");
    }

    #[test]
    fn part_removes_membership_on_both_sides() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut anna_rx) = connect();
        let (bob, mut bob_rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        send(&mut dispatcher, &bob, "NICK bob");
        send(&mut dispatcher, &anna, "JOIN #test");
        send(&mut dispatcher, &bob, "JOIN #test");
        drain(&mut anna_rx);
        drain(&mut bob_rx);

        send(&mut dispatcher, &anna, "PART #test :gone");

        assert_eq!(
            drain(&mut bob_rx),
            vec![":anna!@127.0.0.1 PART #test :gone"]
        );
        assert!(!anna.joined("#test"));
        assert_eq!(dispatcher.channels["#test"].members().len(), 1);

        // A second PART is now an error.
        send(&mut dispatcher, &anna, "PART #test");
        let lines = drain(&mut anna_rx);
        assert!(lines.last().unwrap().contains("442"));
    }

    #[test]
    fn quit_scrubs_channels_and_directory() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut anna_rx) = connect();
        let (bob, mut bob_rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        send(&mut dispatcher, &bob, "NICK bob");
        send(&mut dispatcher, &anna, "JOIN #test");
        send(&mut dispatcher, &anna, "JOIN #other");
        send(&mut dispatcher, &bob, "JOIN #test");
        drain(&mut anna_rx);
        drain(&mut bob_rx);

        send(&mut dispatcher, &anna, "QUIT :bye now");

        assert_eq!(
            drain(&mut bob_rx),
            vec![":anna!@127.0.0.1 QUIT #test :bye now"]
        );
        assert!(!dispatcher.users.contains_key("anna"));
        assert_eq!(dispatcher.channels["#test"].members().len(), 1);
        assert!(dispatcher.channels["#other"].members().is_empty());
        assert!(!anna.is_alive());
        assert!(anna.state.lock().channels.is_empty());

        // The synthetic disconnect that follows is a no-op.
        dispatcher.apply(Event {
            session: Arc::clone(&anna),
            intent: Intent::disconnect(),
        });
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[test]
    fn registration_sends_welcome_sequence() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut rx) = connect();

        // USER before NICK is log-only.
        send(&mut dispatcher, &anna, "USER anna 0 * :Anna the Brave");
        assert!(drain(&mut rx).is_empty());
        assert!(!anna.state.lock().registered);

        send(&mut dispatcher, &anna, "NICK anna");
        send(&mut dispatcher, &anna, "USER anna 0 * :Anna the Brave");

        assert!(anna.state.lock().registered);
        assert_eq!(anna.state.lock().realname, "Anna the Brave");

        let lines = drain(&mut rx);
        assert_eq!(lines[0], "PING :irc.test");
        assert!(lines[1].starts_with(":irc.test 001 anna :Welcome"));
        assert!(lines[2].contains("002"));
        assert!(lines[3].contains("003"));
        assert!(lines[4].contains("004"));
        assert!(lines[5].contains("NETWORK=TestNet"));
        // MOTD start, one line, end.
        assert!(lines[6].contains("375"));
        assert_eq!(lines[7], ":irc.test 372 anna :welcome");
        assert!(lines[8].contains("376"));
    }

    #[test]
    fn ping_echoes_token_and_updates_last_seen() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        drain(&mut rx);

        send(&mut dispatcher, &anna, "PING :12345");
        assert_eq!(
            drain(&mut rx),
            vec![":irc.test PONG irc.test :12345"]
        );
        assert!(anna.state.lock().last_seen > 0);
    }

    #[test]
    fn mode_reports_channel_and_user_modes() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        send(&mut dispatcher, &anna, "JOIN #test");
        drain(&mut rx);

        send(&mut dispatcher, &anna, "MODE #test");
        assert_eq!(drain(&mut rx), vec![":irc.test 324 anna #test +n"]);

        send(&mut dispatcher, &anna, "MODE #nowhere");
        assert!(drain(&mut rx)[0].contains("403"));

        // Parser lower-cases MODE targets, so user lookups are by the
        // lowercase nick.
        send(&mut dispatcher, &anna, "MODE anna");
        assert_eq!(drain(&mut rx), vec![":irc.test 221 anna anna +"]);

        send(&mut dispatcher, &anna, "MODE");
        assert!(drain(&mut rx)[0].contains("461"));
    }

    #[test]
    fn topic_updates_and_broadcasts() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        send(&mut dispatcher, &anna, "JOIN #test");
        drain(&mut rx);

        send(&mut dispatcher, &anna, "TOPIC #test :news");
        assert_eq!(dispatcher.channels["#test"].topic, "news");
        assert_eq!(
            drain(&mut rx),
            vec![":anna!@127.0.0.1 TOPIC #test :news"]
        );

        // Clearing the topic is valid.
        send(&mut dispatcher, &anna, "TOPIC #test :");
        assert_eq!(dispatcher.channels["#test"].topic, "");
    }

    #[test]
    fn unknown_command_gets_421() {
        let mut dispatcher = Dispatcher::new(test_server());
        let (anna, mut rx) = connect();
        send(&mut dispatcher, &anna, "NICK anna");
        drain(&mut rx);

        send(&mut dispatcher, &anna, "FROBNICATE all the things");
        assert_eq!(
            drain(&mut rx),
            vec![":irc.test 421 anna :Unknown command"]
        );
    }
}
