//! Nick validity rules.

use regex::Regex;
use std::sync::LazyLock;

/// First character alphanumeric; up to 15 more characters, each alphanumeric
/// or one of `. [ ] ( ) - _`.
static NICK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.\[\]()\-_]{0,15}$").expect("nick regex")
});

/// Whether a nick satisfies the protocol naming rule.
pub fn valid_nick(nick: &str) -> bool {
    NICK_RE.is_match(nick)
}
