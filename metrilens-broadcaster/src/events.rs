use std::fmt;

/// Token that tells a subscriber its cached view is stale
pub const RELOAD_TOKEN: &str = "Reload";

/// Notifications carried on the reload channel.
///
/// The wire form is one UTF-8 line per notification with no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Re-fetch and re-render
    Reload,
}

impl Notification {
    pub fn token(&self) -> &'static str {
        match self {
            Notification::Reload => RELOAD_TOKEN,
        }
    }

    /// Token followed by the line terminator
    pub fn to_line(&self) -> String {
        format!("{}\n", self.token())
    }

    /// Recognize a received line. A line starting with the token counts.
    pub fn parse(line: &str) -> Option<Self> {
        if line.starts_with(RELOAD_TOKEN) {
            Some(Notification::Reload)
        } else {
            None
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
