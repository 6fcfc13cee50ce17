//! Reload signals carried as event-stream message payloads.
//!
//! The server sends one of these string literals as the `data` of a
//! message:
//!
//! | Payload        | Meaning                                        |
//! |----------------|------------------------------------------------|
//! | `reload_value` | refetch the current URL and replace the document |
//! | `reload_page`  | full page reload                               |
//! | `reload`       | legacy alias of `reload_value`                 |
//!
//! Anything else is ignored. Matching is exact: no trimming, no case folding.

use std::fmt;
use std::str::FromStr;

/// A recognised reload signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReloadSignal {
    /// `reload_value`: the data behind the page changed.
    Value,
    /// `reload_page`: the page itself changed.
    Page,
    /// `reload`: the single-signal protocol; treated as [`ReloadSignal::Value`].
    Legacy,
}

impl ReloadSignal {
    /// The payload literal for this signal.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Value => "reload_value",
            Self::Page => "reload_page",
            Self::Legacy => "reload",
        }
    }

    /// Parses a message payload, returning `None` for anything unrecognised.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "reload_value" => Some(Self::Value),
            "reload_page" => Some(Self::Page),
            "reload" => Some(Self::Legacy),
            _ => None,
        }
    }

    /// What the client does in response to this signal.
    pub fn action(self) -> Action {
        match self {
            Self::Value | Self::Legacy => Action::Replace,
            Self::Page => Action::Reload,
        }
    }
}

impl fmt::Display for ReloadSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a payload is not a reload signal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised reload signal `{0}`")]
pub struct UnknownSignal(pub String);

impl FromStr for ReloadSignal {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownSignal(s.to_owned()))
    }
}

/// The effect a message has on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// GET the page's own URL and replace the whole document with the body.
    Replace,
    /// Invoke the page's full-reload primitive.
    Reload,
    /// Leave the page alone.
    Ignore,
}

/// Maps a message payload to the action the client takes.
///
/// # Examples
///
/// ```
/// use livereload::signal::{dispatch, Action};
///
/// assert_eq!(dispatch("reload_value"), Action::Replace);
/// assert_eq!(dispatch("reload"), Action::Replace);
/// assert_eq!(dispatch("reload_page"), Action::Reload);
/// assert_eq!(dispatch("Reload_Page"), Action::Ignore);
/// ```
pub fn dispatch(payload: &str) -> Action {
    ReloadSignal::parse(payload).map_or(Action::Ignore, ReloadSignal::action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_signal_round_trips_through_its_literal() {
        for signal in [ReloadSignal::Value, ReloadSignal::Page, ReloadSignal::Legacy] {
            assert_eq!(signal.as_str().parse::<ReloadSignal>(), Ok(signal));
        }
    }

    #[test]
    fn legacy_alias_replaces_like_reload_value() {
        assert_eq!(ReloadSignal::Legacy.action(), ReloadSignal::Value.action());
    }

    #[test]
    fn near_misses_are_ignored() {
        for payload in [
            "",
            " reload_value",
            "reload_value\n",
            "RELOAD",
            "reload_values",
            "reload-page",
            "{\"type\":\"reload\"}",
        ] {
            assert_eq!(dispatch(payload), Action::Ignore, "payload {payload:?}");
        }
    }

    #[test]
    fn unknown_signal_error_names_payload() {
        let err = "ping".parse::<ReloadSignal>().unwrap_err();
        assert_eq!(err.to_string(), "unrecognised reload signal `ping`");
    }
}
