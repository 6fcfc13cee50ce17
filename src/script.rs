//! The browser side of the reload protocol.
//!
//! A development server serves [`RELOAD_SCRIPT`] at [`RELOAD_SCRIPT_PATH`]
//! and links it from every page it renders. The script speaks the same
//! signals as [`ReloadClient`](crate::reload::ReloadClient).

/// The reload script.
pub const RELOAD_SCRIPT: &str = include_str!("../assets/reload.js");

/// Path the script is conventionally served at.
pub const RELOAD_SCRIPT_PATH: &str = "/reload.js";

/// `Content-Type` to serve the script with.
pub const RELOAD_SCRIPT_CONTENT_TYPE: &str = "application/javascript";

/// A `<script>` tag that loads the script from [`RELOAD_SCRIPT_PATH`].
pub fn script_tag() -> String {
    format!(r#"<script src="{RELOAD_SCRIPT_PATH}"></script>"#)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ReloadSignal;

    #[test]
    fn script_subscribes_to_default_events_path() {
        assert!(RELOAD_SCRIPT.contains(r#"new EventSource("/sse")"#));
    }

    #[test]
    fn script_handles_every_signal() {
        for signal in [ReloadSignal::Value, ReloadSignal::Page, ReloadSignal::Legacy] {
            let literal = format!("\"{}\"", signal.as_str());
            assert!(RELOAD_SCRIPT.contains(&literal), "missing {literal}");
        }
    }

    #[test]
    fn tag_points_at_script_path() {
        assert_eq!(script_tag(), r#"<script src="/reload.js"></script>"#);
    }
}
