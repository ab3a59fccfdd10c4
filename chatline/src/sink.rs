//! The display and interaction surface the session reports to.
//!
//! The session never talks to a terminal or window directly. Everything it
//! wants to show, and every value it needs from the user, goes through a
//! [`PresentationSink`], which keeps the protocol core testable without any
//! display.

use std::future::Future;

/// Display/interaction boundary consumed by [`crate::session::Session`].
pub trait PresentationSink: Send + Sync {
    /// Ask the user which server port to connect to.
    ///
    /// `None` means the user gave no usable port.
    fn prompt_for_port(&self) -> impl Future<Output = Option<u16>> + Send;

    /// Ask the user for a candidate display name.
    ///
    /// `None` means the user cancelled name entry.
    fn prompt_for_name(&self) -> impl Future<Output = Option<String>> + Send;

    /// Show a line (possibly several, already reflowed) in the chat pane.
    fn display_line(&self, text: &str);

    /// Replace the displayed participant list.
    fn show_roster(&self, names: &[String]);

    /// Show a human-readable error.
    fn report_error(&self, message: &str);

    /// Abandon any prompt still waiting for input; it resolves to `None`.
    fn cancel_prompt(&self) {}
}
