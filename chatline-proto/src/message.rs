//! Wire format message types for the `Chatline` protocol.
//!
//! Every message exchanged with the chat server is a single [`Message`]
//! record: a [`MessageKind`] tag plus the optional fields that kind uses.
//! Field names match the JSON produced by the reference chat server
//! (`typeMessage`, `textMessage`, `listUsers`).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed vocabulary of protocol message kinds.
///
/// Serialized by name (`"TEXT_MESSAGE"`, `"NAME_ACCEPTED"`, ...). Any other
/// name fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// A chat line. Carries `text`.
    TextMessage,
    /// A participant joined. Carries the joining name in `text`.
    UserAdded,
    /// A participant left. Carries the leaving name in `text`.
    RemovedUser,
    /// Server asks the client for a display name.
    RequestNameUser,
    /// Server rejected the submitted name; the client must resubmit.
    NameUsed,
    /// Server accepted the submitted name. Carries the roster in `user_list`.
    NameAccepted,
    /// Client submits a candidate name in `text`.
    UserName,
    /// Client announces it is leaving.
    DisableUser,
}

impl MessageKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::TextMessage,
        Self::UserAdded,
        Self::RemovedUser,
        Self::RequestNameUser,
        Self::NameUsed,
        Self::NameAccepted,
        Self::UserName,
        Self::DisableUser,
    ];

    /// Returns the name used for this kind on the wire.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::TextMessage => "TEXT_MESSAGE",
            Self::UserAdded => "USER_ADDED",
            Self::RemovedUser => "REMOVED_USER",
            Self::RequestNameUser => "REQUEST_NAME_USER",
            Self::NameUsed => "NAME_USED",
            Self::NameAccepted => "NAME_ACCEPTED",
            Self::UserName => "USER_NAME",
            Self::DisableUser => "DISABLE_USER",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A single protocol message.
///
/// Only the fields meaningful for `kind` are set by the constructors;
/// receivers ignore the rest. Messages are built fresh for every send and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// What this message is.
    #[serde(rename = "typeMessage")]
    pub kind: MessageKind,
    /// Text payload: chat text or a participant name, depending on `kind`.
    #[serde(rename = "textMessage", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Roster snapshot, only sent with [`MessageKind::NameAccepted`].
    #[serde(rename = "listUsers", default, skip_serializing_if = "Option::is_none")]
    pub user_list: Option<BTreeSet<String>>,
}

impl Message {
    /// Creates a message of `kind` with no payload.
    #[must_use]
    pub const fn bare(kind: MessageKind) -> Self {
        Self {
            kind,
            text: None,
            user_list: None,
        }
    }

    fn with_text(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: Some(text.into()),
            user_list: None,
        }
    }

    /// A chat line.
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_text(MessageKind::TextMessage, text)
    }

    /// Notice that `name` joined the chat.
    pub fn user_added(name: impl Into<String>) -> Self {
        Self::with_text(MessageKind::UserAdded, name)
    }

    /// Notice that `name` left the chat.
    pub fn removed_user(name: impl Into<String>) -> Self {
        Self::with_text(MessageKind::RemovedUser, name)
    }

    /// Server request for a display name.
    #[must_use]
    pub const fn request_name() -> Self {
        Self::bare(MessageKind::RequestNameUser)
    }

    /// Server notice that the submitted name is taken.
    #[must_use]
    pub const fn name_used() -> Self {
        Self::bare(MessageKind::NameUsed)
    }

    /// Server acceptance carrying the current roster.
    pub fn name_accepted<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: MessageKind::NameAccepted,
            text: None,
            user_list: Some(users.into_iter().map(Into::into).collect()),
        }
    }

    /// Client name submission.
    pub fn user_name(name: impl Into<String>) -> Self {
        Self::with_text(MessageKind::UserName, name)
    }

    /// Client leave notice.
    #[must_use]
    pub const fn disable_user() -> Self {
        Self::bare(MessageKind::DisableUser)
    }

    /// Returns the text payload, if any.
    #[must_use]
    pub fn text_payload(&self) -> Option<&str> {
        self.text.as_deref()
    }
}
