use serde::{Deserialize, Serialize};

/// A resolved, channel-native delivery address.
///
/// Produced by [`Messenger::resolve_recipient`](crate::Messenger::resolve_recipient)
/// from the operator-entered destination identifier. For WhatsApp this is a
/// JID ("6281…@s.whatsapp.net" or "…@g.us"); other channels use whatever the
/// platform considers canonical. Opaque to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientHandle(pub String);

impl RecipientHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecipientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of media payload handed to [`Messenger::send_media`](crate::Messenger::send_media).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// Runtime connection state of a messenger adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Cleanly disconnected (not an error condition).
    Disconnected,

    /// An unrecoverable (or pre-retry) error occurred.
    Error(String),
}
