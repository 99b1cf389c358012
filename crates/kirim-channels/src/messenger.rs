use async_trait::async_trait;

use crate::{
    error::ChannelError,
    types::{ChannelStatus, MediaKind, RecipientHandle},
};

/// Common interface implemented by every messenger adapter.
///
/// Implementations must be `Send + Sync` so one long-lived handle can be
/// shared between the tick driver and the HTTP layer. The scheduler calls
/// each method at most once per job and never retries within a dispatch
/// attempt — transient-failure recovery belongs to the adapter's session
/// layer, not the caller.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"whatsapp"`).
    fn name(&self) -> &str;

    /// Establish the connection to the external service.
    ///
    /// Implementations should transition their internal state to
    /// [`ChannelStatus::Connected`] on success.
    async fn connect(&self) -> Result<(), ChannelError>;

    /// Gracefully close the connection.
    async fn disconnect(&self) -> Result<(), ChannelError>;

    /// Resolve an operator-entered destination identifier to a
    /// channel-native handle.
    ///
    /// Fails closed: an unregistered or unreachable identifier returns
    /// [`ChannelError::RecipientInvalid`], and the caller must not attempt
    /// a send.
    async fn resolve_recipient(&self, identifier: &str) -> Result<RecipientHandle, ChannelError>;

    /// Deliver a plain text message.
    async fn send_text(&self, to: &RecipientHandle, text: &str) -> Result<(), ChannelError>;

    /// Deliver a media message with an optional caption.
    async fn send_media(
        &self,
        to: &RecipientHandle,
        bytes: &[u8],
        kind: MediaKind,
        caption: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}
