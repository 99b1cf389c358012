//! `kirim-channels` — the messaging capability seam.
//!
//! The scheduler core never talks to WhatsApp directly. It holds an
//! `Arc<dyn Messenger>` and calls [`Messenger::resolve_recipient`],
//! [`Messenger::send_text`], and [`Messenger::send_media`]. Everything
//! session-shaped (pairing, reconnects, rate limiting) lives behind the
//! trait, inside the adapter.

pub mod backoff;
pub mod error;
pub mod messenger;
pub mod types;

pub use error::ChannelError;
pub use messenger::Messenger;
pub use types::{ChannelStatus, MediaKind, RecipientHandle};
