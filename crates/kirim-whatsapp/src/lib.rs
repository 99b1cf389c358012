//! `kirim-whatsapp` — WhatsApp adapter for the [`kirim_channels::Messenger`]
//! capability.
//!
//! The paired WhatsApp session itself (QR pairing, socket reconnects, rate
//! limiting) lives in a separate bridge process; this crate speaks plain
//! HTTP to it. One long-lived [`BridgeMessenger`] is constructed at startup
//! and injected wherever messages go out.

pub mod adapter;
pub mod phone;

pub use adapter::BridgeMessenger;
