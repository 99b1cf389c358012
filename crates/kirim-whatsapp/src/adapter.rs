//! HTTP adapter for the WhatsApp session bridge.
//!
//! Endpoints consumed:
//!   GET  /session/status      → { connected }
//!   POST /session/disconnect
//!   POST /contacts/resolve    { number } → { exists, jid? }
//!   POST /messages/text       { jid, text }
//!   POST /messages/media      { jid, kind, caption?, data(base64) }

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kirim_channels::{ChannelError, ChannelStatus, MediaKind, Messenger, RecipientHandle};
use kirim_core::config::WhatsAppConfig;

use crate::phone::{is_group_id, normalize_number};

#[derive(Debug, Deserialize)]
struct SessionStatus {
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    exists: bool,
    jid: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResolveRequest<'a> {
    number: &'a str,
}

#[derive(Debug, Serialize)]
struct TextPayload<'a> {
    jid: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct MediaPayload<'a> {
    jid: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    data: String,
}

/// Long-lived messenger handle over the WhatsApp bridge.
///
/// Constructed once at startup and injected into the dispatcher. Holds no
/// session state of its own — the bridge owns the pairing; this struct only
/// tracks the last observed [`ChannelStatus`].
pub struct BridgeMessenger {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    status: RwLock<ChannelStatus>,
}

impl BridgeMessenger {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, ChannelError> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ChannelError::ConfigError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
            request_timeout,
            status: RwLock::new(ChannelStatus::Disconnected),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn set_status(&self, status: ChannelStatus) {
        *self.status.write().unwrap() = status;
    }

    fn map_error(&self, e: reqwest::Error, what: &str) -> ChannelError {
        if e.is_timeout() {
            ChannelError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else if e.is_connect() {
            ChannelError::ConnectionFailed(format!("{what}: {e}"))
        } else {
            ChannelError::SendFailed(format!("{what}: {e}"))
        }
    }

    /// POST a JSON payload and treat any non-2xx reply as a send failure.
    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
        what: &str,
    ) -> Result<reqwest::Response, ChannelError> {
        let response = self
            .http
            .post(self.url(path))
            .json(payload)
            .send()
            .await
            .map_err(|e| self.map_error(e, what))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed(format!(
                "{what}: bridge returned {status}: {body}"
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Messenger for BridgeMessenger {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn connect(&self) -> Result<(), ChannelError> {
        self.set_status(ChannelStatus::Connecting);

        let status: SessionStatus = self
            .http
            .get(self.url("/session/status"))
            .send()
            .await
            .map_err(|e| {
                let err = self.map_error(e, "session status");
                self.set_status(ChannelStatus::Error(err.to_string()));
                err
            })?
            .json()
            .await
            .map_err(|e| {
                let err = ChannelError::ConnectionFailed(format!("bad status payload: {e}"));
                self.set_status(ChannelStatus::Error(err.to_string()));
                err
            })?;

        if !status.connected {
            let err = ChannelError::ConnectionFailed(
                "bridge session is not paired with WhatsApp".to_string(),
            );
            self.set_status(ChannelStatus::Error(err.to_string()));
            return Err(err);
        }

        info!("WhatsApp bridge session connected");
        self.set_status(ChannelStatus::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ChannelError> {
        // Best effort — a dead bridge is already disconnected.
        if let Err(e) = self
            .http
            .post(self.url("/session/disconnect"))
            .send()
            .await
        {
            warn!(error = %e, "bridge disconnect request failed");
        }
        self.set_status(ChannelStatus::Disconnected);
        Ok(())
    }

    async fn resolve_recipient(&self, identifier: &str) -> Result<RecipientHandle, ChannelError> {
        // Group IDs are bridge-issued and need no registration check.
        if is_group_id(identifier) {
            return Ok(RecipientHandle(identifier.to_string()));
        }

        let number = normalize_number(identifier);
        if number.is_empty() {
            return Err(ChannelError::RecipientInvalid(format!(
                "{identifier:?} contains no digits"
            )));
        }

        let response = self
            .post_json(
                "/contacts/resolve",
                &ResolveRequest { number: &number },
                "contact resolve",
            )
            .await?;
        let resolved: ResolveResponse = response.json().await.map_err(|e| {
            ChannelError::SendFailed(format!("bad resolve payload: {e}"))
        })?;

        if !resolved.exists {
            return Err(ChannelError::RecipientInvalid(format!(
                "{number} is not registered on WhatsApp"
            )));
        }

        let jid = resolved
            .jid
            .unwrap_or_else(|| format!("{number}@s.whatsapp.net"));
        debug!(%number, %jid, "recipient resolved");
        Ok(RecipientHandle(jid))
    }

    async fn send_text(&self, to: &RecipientHandle, text: &str) -> Result<(), ChannelError> {
        self.post_json(
            "/messages/text",
            &TextPayload {
                jid: to.as_str(),
                text,
            },
            "text send",
        )
        .await?;
        debug!(jid = %to, "text message sent");
        Ok(())
    }

    async fn send_media(
        &self,
        to: &RecipientHandle,
        bytes: &[u8],
        kind: MediaKind,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        let kind_str = match kind {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        };
        self.post_json(
            "/messages/media",
            &MediaPayload {
                jid: to.as_str(),
                kind: kind_str,
                caption,
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
            "media send",
        )
        .await?;
        debug!(jid = %to, kind = kind_str, size = bytes.len(), "media message sent");
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        self.status.read().unwrap().clone()
    }
}
