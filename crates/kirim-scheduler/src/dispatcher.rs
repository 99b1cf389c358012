use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use kirim_channels::{ChannelError, MediaKind, Messenger};
use kirim_core::types::{DestinationConfig, MediaType, Post};
use kirim_store::Store;

use crate::error::Result;

/// Failure message recorded when no destination row exists.
const NO_DESTINATION: &str = "destination not configured";

#[derive(Debug, Error)]
enum DispatchError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Media fetch failed: {0}")]
    MediaFetch(String),

    #[error("Post not found: {0}")]
    MissingPost(String),
}

/// Drives due jobs through the PENDING → SENDING → SENT/FAILED lifecycle.
///
/// Jobs are processed strictly in `scheduled_at` order and strictly
/// sequentially — the messenger is a single logical session, and a burst of
/// parallel sends is exactly what its rate limiting exists to prevent.
/// There is no automatic retry of FAILED jobs: the channel layer owns
/// transient reconnects, and re-sending against a stateful paired session
/// risks duplicates. An operator re-triggers by creating a new job.
pub struct Dispatcher {
    http: reqwest::Client,
    /// Ceiling for one job's resolve + fetch + send.
    job_timeout: Duration,
    /// Ceiling for downloading media bytes.
    media_timeout: Duration,
}

impl Dispatcher {
    pub fn new(job_timeout: Duration, media_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            job_timeout,
            media_timeout,
        }
    }

    /// Process every PENDING job due at or before `now`.
    ///
    /// Returns the number of jobs examined (sent + failed). One job's
    /// failure never aborts the batch; storage failures do, and propagate
    /// to the tick driver.
    pub async fn process_due(
        &self,
        store: &Store,
        messenger: &dyn Messenger,
        destination: Option<&DestinationConfig>,
        now: &DateTime<Utc>,
    ) -> Result<usize> {
        let due = store.due_jobs(now)?;
        if due.is_empty() {
            return Ok(0);
        }

        // Fail closed when there is nowhere to send: every due job is
        // marked FAILED without a single messenger call.
        let Some(destination) = destination else {
            warn!(count = due.len(), "no destination configured; failing due jobs");
            for job in &due {
                store.mark_failed(&job.id, NO_DESTINATION)?;
            }
            return Ok(due.len());
        };

        let mut processed = 0usize;
        for job in &due {
            processed += 1;
            store.mark_sending(&job.id)?;

            let post = match store.get_post(&job.post_id)? {
                Some(post) => post,
                None => {
                    let e = DispatchError::MissingPost(job.post_id.clone());
                    warn!(job_id = %job.id, error = %e, "job failed");
                    store.mark_failed(&job.id, &e.to_string())?;
                    continue;
                }
            };

            let attempt = tokio::time::timeout(
                self.job_timeout,
                self.dispatch_one(messenger, &destination.destination, &post),
            )
            .await;

            match attempt {
                Ok(Ok(())) => {
                    info!(job_id = %job.id, post_id = %post.id, "job sent");
                    store.mark_sent(&job.id, now)?;
                }
                Ok(Err(e)) => {
                    warn!(job_id = %job.id, error = %e, "job failed");
                    store.mark_failed(&job.id, &e.to_string())?;
                }
                Err(_) => {
                    let msg = format!(
                        "dispatch timed out after {}s",
                        self.job_timeout.as_secs()
                    );
                    warn!(job_id = %job.id, "{msg}");
                    store.mark_failed(&job.id, &msg)?;
                }
            }
        }

        Ok(processed)
    }

    /// One delivery attempt: resolve the recipient, then branch on the
    /// post's media type. Resolution fails closed — an invalid recipient
    /// never reaches a send call.
    async fn dispatch_one(
        &self,
        messenger: &dyn Messenger,
        destination: &str,
        post: &Post,
    ) -> std::result::Result<(), DispatchError> {
        let recipient = messenger.resolve_recipient(destination).await?;

        match post.media_type {
            MediaType::Text => {
                messenger.send_text(&recipient, &post.caption).await?;
            }
            MediaType::Image | MediaType::Video => {
                let bytes = self.fetch_media(&post.media_url).await?;
                let kind = match post.media_type {
                    MediaType::Image => MediaKind::Image,
                    _ => MediaKind::Video,
                };
                let caption = (!post.caption.is_empty()).then_some(post.caption.as_str());
                messenger
                    .send_media(&recipient, &bytes, kind, caption)
                    .await?;
            }
        }
        Ok(())
    }

    async fn fetch_media(&self, url: &str) -> std::result::Result<Vec<u8>, DispatchError> {
        let response = self
            .http
            .get(url)
            .timeout(self.media_timeout)
            .send()
            .await
            .map_err(|e| DispatchError::MediaFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| DispatchError::MediaFetch(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DispatchError::MediaFetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use kirim_channels::{ChannelStatus, RecipientHandle};
    use kirim_core::types::{DestinationKind, JobStatus};
    use kirim_store::{NewJob, NewPost};
    use std::sync::Mutex;

    /// Scripted messenger: records calls, optionally fails.
    #[derive(Default)]
    struct StubMessenger {
        sent: Mutex<Vec<String>>,
        reject_recipient: bool,
        fail_sends: bool,
        hang: bool,
    }

    #[async_trait]
    impl Messenger for StubMessenger {
        fn name(&self) -> &str {
            "stub"
        }

        async fn connect(&self) -> std::result::Result<(), ChannelError> {
            Ok(())
        }

        async fn disconnect(&self) -> std::result::Result<(), ChannelError> {
            Ok(())
        }

        async fn resolve_recipient(
            &self,
            identifier: &str,
        ) -> std::result::Result<RecipientHandle, ChannelError> {
            if self.reject_recipient {
                return Err(ChannelError::RecipientInvalid(format!(
                    "{identifier} is not registered"
                )));
            }
            Ok(RecipientHandle(format!("{identifier}@s.whatsapp.net")))
        }

        async fn send_text(
            &self,
            _to: &RecipientHandle,
            text: &str,
        ) -> std::result::Result<(), ChannelError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_sends {
                return Err(ChannelError::SendFailed("socket closed".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_media(
            &self,
            _to: &RecipientHandle,
            _bytes: &[u8],
            _kind: MediaKind,
            caption: Option<&str>,
        ) -> std::result::Result<(), ChannelError> {
            if self.fail_sends {
                return Err(ChannelError::SendFailed("socket closed".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push(caption.unwrap_or_default().to_string());
            Ok(())
        }

        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Duration::from_millis(200), Duration::from_millis(100))
    }

    fn destination() -> DestinationConfig {
        DestinationConfig {
            id: "default".to_string(),
            destination: "6281234567".to_string(),
            kind: DestinationKind::Single,
            updated_at: String::new(),
        }
    }

    fn text_post(store: &Store, caption: &str) -> String {
        store
            .create_post(NewPost {
                category_id: None,
                title: None,
                caption: caption.to_string(),
                media_type: MediaType::Text,
                media_url: String::new(),
                is_active: true,
            })
            .unwrap()
            .id
    }

    fn job_at(store: &Store, post_id: &str, at: DateTime<Utc>) {
        store
            .insert_job(NewJob {
                schedule_id: None,
                post_id: post_id.to_string(),
                scheduled_at: at,
            })
            .unwrap();
    }

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn due_jobs_are_sent_in_scheduled_order() {
        let store = Store::open_in_memory().unwrap();
        let a = text_post(&store, "first");
        let b = text_post(&store, "second");
        let c = text_post(&store, "third");
        // Inserted out of order on purpose.
        job_at(&store, &c, t(9, 2));
        job_at(&store, &a, t(9, 0));
        job_at(&store, &b, t(9, 1));

        let stub = StubMessenger::default();
        let n = dispatcher()
            .process_due(&store, &stub, Some(&destination()), &t(10, 0))
            .await
            .unwrap();

        assert_eq!(n, 3);
        assert_eq!(
            *stub.sent.lock().unwrap(),
            vec!["first", "second", "third"]
        );
    }

    #[tokio::test]
    async fn not_yet_due_jobs_are_untouched() {
        let store = Store::open_in_memory().unwrap();
        let p = text_post(&store, "later");
        job_at(&store, &p, t(15, 0));

        let stub = StubMessenger::default();
        let n = dispatcher()
            .process_due(&store, &stub, Some(&destination()), &t(10, 0))
            .await
            .unwrap();

        assert_eq!(n, 0);
        assert!(stub.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_destination_fails_all_without_sending() {
        let store = Store::open_in_memory().unwrap();
        let p = text_post(&store, "hello");
        job_at(&store, &p, t(9, 0));
        job_at(&store, &p, t(9, 30));

        let stub = StubMessenger::default();
        let n = dispatcher()
            .process_due(&store, &stub, None, &t(10, 0))
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert!(stub.sent.lock().unwrap().is_empty());
        for job in store.list_jobs(None, 10).unwrap() {
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.error_message.as_deref(), Some(NO_DESTINATION));
        }
    }

    #[tokio::test]
    async fn success_marks_sent_with_sent_at() {
        let store = Store::open_in_memory().unwrap();
        let p = text_post(&store, "hello");
        job_at(&store, &p, t(9, 0));

        let now = t(10, 0);
        let stub = StubMessenger::default();
        dispatcher()
            .process_due(&store, &stub, Some(&destination()), &now)
            .await
            .unwrap();

        let job = &store.list_jobs(None, 10).unwrap()[0];
        assert_eq!(job.status, JobStatus::Sent);
        assert_eq!(job.sent_at, Some(now));
    }

    #[tokio::test]
    async fn invalid_recipient_fails_closed() {
        let store = Store::open_in_memory().unwrap();
        let p = text_post(&store, "hello");
        job_at(&store, &p, t(9, 0));

        let stub = StubMessenger {
            reject_recipient: true,
            ..Default::default()
        };
        dispatcher()
            .process_due(&store, &stub, Some(&destination()), &t(10, 0))
            .await
            .unwrap();

        // No send happened, and the resolution error is captured verbatim.
        assert!(stub.sent.lock().unwrap().is_empty());
        let job = &store.list_jobs(None, 10).unwrap()[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job
            .error_message
            .as_deref()
            .unwrap()
            .contains("not registered"));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let store = Store::open_in_memory().unwrap();
        let missing = "no-such-post";
        let good = text_post(&store, "still goes out");
        job_at(&store, missing, t(9, 0));
        job_at(&store, &good, t(9, 1));

        let stub = StubMessenger::default();
        let n = dispatcher()
            .process_due(&store, &stub, Some(&destination()), &t(10, 0))
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(*stub.sent.lock().unwrap(), vec!["still goes out"]);
    }

    #[tokio::test]
    async fn send_failure_records_channel_error_verbatim() {
        let store = Store::open_in_memory().unwrap();
        let p = text_post(&store, "hello");
        job_at(&store, &p, t(9, 0));

        let stub = StubMessenger {
            fail_sends: true,
            ..Default::default()
        };
        dispatcher()
            .process_due(&store, &stub, Some(&destination()), &t(10, 0))
            .await
            .unwrap();

        let job = &store.list_jobs(None, 10).unwrap()[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("Send failed: socket closed")
        );
    }

    #[tokio::test]
    async fn hung_send_is_demoted_to_failed() {
        let store = Store::open_in_memory().unwrap();
        let p = text_post(&store, "hello");
        job_at(&store, &p, t(9, 0));

        let stub = StubMessenger {
            hang: true,
            ..Default::default()
        };
        dispatcher()
            .process_due(&store, &stub, Some(&destination()), &t(10, 0))
            .await
            .unwrap();

        let job = &store.list_jobs(None, 10).unwrap()[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.as_deref().unwrap().contains("timed out"));
    }
}
