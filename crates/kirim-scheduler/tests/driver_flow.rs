//! End-to-end tick flow: schedules in, messages out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use chrono_tz::Tz;

use kirim_channels::{ChannelError, ChannelStatus, MediaKind, Messenger, RecipientHandle};
use kirim_core::types::{DestinationKind, JobStatus, MediaType, ScheduleKind};
use kirim_scheduler::TickDriver;
use kirim_store::{NewJob, NewPost, NewSchedule, Store};

const TZ: Tz = chrono_tz::Asia::Pontianak;

/// Always-succeeding messenger that records every delivered caption.
#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn name(&self) -> &str {
        "recording"
    }
    async fn connect(&self) -> Result<(), ChannelError> {
        Ok(())
    }
    async fn disconnect(&self) -> Result<(), ChannelError> {
        Ok(())
    }
    async fn resolve_recipient(&self, identifier: &str) -> Result<RecipientHandle, ChannelError> {
        Ok(RecipientHandle(format!("{identifier}@s.whatsapp.net")))
    }
    async fn send_text(&self, _to: &RecipientHandle, text: &str) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
    async fn send_media(
        &self,
        _to: &RecipientHandle,
        _bytes: &[u8],
        _kind: MediaKind,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
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

/// Two store handles over one shared in-memory database — one for the
/// driver, one for the test to observe with.
fn shared_stores(name: &str) -> (Store, Store) {
    let uri = format!("file:{name}?mode=memory&cache=shared");
    let a = Store::new(rusqlite::Connection::open(&uri).unwrap()).unwrap();
    let b = Store::new(rusqlite::Connection::open(&uri).unwrap()).unwrap();
    (a, b)
}

fn driver(store: Store, messenger: Arc<dyn Messenger>) -> TickDriver {
    TickDriver::new(
        store,
        messenger,
        TZ,
        30,
        Duration::from_secs(60),
        Duration::from_secs(10),
        Duration::from_secs(5),
    )
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

#[tokio::test]
async fn once_yesterday_is_generated_and_sent_in_one_tick() {
    let (driver_store, store) = shared_stores("once_yesterday");
    let post_id = text_post(&store, "better late than never");
    let yesterday = (Utc::now() - ChronoDuration::days(1))
        .with_timezone(&TZ)
        .date_naive();

    store
        .create_schedule(NewSchedule {
            name: Some("one-shot".to_string()),
            post_id,
            kind: ScheduleKind::Once,
            time_of_day: "09:00".to_string(),
            start_date: yesterday,
            end_date: None,
            days_of_week: None,
            days_of_month: None,
            is_active: true,
        })
        .unwrap();
    store
        .set_destination("6281234567", DestinationKind::Single)
        .unwrap();

    let messenger = Arc::new(RecordingMessenger::default());
    let summary = driver(driver_store, messenger.clone())
        .run_once()
        .await
        .unwrap();

    assert_eq!(summary.jobs_generated, 1);
    assert_eq!(summary.jobs_processed, 1);
    assert_eq!(*messenger.sent.lock().unwrap(), vec!["better late than never"]);

    let jobs = store.list_jobs(None, 10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Sent);
    assert!(jobs[0].sent_at.is_some());
}

#[tokio::test]
async fn future_daily_schedule_generates_without_dispatching() {
    let (driver_store, store) = shared_stores("future_daily");
    let post_id = text_post(&store, "tomorrow's news");
    let today = Utc::now().with_timezone(&TZ).date_naive();

    store
        .create_schedule(NewSchedule {
            name: None,
            post_id,
            kind: ScheduleKind::Daily,
            // Two hours from now, local — nothing is due yet.
            time_of_day: (Utc::now().with_timezone(&TZ) + ChronoDuration::hours(2))
                .format("%H:%M")
                .to_string(),
            start_date: today,
            end_date: None,
            days_of_week: None,
            days_of_month: None,
            is_active: true,
        })
        .unwrap();
    store
        .set_destination("6281234567", DestinationKind::Single)
        .unwrap();

    let messenger = Arc::new(RecordingMessenger::default());
    let summary = driver(driver_store, messenger.clone())
        .run_once()
        .await
        .unwrap();

    assert!(summary.jobs_generated > 0);
    assert_eq!(summary.jobs_processed, 0);
    assert!(messenger.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn send_now_job_without_destination_fails_cleanly() {
    let (driver_store, store) = shared_stores("no_destination");
    let post_id = text_post(&store, "going nowhere");
    store
        .insert_job(NewJob {
            schedule_id: None,
            post_id,
            scheduled_at: Utc::now() - ChronoDuration::minutes(1),
        })
        .unwrap();

    let messenger = Arc::new(RecordingMessenger::default());
    let summary = driver(driver_store, messenger.clone())
        .run_once()
        .await
        .unwrap();

    assert_eq!(summary.jobs_processed, 1);
    assert!(messenger.sent.lock().unwrap().is_empty());
    let jobs = store.list_jobs(Some(JobStatus::Failed), 10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        jobs[0].error_message.as_deref(),
        Some("destination not configured")
    );
}
