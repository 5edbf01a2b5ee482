use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::normalize::ItemRef;
use crate::remote::client::{Document, DocumentStore, RemoteError};
use crate::remote::value;

pub const EVENTS_COLLECTION: &str = "weeklyEvents";
const ORDER_BY: &str = "startDate desc";

/// Time-bounded boost, e.g. a double-drop weekend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeeklyEvent {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub rate_multiplier: f64,
    pub targets: Vec<ItemRef>,
}

impl WeeklyEvent {
    /// Start inclusive, end exclusive. Events missing either bound are never
    /// active.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= now && now < end,
            _ => false,
        }
    }

    fn from_document(doc: Document) -> Result<Self, RemoteError> {
        let mut event: WeeklyEvent = serde_json::from_value(Value::Object(doc.fields))
            .map_err(|e| RemoteError::Malformed(format!("event {}: {}", doc.id, e)))?;
        event.id = doc.id;
        Ok(event)
    }
}

/// All events, newest start first. Documents that do not decode are logged
/// and left out.
pub async fn list_events(store: &DocumentStore) -> Result<Vec<WeeklyEvent>, RemoteError> {
    let events = store
        .list_documents(EVENTS_COLLECTION, Some(ORDER_BY))
        .await?
        .into_iter()
        .filter_map(|doc| match WeeklyEvent::from_document(doc) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Skipping event: {}", e);
                None
            }
        })
        .collect();
    Ok(events)
}

/// Creates the event when `id` is empty, otherwise merges into it. Returns
/// the stored id.
pub async fn save_event(store: &DocumentStore, event: &WeeklyEvent) -> Result<String, RemoteError> {
    let fields = match serde_json::to_value(event) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(RemoteError::Malformed("event is not an object".to_string())),
        Err(e) => return Err(RemoteError::Malformed(e.to_string())),
    };
    let mut typed = value::encode_fields(&fields);
    for (key, date) in [("startDate", &event.start_date), ("endDate", &event.end_date)] {
        if let Some(date) = date {
            typed.insert(key.to_string(), value::timestamp(date));
        }
    }

    let doc = if event.id.is_empty() {
        store.create_typed(EVENTS_COLLECTION, typed).await?
    } else {
        store.merge_typed(EVENTS_COLLECTION, &event.id, typed).await?
    };
    info!(id = %doc.id, title = %event.title, "Event saved");
    Ok(doc.id)
}

pub async fn delete_event(store: &DocumentStore, id: &str) -> Result<(), RemoteError> {
    store.delete_document(EVENTS_COLLECTION, id).await?;
    info!(%id, "Event deleted");
    Ok(())
}

/// Live view of the events collection: polls every `interval` and sends the
/// full list whenever it differs from the last one sent. Stops once the
/// receiver is dropped. Failed polls are logged and retried next tick.
pub fn spawn_subscription(store: Arc<DocumentStore>, interval: Duration, tx: mpsc::Sender<Vec<WeeklyEvent>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut last: Option<Vec<WeeklyEvent>> = None;
        info!(every = ?interval, "Event subscription started");

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            match list_events(&store).await {
                Ok(events) if last.as_ref() != Some(&events) => {
                    debug!(count = events.len(), "Events changed");
                    if tx.send(events.clone()).await.is_err() {
                        break;
                    }
                    last = Some(events);
                }
                Ok(_) => {}
                Err(e) => warn!("Event poll failed: {}", e),
            }
        }
        info!("Event subscription stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).single().unwrap()
    }

    async fn store(server: &MockServer) -> DocumentStore {
        let mut config = Config::default().remote;
        config.base_url = server.uri();
        DocumentStore::new(&config).unwrap()
    }

    fn event_doc(id: &str, start: &str, end: &str) -> Value {
        json!({
            "name": format!("x/weeklyEvents/{}", id),
            "fields": {
                "title": { "stringValue": format!("Event {}", id) },
                "startDate": { "timestampValue": start },
                "endDate": { "timestampValue": end },
                "rateMultiplier": { "doubleValue": 2.0 },
                "targets": { "arrayValue": { "values": [{ "stringValue": "m-001" }] } }
            }
        })
    }

    #[test]
    fn active_window_is_half_open() {
        let event = WeeklyEvent { start_date: Some(at(1)), end_date: Some(at(8)), ..WeeklyEvent::default() };
        assert!(event.is_active(at(1)));
        assert!(event.is_active(at(7)));
        assert!(!event.is_active(at(8)));
        assert!(!WeeklyEvent::default().is_active(at(1)));
    }

    #[tokio::test]
    async fn events_decode_with_normalized_targets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weeklyEvents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [event_doc("e2", "2024-05-08T00:00:00Z", "2024-05-15T00:00:00Z")]
            })))
            .mount(&server)
            .await;

        let events = list_events(&store(&server).await).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "e2");
        assert_eq!(events[0].targets, vec![ItemRef::new("m-001")]);
        assert_eq!(events[0].start_date, Some(at(8)));
        assert!(events[0].is_active(at(10)));
    }

    #[tokio::test]
    async fn new_events_are_posted_and_existing_ones_merged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/weeklyEvents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "x/weeklyEvents/abc", "fields": {} })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/weeklyEvents/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "x/weeklyEvents/abc", "fields": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server).await;
        let mut event = WeeklyEvent { title: "Double drops".into(), rate_multiplier: 2.0, ..WeeklyEvent::default() };
        event.id = save_event(&store, &event).await.unwrap();
        assert_eq!(event.id, "abc");
        save_event(&store, &event).await.unwrap();
    }

    #[tokio::test]
    async fn undecodable_events_are_skipped() {
        let server = MockServer::start().await;
        let mut date_only = event_doc("bad", "2024-05-01T00:00:00Z", "2024-05-08T00:00:00Z");
        date_only["fields"]["startDate"] = json!({ "stringValue": "2024-05-01" });
        Mock::given(method("GET"))
            .and(path("/weeklyEvents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [event_doc("e2", "2024-05-08T00:00:00Z", "2024-05-15T00:00:00Z"), date_only]
            })))
            .mount(&server)
            .await;

        let events = list_events(&store(&server).await).await.unwrap();
        assert_eq!(events.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["e2"]);
    }

    #[tokio::test]
    async fn dates_are_written_as_timestamps() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/weeklyEvents/e1"))
            .and(body_partial_json(json!({ "fields": {
                "startDate": { "timestampValue": "2024-05-01T00:00:00Z" },
                "endDate": { "timestampValue": "2024-05-08T00:00:00Z" },
                "title": { "stringValue": "Double drops" }
            } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "x/weeklyEvents/e1", "fields": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let event = WeeklyEvent {
            id: "e1".into(),
            title: "Double drops".into(),
            start_date: Some(at(1)),
            end_date: Some(at(8)),
            ..WeeklyEvent::default()
        };
        assert_eq!(save_event(&store(&server).await, &event).await.unwrap(), "e1");
    }

    #[tokio::test]
    async fn subscription_pushes_only_changes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weeklyEvents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [event_doc("e1", "2024-05-01T00:00:00Z", "2024-05-08T00:00:00Z")]
            })))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::channel(4);
        let handle = spawn_subscription(Arc::new(store(&server).await), Duration::from_millis(20), tx);

        let first = rx.recv().await.unwrap();
        assert_eq!(first[0].id, "e1");
        // Same data on later polls: nothing more is sent
        let more = tokio::time::timeout(Duration::from_millis(120), rx.recv()).await;
        assert!(more.is_err());

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
