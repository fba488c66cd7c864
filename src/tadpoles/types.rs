use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

/// One page of the events feed.
#[derive(Debug, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A single event from the feed.
///
/// Only the fields the sync loop consumes are modeled; the service sends
/// plenty more alongside them.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Capture time as fractional unix seconds.
    pub event_time: f64,
    /// Everything attached to the event. Only the count is meaningful here;
    /// the downloadable references live in `new_attachments`.
    #[serde(default)]
    pub attachments: Vec<Value>,
    #[serde(default)]
    pub new_attachments: Vec<AttachmentRef>,
}

impl Event {
    /// Capture time in UTC, truncated to whole seconds.
    pub fn event_time_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.event_time as i64, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Reference to one downloadable media item.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentRef {
    /// Opaque content key for the attachment endpoint.
    pub key: String,
    /// Declared media type, e.g. `image/jpeg` or `video/mp4`.
    pub mime_type: String,
}

/// A downloaded attachment body plus the filename the server declared for it.
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub bytes: bytes::Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_decodes_from_feed_json() {
        let raw = r#"{
            "event_time": 1696170872.52,
            "attachments": ["obj1"],
            "new_attachments": [{"key": "abc123", "mime_type": "image/jpeg", "extra": 1}]
        }"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_time_utc().timestamp(), 1_696_170_872);
        assert!(event.has_attachments());
        assert_eq!(event.new_attachments.len(), 1);
        assert_eq!(event.new_attachments[0].key, "abc123");
        assert_eq!(event.new_attachments[0].mime_type, "image/jpeg");
    }

    #[test]
    fn test_event_attachment_arrays_default_to_empty() {
        let event: Event = serde_json::from_str(r#"{"event_time": 1696170872.0}"#).unwrap();
        assert!(!event.has_attachments());
        assert!(event.new_attachments.is_empty());
    }

    #[test]
    fn test_events_page_defaults_to_no_events() {
        let page: EventsPage = serde_json::from_str("{}").unwrap();
        assert!(page.events.is_empty());
    }
}
