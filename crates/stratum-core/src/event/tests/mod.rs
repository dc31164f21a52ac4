#[cfg(test)]
mod types_tests;

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use crate::event::{EventBus, EventDraft, SystemEvent};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Quote {
        symbol: String,
        price: f64,
    }

    #[tokio::test]
    async fn test_publish_stamps_id_and_timestamp() {
        let bus = EventBus::new();
        let first = bus.publish(EventDraft::new("x", "test")).await.expect("publish failed");
        let second = bus.publish(EventDraft::new("x", "test")).await.expect("publish failed");

        assert!(!first.id.is_empty());
        assert_ne!(first.id, second.id, "Each event should receive a fresh id");
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_decode_payload_at_boundary() {
        let bus = EventBus::new();
        let event = bus
            .publish(EventDraft::new("market.quote", "test").with_data(json!({"symbol": "ACME", "price": 12.5})))
            .await
            .expect("publish failed");

        let quote: Quote = event.decode().expect("decode failed");
        assert_eq!(quote, Quote { symbol: "ACME".into(), price: 12.5 });

        let bad: crate::kernel::Result<Vec<String>> = event.decode();
        assert!(bad.is_err(), "Decoding into the wrong shape should fail");
    }

    #[tokio::test]
    async fn test_draft_builders() {
        let draft = EventDraft::system(SystemEvent::PluginLoaded, "registry")
            .with_target("p1")
            .with_metadata("attempt", json!(2));
        assert_eq!(draft.event_type, "plugin.loaded");

        let bus = EventBus::new();
        let event = bus.publish(draft).await.expect("publish failed");
        assert_eq!(event.target.as_deref(), Some("p1"));
        assert_eq!(event.metadata_value("attempt"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_empty_event_type_rejected() {
        let bus = EventBus::new();
        let result = bus.publish(EventDraft::new("", "test")).await;
        assert!(result.is_err());
        assert!(bus.history(None).is_empty(), "Rejected events must not be recorded");
    }
}
