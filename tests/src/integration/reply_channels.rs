//! # Reply Channel Lifecycle
//!
//! Creation with a heartbeat tag, idempotent close, cleanup on drop, and
//! reaping of channels whose owner vanished.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cq_01_client::{Client, ClientError, ClientOptions, ReplyChannelReaper};
    use serde_json::json;
    use shared_queue::QueueService;
    use shared_types::{unix_now_secs, CLIENT_QUEUE_HEARTBEAT_TAG, CLIENT_QUEUE_NAME_PREFIX};

    use crate::fixtures::{client_options, Harness, WORK_QUEUE};

    async fn channel_exists(harness: &Harness, name: &str) -> bool {
        harness.queue.resolve_address(name, None).await.is_ok()
    }

    #[tokio::test]
    async fn test_reply_channel_is_tagged_on_connect() {
        let harness = Harness::start().await;
        let client = harness.client().await;

        assert!(client.reply_channel_name().starts_with(CLIENT_QUEUE_NAME_PREFIX));
        let tags = harness.queue.queue_tags(client.reply_address()).await.unwrap();
        let stamped: u64 = tags[CLIENT_QUEUE_HEARTBEAT_TAG].parse().unwrap();
        assert!(stamped <= unix_now_secs());

        client.close().await.unwrap();
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let harness = Harness::start().await;
        let client = harness.client().await;
        let name = client.reply_channel_name().to_string();
        client.call("Ping", json!({ "item_id": 1 })).await.unwrap();

        client.close().await.unwrap();
        assert!(client.is_closed());
        assert!(!channel_exists(&harness, &name).await);

        client.close().await.unwrap();
        assert!(client.is_closed());
        assert!(!channel_exists(&harness, &name).await);

        let err = client.call("Ping", json!({ "item_id": 2 })).await.unwrap_err();
        assert!(matches!(err, ClientError::Closed));

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropped_client_removes_its_channel() {
        let harness = Harness::start().await;
        let client = harness.client().await;
        let name = client.reply_channel_name().to_string();
        drop(client);

        let mut gone = false;
        for _ in 0..50 {
            if !channel_exists(&harness, &name).await {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "reply channel should be deleted after drop");

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_reaper_removes_abandoned_channels_only() {
        let harness = Harness::start().await;
        let abandoned = Client::connect(
            harness.queue.clone(),
            WORK_QUEUE,
            ClientOptions {
                close_on_drop: false,
                ..client_options()
            },
        )
        .await
        .unwrap();
        let abandoned_name = abandoned.reply_channel_name().to_string();
        drop(abandoned);

        let reaper = ReplyChannelReaper::new(harness.queue.clone())
            .with_max_idle(Duration::from_secs(600));

        // Freshly stamped: nothing to do yet.
        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.reaped, 0);
        assert!(channel_exists(&harness, &abandoned_name).await);

        // An hour later nobody has renewed the stamp.
        let report = reaper.sweep_at(unix_now_secs() + 3_600).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.reaped, 1);
        assert!(!channel_exists(&harness, &abandoned_name).await);
        assert!(channel_exists(&harness, WORK_QUEUE).await);

        harness.shutdown().await;
    }
}
