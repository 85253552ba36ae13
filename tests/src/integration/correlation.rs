//! # Correlation and Timeouts
//!
//! A client only ever accepts the reply to the request it is waiting on.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use cq_01_client::{Client, ClientError, ClientStats};
    use cq_02_processor::CommandResult;
    use serde_json::json;
    use shared_queue::{InMemoryQueueService, QueueAttributes, QueueService, Tags};
    use shared_types::Payload;
    use tokio::time::Instant;

    use crate::fixtures::{client_options, demo_builder, Harness, WORK_QUEUE};

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_not_reported_early() {
        let queue: Arc<dyn QueueService> = Arc::new(InMemoryQueueService::new());
        queue
            .create_queue(WORK_QUEUE, QueueAttributes::default(), Tags::new())
            .await
            .unwrap();
        // No processor: nobody will ever answer.
        let client = Client::connect(queue, WORK_QUEUE, client_options())
            .await
            .unwrap();

        let started = Instant::now();
        let err = client
            .execute("Ping", json!({ "item_id": 1 }), Some(Duration::from_secs(3)))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(ClientStats::get(&client.stats().timeouts), 1);

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_late_reply_is_discarded_by_next_call() {
        let builder = demo_builder().async_command("Slow", |_: Payload| async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            CommandResult::Ok(json!({ "slow": true }))
        });
        let harness = Harness::start_with(builder).await;
        let client = harness.client().await;

        let err = client
            .execute("Slow", json!({}), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));

        // Let the abandoned reply land in the reply channel first.
        tokio::time::sleep(Duration::from_millis(900)).await;

        let reply = client.call("Ping", json!({ "item_id": 9 })).await.unwrap();
        assert_eq!(reply["item_id"], 9);
        assert!(reply.get("slow").is_none());
        assert_eq!(
            ClientStats::get(&client.stats().stale_replies_discarded),
            1
        );

        client.close().await.unwrap();
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_calls_on_one_client_are_serialized() {
        let harness = Harness::start().await;
        let client = Arc::new(harness.client().await);

        let calls: Vec<_> = (0..6)
            .map(|item_id| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    let reply = client.call("Ping", json!({ "item_id": item_id })).await?;
                    Ok::<_, ClientError>((item_id, reply))
                })
            })
            .collect();

        for call in calls {
            let (item_id, reply) = call.await.unwrap().unwrap();
            assert_eq!(reply["item_id"], item_id);
        }
        assert_eq!(
            ClientStats::get(&client.stats().stale_replies_discarded),
            0
        );

        client.close().await.unwrap();
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_many_clients_share_one_work_queue() {
        let harness = Harness::start_with(demo_builder().pool_size(2)).await;

        let mut tasks = Vec::new();
        for client_no in 0..4u64 {
            let client = harness.client().await;
            tasks.push(tokio::spawn(async move {
                for n in 0..5u64 {
                    let item_id = client_no * 100 + n;
                    let reply = client
                        .call("Ping", json!({ "item_id": item_id }))
                        .await
                        .unwrap();
                    assert_eq!(reply["item_id"], item_id);
                }
                client.close().await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(harness.processor.stats().handled(), 20);
        harness.shutdown().await;
    }
}
