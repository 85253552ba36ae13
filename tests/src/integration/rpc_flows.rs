//! # Request/Reply Round Trips
//!
//! Client → work queue → Processor → handler → reply channel → Client, for
//! every reply status.

#[cfg(test)]
mod tests {
    use cq_01_client::{ClientError, ClientStats, ResponseError};
    use cq_02_processor::{CommandError, CommandResult, ProcessorStats};
    use serde_json::json;
    use shared_types::{Payload, Status};

    use crate::fixtures::{demo_builder, Harness};

    fn response(err: ClientError) -> ResponseError {
        match err {
            ClientError::Response(response) => response,
            other => panic!("expected a response error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ping_returns_handler_payload() {
        let harness = Harness::start().await;
        let client = harness.client().await;

        let reply = client.call("Ping", json!({ "item_id": 3 })).await.unwrap();
        assert_eq!(reply["item_id"], 3);
        assert!(reply["pong"].as_f64().unwrap() > 0.0);
        assert_eq!(ClientStats::get(&client.stats().replies_ok), 1);

        client.close().await.unwrap();
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_parameter_is_a_command_failure() {
        let harness = Harness::start().await;
        let client = harness.client().await;

        let err = response(client.call("Ping", json!({})).await.unwrap_err());
        assert_eq!(err.status, Status::Error);
        assert_eq!(
            err.payload,
            json!({
                "error": "Missing required parameter 'item_id'",
                "data": { "parameter_name": "item_id" }
            })
        );

        client.close().await.unwrap();
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_command_is_not_found() {
        let harness = Harness::start().await;
        let client = harness.client().await;

        let err = response(client.call("Unknown", json!({ "item_id": 1 })).await.unwrap_err());
        assert_eq!(err.status, Status::CommandNotFound);
        assert_eq!(err.payload, json!({ "error": "Command not found" }));
        assert_eq!(
            ProcessorStats::get(&harness.processor.stats().not_found),
            1
        );

        client.close().await.unwrap();
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_unexpected_failure_hides_detail() {
        let harness = Harness::start().await;
        let client = harness.client().await;

        let err = response(
            client
                .call("Ping", json!({ "item_id": cq_runtime::commands::FAULTY_ITEM_ID }))
                .await
                .unwrap_err(),
        );
        assert_eq!(err.status, Status::ServiceError);
        assert!(err.payload["error"].is_string());
        assert!(err.payload.get("data").is_none());

        client.close().await.unwrap();
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_handler_is_a_service_error() {
        let builder = demo_builder().sync_command("Explode", |_: Payload| -> CommandResult {
            panic!("boom")
        });
        let harness = Harness::start_with(builder).await;
        let client = harness.client().await;

        let err = response(client.call("Explode", json!({})).await.unwrap_err());
        assert_eq!(err.status, Status::ServiceError);
        assert_eq!(err.payload, json!({ "error": "boom" }));

        // The worker survives the panic.
        let reply = client.call("Ping", json!({ "item_id": 4 })).await.unwrap();
        assert_eq!(reply["item_id"], 4);

        client.close().await.unwrap();
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_async_handler_with_structured_detail() {
        let builder = demo_builder().async_command("Reserve", |payload: Payload| async move {
            let quantity = payload["quantity"].as_u64().unwrap_or(0);
            if quantity > 5 {
                return Err(CommandError::failure(
                    "Insufficient stock",
                    json!({ "available": 5, "requested": quantity }),
                ));
            }
            Ok(json!({ "reserved": quantity }))
        });
        let harness = Harness::start_with(builder).await;
        let client = harness.client().await;

        let ok = client.call("Reserve", json!({ "quantity": 2 })).await.unwrap();
        assert_eq!(ok, json!({ "reserved": 2 }));

        let err = response(client.call("Reserve", json!({ "quantity": 9 })).await.unwrap_err());
        assert_eq!(err.status, Status::Error);
        assert_eq!(err.payload["data"], json!({ "available": 5, "requested": 9 }));

        client.close().await.unwrap();
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_processor_counts_every_request() {
        let harness = Harness::start().await;
        let client = harness.client().await;

        for item_id in 0..5 {
            let _ = client.call("Ping", json!({ "item_id": item_id })).await;
        }
        let _ = client.call("Unknown", json!({})).await;

        let stats = harness.processor.stats();
        assert_eq!(ProcessorStats::get(&stats.received), 6);
        assert_eq!(stats.handled(), 6);

        client.close().await.unwrap();
        harness.shutdown().await;
    }
}
