//! Shared setup for the integration scenarios.

use std::sync::Arc;
use std::time::Duration;

use cq_01_client::{Client, ClientOptions};
use cq_02_processor::{Processor, ProcessorConfigBuilder, ProcessorConfig, ProcessorHandle};
use shared_queue::{InMemoryQueueService, QueueAttributes, QueueService, Tags};
use tokio::task::JoinHandle;

pub const WORK_QUEUE: &str = "work";

/// Client options tuned for tests: short long-polls, no heartbeats during
/// a test run.
pub fn client_options() -> ClientOptions {
    ClientOptions {
        reply_receive_wait: Duration::from_millis(500),
        resolve_retry_delay: Duration::from_millis(10),
        ..ClientOptions::default()
    }
}

/// Processor builder for [`WORK_QUEUE`] with short polls and the demo
/// commands registered.
pub fn demo_builder() -> ProcessorConfigBuilder {
    cq_runtime::commands::register(ProcessorConfig::builder(WORK_QUEUE))
        .poll_wait(Duration::from_millis(500))
}

/// A running processor over any queue service.
pub struct Harness {
    pub queue: Arc<dyn QueueService>,
    pub processor: ProcessorHandle,
    task: JoinHandle<()>,
}

impl Harness {
    /// In-memory queue serving the demo commands.
    pub async fn start() -> Self {
        Self::start_with(demo_builder()).await
    }

    pub async fn start_with(builder: ProcessorConfigBuilder) -> Self {
        let queue: Arc<dyn QueueService> = Arc::new(InMemoryQueueService::new());
        Self::start_on(queue, builder).await
    }

    /// Create [`WORK_QUEUE`] on `queue` and run a processor against it.
    pub async fn start_on(queue: Arc<dyn QueueService>, builder: ProcessorConfigBuilder) -> Self {
        queue
            .create_queue(WORK_QUEUE, QueueAttributes::default(), Tags::new())
            .await
            .expect("create work queue");
        let config = builder.build().expect("processor config");
        let processor = Processor::new(config, Arc::clone(&queue))
            .await
            .expect("processor");
        let handle = processor.handle();
        let task = tokio::spawn(processor.run());
        Self {
            queue,
            processor: handle,
            task,
        }
    }

    pub async fn client(&self) -> Client {
        Client::connect(Arc::clone(&self.queue), WORK_QUEUE, client_options())
            .await
            .expect("client connect")
    }

    /// Stop the processor and wait for it to drain.
    pub async fn shutdown(self) {
        self.processor.stop();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("processor should stop")
            .expect("processor task");
    }
}
