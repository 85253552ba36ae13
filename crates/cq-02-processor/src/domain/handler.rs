//! Command handler contract.

use crate::domain::command::{CommandError, CommandResult};
use async_trait::async_trait;
use shared_types::Payload;
use std::future::Future;
use std::sync::Arc;

/// A named command's implementation: `payload -> payload`.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, payload: Payload) -> CommandResult;
}

/// Adapts a blocking closure. The closure runs on the blocking thread pool.
pub struct FnHandler<F>(Arc<F>);

impl<F> FnHandler<F>
where
    F: Fn(Payload) -> CommandResult + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self(Arc::new(f))
    }
}

#[async_trait]
impl<F> CommandHandler for FnHandler<F>
where
    F: Fn(Payload) -> CommandResult + Send + Sync + 'static,
{
    async fn handle(&self, payload: Payload) -> CommandResult {
        let f = Arc::clone(&self.0);
        match tokio::task::spawn_blocking(move || f(payload)).await {
            Ok(result) => result,
            Err(join_error) => Err(CommandError::unexpected(crate::panic_message(join_error))),
        }
    }
}

/// Adapts an async closure.
pub struct AsyncFnHandler<F>(F);

impl<F, Fut> AsyncFnHandler<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> CommandHandler for AsyncFnHandler<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    async fn handle(&self, payload: Payload) -> CommandResult {
        (self.0)(payload).await
    }
}
