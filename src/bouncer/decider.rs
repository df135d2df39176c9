use std::sync::Arc;

use async_trait::async_trait;

use crate::bouncer::{BufferedRequest, Decision};

/// A single policy check run against a buffered request.
///
/// Implementations must not assume they are the only reader of the body;
/// [`BufferedRequest`] hands every decider the full body.
#[async_trait]
pub trait Decider: Send + Sync {
    async fn decide(&self, request: &BufferedRequest) -> Decision;
}

/// Adapts a plain function into a [`Decider`].
pub struct DeciderFn<F>(F);

#[async_trait]
impl<F> Decider for DeciderFn<F>
where
    F: Fn(&BufferedRequest) -> Decision + Send + Sync,
{
    async fn decide(&self, request: &BufferedRequest) -> Decision {
        (self.0)(request)
    }
}

pub fn decider_fn<F>(f: F) -> Arc<dyn Decider>
where
    F: Fn(&BufferedRequest) -> Decision + Send + Sync + 'static,
{
    Arc::new(DeciderFn(f))
}
