//! Task handler trait
//!
//! The pool clones the handler once per worker, so each worker owns an independent
//! copy of whatever configuration the handler carries.

use async_trait::async_trait;

#[async_trait]
pub trait TaskHandler: Clone + Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Action tag attached to every task this handler runs.
    fn action(&self) -> &'static str;

    /// Run one task. Failures the caller must see belong in `Output`; a panic here is
    /// treated as a worker crash.
    async fn handle(&self, input: Self::Input) -> Self::Output;
}
