//! The composed pipeline.

use super::{Handler, PipelineBuilder};
use crate::context::{Payload, RequestEnvelope};
use crate::errors::PipelineResult;
use crate::stages::{Next, Stage};
use std::sync::Arc;
use tracing::{debug, Instrument};

/// An ordered composition of stages around a terminal handler.
///
/// Stages and handler are shared references to externally constructed
/// components. The list is fixed at construction; a pipeline can be executed
/// concurrently for any number of requests.
pub struct Pipeline<Req: Payload, Res: Payload> {
    name: String,
    stages: Vec<Arc<dyn Stage<Req, Res>>>,
    handler: Arc<dyn Handler<Req, Res>>,
}

impl<Req: Payload, Res: Payload> Pipeline<Req, Res> {
    pub(crate) fn new(
        name: String,
        stages: Vec<Arc<dyn Stage<Req, Res>>>,
        handler: Arc<dyn Handler<Req, Res>>,
    ) -> Self {
        Self {
            name,
            stages,
            handler,
        }
    }

    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder<Req, Res> {
        PipelineBuilder::new(name)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the names of all stages in declaration order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Runs `request` through every stage and the handler.
    ///
    /// Stage pre-processing runs in declaration order and post-processing in
    /// exact reverse. Fails with the first failure no stage recovered from.
    pub async fn execute(&self, request: &RequestEnvelope<Req>) -> PipelineResult<Res> {
        let span = tracing::info_span!(
            "pipeline",
            pipeline = %self.name,
            correlation_id = %request.correlation_id(),
        );

        async {
            request.cancellation().check()?;
            debug!(stages = self.stages.len(), "Executing pipeline");
            self.build_chain(request).run().await
        }
        .instrument(span)
        .await
    }

    /// Builds the continuation chain from back to front.
    fn build_chain<'a>(&'a self, request: &'a RequestEnvelope<Req>) -> Next<'a, Req, Res> {
        let mut next = Next::handler(request, self.handler.as_ref());
        for stage in self.stages.iter().rev() {
            next = Next::stage(request, stage.as_ref(), next);
        }
        next
    }
}

impl<Req: Payload, Res: Payload> std::fmt::Debug for Pipeline<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Failure, FailureKind};
    use crate::pipeline::SyncFnHandler;

    fn doubler() -> Pipeline<u32, u32> {
        Pipeline::<u32, u32>::builder("double")
            .handler(Arc::new(SyncFnHandler::new(|req: &RequestEnvelope<u32>| {
                Ok(req.payload() * 2)
            })))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_execute_without_stages() {
        let pipeline = doubler();
        assert_eq!(pipeline.stage_count(), 0);

        let result = pipeline.execute(&RequestEnvelope::new(4)).await;
        assert_eq!(result, Ok(8));
    }

    #[tokio::test]
    async fn test_execute_checks_cancellation_at_entry() {
        let pipeline = doubler();
        let request = RequestEnvelope::new(4);
        request.cancellation().cancel("shutdown");

        let failure = pipeline.execute(&request).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Cancellation);
        assert_eq!(failure.message, "shutdown");
    }

    #[tokio::test]
    async fn test_handler_failure_propagates() {
        let pipeline = Pipeline::<(), ()>::builder("failing")
            .handler(Arc::new(SyncFnHandler::new(|_req: &RequestEnvelope<()>| -> PipelineResult<()> {
                Err(Failure::unhandled("database unreachable"))
            })))
            .build()
            .unwrap();

        let failure = pipeline.execute(&RequestEnvelope::new(())).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Unhandled);
        assert_eq!(failure.message, "database unreachable");
    }

    #[test]
    fn test_debug_lists_stages() {
        let rendered = format!("{:?}", doubler());
        assert!(rendered.contains("double"));
    }
}
