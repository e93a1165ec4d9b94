//! Pipeline builder with validation.

use super::{Handler, Pipeline};
use crate::context::Payload;
use crate::errors::PipelineError;
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Stages run in the order they are added. The stage list is frozen by
/// [`PipelineBuilder::build`].
pub struct PipelineBuilder<Req: Payload, Res: Payload> {
    /// The pipeline name.
    name: String,
    /// Stages in declaration order.
    stages: Vec<Arc<dyn Stage<Req, Res>>>,
    /// The terminal handler.
    handler: Option<Arc<dyn Handler<Req, Res>>>,
}

impl<Req: Payload, Res: Payload> PipelineBuilder<Req, Res> {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            handler: None,
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage<Req, Res>>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the terminal handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn Handler<Req, Res>>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if no handler was set or two stages share a name.
    pub fn build(self) -> Result<Pipeline<Req, Res>, PipelineError> {
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name().to_string()) {
                return Err(PipelineError::DuplicateStage {
                    pipeline: self.name,
                    stage: stage.name().to_string(),
                });
            }
        }

        let Some(handler) = self.handler else {
            return Err(PipelineError::MissingHandler { pipeline: self.name });
        };

        Ok(Pipeline::new(self.name, self.stages, handler))
    }
}

impl<Req: Payload, Res: Payload> std::fmt::Debug for PipelineBuilder<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestEnvelope;
    use crate::pipeline::SyncFnHandler;
    use crate::testing::{CallLog, RecordingStage};

    fn echo() -> Arc<dyn Handler<u32, u32>> {
        Arc::new(SyncFnHandler::new(|req: &RequestEnvelope<u32>| Ok(*req.payload())))
    }

    #[test]
    fn test_builder_collects_stages() {
        let log = CallLog::new();
        let builder = PipelineBuilder::<u32, u32>::new("orders")
            .stage(Arc::new(RecordingStage::new("a", log.clone())))
            .stage(Arc::new(RecordingStage::new("b", log)))
            .handler(echo());

        assert_eq!(builder.name(), "orders");
        assert_eq!(builder.stage_count(), 2);

        let pipeline = builder.build().unwrap();
        assert_eq!(pipeline.stage_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_builder_requires_handler() {
        let err = PipelineBuilder::<u32, u32>::new("orders").build().unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingHandler {
                pipeline: "orders".to_string()
            }
        );
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let log = CallLog::new();
        let err = PipelineBuilder::<u32, u32>::new("orders")
            .stage(Arc::new(RecordingStage::new("audit", log.clone())))
            .stage(Arc::new(RecordingStage::new("audit", log)))
            .handler(echo())
            .build()
            .unwrap_err();

        assert!(matches!(err, PipelineError::DuplicateStage { ref stage, .. } if stage == "audit"));
    }
}
