//! The continuation passed to each stage.

use super::Stage;
use crate::context::{Payload, RequestEnvelope};
use crate::errors::{Failure, PipelineResult};
use crate::pipeline::Handler;
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::Instrument;

/// Invokes the remainder of the pipeline.
///
/// A stage receives a `Next` and calls [`Next::run`] at most once. Not calling
/// it short-circuits the pipeline. The chain is built right-to-left by the
/// pipeline, so the first stage wraps everything and the last stage wraps only
/// the handler.
pub struct Next<'a, Req: Payload, Res: Payload> {
    request: &'a RequestEnvelope<Req>,
    link: Mutex<Option<Link<'a, Req, Res>>>,
}

/// What a `Next` leads to.
enum Link<'a, Req: Payload, Res: Payload> {
    /// Another stage, followed by the rest of the chain.
    Stage {
        stage: &'a dyn Stage<Req, Res>,
        next: Box<Next<'a, Req, Res>>,
    },
    /// End of chain - invoke the handler.
    Handler(&'a dyn Handler<Req, Res>),
}

impl<'a, Req: Payload, Res: Payload> Next<'a, Req, Res> {
    /// Creates a terminal `Next` that invokes the handler.
    pub(crate) fn handler(request: &'a RequestEnvelope<Req>, handler: &'a dyn Handler<Req, Res>) -> Self {
        Self {
            request,
            link: Mutex::new(Some(Link::Handler(handler))),
        }
    }

    /// Creates a `Next` that invokes `stage`, which in turn receives `next`.
    pub(crate) fn stage(
        request: &'a RequestEnvelope<Req>,
        stage: &'a dyn Stage<Req, Res>,
        next: Self,
    ) -> Self {
        Self {
            request,
            link: Mutex::new(Some(Link::Stage {
                stage,
                next: Box::new(next),
            })),
        }
    }

    /// Returns true once `run` has been called.
    pub fn is_consumed(&self) -> bool {
        self.link.lock().is_none()
    }

    /// Invokes the next stage or the handler.
    ///
    /// The cancellation token is checked before entering the next stage, and
    /// the handler call is raced against it. A panic downstream comes back as
    /// an unhandled failure.
    ///
    /// # Panics
    ///
    /// Panics if called more than once. Running the downstream chain twice is
    /// a programming error in the calling stage.
    pub async fn run(&self) -> PipelineResult<Res> {
        let link = self.link.lock().take();
        let Some(link) = link else {
            panic!("Next::run called more than once; the downstream chain has already executed");
        };

        let token = self.request.cancellation();
        match link {
            Link::Stage { stage, next } => {
                let name = stage.name();
                token.check().map_err(|failure| failure.with_stage(name))?;
                let span = tracing::debug_span!("stage", name = %name);
                contain_panics(stage.invoke(self.request, *next).instrument(span), Some(name)).await
            }
            Link::Handler(handler) => {
                token
                    .run_until_cancelled(contain_panics(handler.handle(self.request), None))
                    .await
            }
        }
    }
}

/// Converts a panic inside `future` into an unhandled failure, so the
/// enclosing stages still see it on the way out.
///
/// Panics further downstream are already converted by their own link, so a
/// panic caught here was raised by `stage` itself.
async fn contain_panics<T, F>(future: F, stage: Option<&str>) -> PipelineResult<T>
where
    F: Future<Output = PipelineResult<T>>,
{
    AssertUnwindSafe(future).catch_unwind().await.unwrap_or_else(|payload| {
        let failure = Failure::from_panic(payload.as_ref());
        Err(match stage {
            Some(stage) => failure.with_stage(stage),
            None => failure,
        })
    })
}

impl<Req: Payload, Res: Payload> std::fmt::Debug for Next<'_, Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = match &*self.link.lock() {
            Some(Link::Stage { stage, .. }) => stage.name().to_string(),
            Some(Link::Handler(_)) => "handler".to_string(),
            None => "consumed".to_string(),
        };
        f.debug_struct("Next")
            .field("correlation_id", &self.request.correlation_id())
            .field("target", &target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use crate::pipeline::SyncFnHandler;
    use crate::stages::FnStage;

    #[tokio::test]
    async fn test_terminal_next_invokes_handler() {
        let handler = SyncFnHandler::new(|req: &RequestEnvelope<u32>| Ok(req.payload() * 2));
        let request = RequestEnvelope::new(21_u32);

        let next = Next::handler(&request, &handler);
        assert!(!next.is_consumed());
        assert_eq!(next.run().await, Ok(42));
        assert!(next.is_consumed());
    }

    #[tokio::test]
    async fn test_stage_link_wraps_handler() {
        let handler = SyncFnHandler::new(|req: &RequestEnvelope<u32>| Ok(*req.payload()));
        let stage = FnStage::<_, u32, u32>::new("add_one", |_req, next| {
            Box::pin(async move { next.run().await.map(|v| v + 1) })
        });
        let request = RequestEnvelope::new(1_u32);

        let next = Next::stage(&request, &stage, Next::handler(&request, &handler));
        assert_eq!(next.run().await, Ok(2));
    }

    #[tokio::test]
    async fn test_cancelled_before_stage() {
        let handler = SyncFnHandler::new(|_req: &RequestEnvelope<()>| Ok(()));
        let stage =
            FnStage::<_, (), ()>::new("never", |_req, next| Box::pin(async move { next.run().await }));
        let request = RequestEnvelope::new(());
        request.cancellation().cancel("gone");

        let next = Next::stage(&request, &stage, Next::handler(&request, &handler));
        let failure = next.run().await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Cancellation);
        assert_eq!(failure.stage.as_deref(), Some("never"));
    }

    #[tokio::test]
    async fn test_handler_panic_returns_through_stage() {
        let handler = SyncFnHandler::new(|_req: &RequestEnvelope<u32>| -> PipelineResult<u32> {
            panic!("handler defect")
        });
        let stage = FnStage::<_, u32, u32>::new("observer", |_req, next| {
            Box::pin(async move {
                let result = next.run().await;
                assert!(result.is_err());
                result
            })
        });
        let request = RequestEnvelope::new(0_u32);

        let next = Next::stage(&request, &stage, Next::handler(&request, &handler));
        let failure = next.run().await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Unhandled);
        assert_eq!(failure.message, "panic: handler defect");
        assert!(failure.stage.is_none());
    }

    #[tokio::test]
    async fn test_stage_panic_is_attributed_to_stage() {
        let handler = SyncFnHandler::new(|req: &RequestEnvelope<u32>| Ok(*req.payload()));
        let stage = FnStage::<_, u32, u32>::new("broken", |_req, next| {
            Box::pin(async move {
                if next.is_consumed() {
                    return next.run().await;
                }
                panic!("stage defect")
            })
        });
        let request = RequestEnvelope::new(0_u32);

        let next = Next::stage(&request, &stage, Next::handler(&request, &handler));
        let failure = next.run().await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Unhandled);
        assert_eq!(failure.stage.as_deref(), Some("broken"));
    }

    #[tokio::test]
    #[should_panic(expected = "called more than once")]
    async fn test_second_run_panics() {
        let handler = SyncFnHandler::new(|_req: &RequestEnvelope<()>| Ok(()));
        let request = RequestEnvelope::new(());

        let next = Next::handler(&request, &handler);
        let _ = next.run().await;
        let _ = next.run().await;
    }
}
