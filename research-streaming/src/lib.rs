//! ABOUTME: SSE event queue and streaming-lifecycle wrapper
//! ABOUTME: Ported from the original StreamingManager/events module pair

use research_core::{EventType, ProcessingContext, ResearchError, ResearchEvent};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Invoked once per emitted event. Errors inside the callback are logged
/// and otherwise swallowed — a misbehaving subscriber must never abort
/// the research pipeline it's observing.
pub type EventCallback = Arc<dyn Fn(&ResearchEvent) + Send + Sync>;

/// Cloned into every task that wants to emit progress events without
/// holding a reference back to the owning `StreamingManager`.
#[derive(Clone)]
pub struct EventEmitter {
    sender: mpsc::UnboundedSender<ResearchEvent>,
}

impl EventEmitter {
    pub fn emit(&self, event_type: EventType, step: impl Into<String>, data: serde_json::Value) {
        let event = ResearchEvent::new(event_type, step, data);
        info!(event_type = ?event.event_type, step = %event.step, "event emitted");
        let _ = self.sender.send(event);
    }
}

/// SSE streaming and event-queue infrastructure for one research request.
/// A fresh channel and dispatch task are created per `process_with_streaming`
/// call; the manager itself only carries the (optional) subscriber callback.
pub struct StreamingManager {
    callback: Option<EventCallback>,
}

impl StreamingManager {
    pub fn new(callback: Option<EventCallback>) -> Self {
        Self { callback }
    }

    /// Wraps `process_fn` with SSE streaming: emits an `init` progress
    /// event, runs `process_fn` with an `EventEmitter` it can use for
    /// fine-grained progress, then emits `complete` (or `error`) and a
    /// final `final_report` (or `error`) SSE frame. Returns `process_fn`'s
    /// own result alongside every SSE frame produced, in order; the
    /// dispatch task draining the event queue for the callback is awaited
    /// to completion before returning.
    pub async fn process_with_streaming<F, Fut>(
        &self,
        ctx: &mut ProcessingContext,
        process_fn: F,
    ) -> (Result<String, ResearchError>, Vec<String>)
    where
        F: FnOnce(&mut ProcessingContext, EventEmitter) -> Fut,
        Fut: Future<Output = Result<String, ResearchError>>,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ResearchEvent>();
        let callback = self.callback.clone();
        let dispatch = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Some(cb) = &callback {
                    cb(&event);
                }
            }
        });

        let emitter = EventEmitter { sender };
        emitter.emit(
            EventType::Progress,
            "init",
            serde_json::json!({"status": "start", "query": ctx.request.query}),
        );

        let result = process_fn(ctx, emitter.clone()).await;

        let mut frames = Vec::new();
        match &result {
            Ok(report) => {
                emitter.emit(
                    EventType::Progress,
                    "complete",
                    serde_json::json!({"status": "complete", "resultLength": report.chars().count()}),
                );
                let event = ResearchEvent::new(
                    EventType::FinalReport,
                    "final_report",
                    serde_json::Value::String(report.clone()),
                );
                frames.push(event.to_sse());
            }
            Err(err) => {
                emitter.emit(
                    EventType::Error,
                    "error",
                    serde_json::json!({"message": err.to_string()}),
                );
                let event = ResearchEvent::new(
                    EventType::Error,
                    "error",
                    serde_json::Value::String(err.to_string()),
                );
                frames.push(event.to_sse());
            }
        }

        drop(emitter);
        if let Err(err) = dispatch.await {
            warn!(%err, "event dispatch task panicked");
        }

        (result, frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::{Mode, Request};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn ctx() -> ProcessingContext {
        ProcessingContext::new(Request {
            query: "test query".to_string(),
            mode: Mode::DeepResearch,
            trace_id: Uuid::new_v4(),
            context_id: None,
            temperature: None,
            max_tokens: None,
            streaming: true,
            metadata: serde_json::Map::new(),
        })
    }

    #[tokio::test]
    async fn emits_init_and_complete_then_final_report_frame() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let manager = StreamingManager::new(Some(Arc::new(move |event: &ResearchEvent| {
            received_clone.lock().unwrap().push(event.step.clone());
        })));

        let mut context = ctx();
        let (result, frames) = manager
            .process_with_streaming(&mut context, |_ctx, emitter| async move {
                emitter.emit(EventType::Message, "working", serde_json::json!({}));
                Ok("final body".to_string())
            })
            .await;

        assert_eq!(result.unwrap(), "final body");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("final_report"));
        assert!(frames[0].contains("final body"));

        let steps = received.lock().unwrap().clone();
        assert_eq!(steps, vec!["init", "working", "complete"]);
    }

    #[tokio::test]
    async fn emits_error_frame_on_failure() {
        let manager = StreamingManager::new(None);
        let mut context = ctx();
        let (result, frames) = manager
            .process_with_streaming(&mut context, |_ctx, _emitter| async move {
                Err(ResearchError::business("boom"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"type\":\"error\""));
        assert!(frames[0].contains("boom"));
    }
}
