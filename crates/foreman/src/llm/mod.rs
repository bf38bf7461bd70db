pub mod types;

use std::future::Future;

use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::Error;
use crate::llm::types::{CompletionRequest, Message};

/// Callback invoked with each text delta during streaming.
pub type OnText = dyn Fn(&str) + Send + Sync;

/// One event from a streaming completion.
///
/// The agent loop consumes `TextDelta` and `Done`; everything else is
/// tolerated and ignored so providers can emit richer streams.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta { text: String },
    ToolStart { id: String, name: String },
    ToolDelta { partial: String },
    Done { message: Message },
    Error { error: String },
}

/// A stream of completion events.
pub type EventStream = BoxStream<'static, Result<StreamEvent, Error>>;

/// Trait for LLM providers.
///
/// Uses RPITIT (`impl Future`), so consumers are generic over `P: Provider`.
/// Concrete HTTP bindings live outside this crate; tests use scripted mocks.
pub trait Provider: Send + Sync {
    /// Run one blocking completion and return the assistant message.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Message, Error>> + Send;

    /// Open a streaming completion.
    ///
    /// The stream must end with a `Done` event carrying the full assistant
    /// message. Default: falls back to `complete()` and emits a single `Done`.
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<EventStream, Error>> + Send {
        async move {
            let message = self.complete(request).await?;
            Ok(futures::stream::iter(vec![Ok(StreamEvent::Done { message })]).boxed())
        }
    }

    /// Return the model identifier, if known. Used in trace metadata.
    fn model_name(&self) -> Option<&str> {
        None
    }
}
