//! Running generations end to end
//!
//! [`Generator`] wires an adapter to a transport: it builds the wire
//! request, performs it, and parses the answer, feeding streamed events
//! through the [`StreamEngine`] on the way.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::adapter::{Adapter, Operation};
use crate::error::LlmError;
use crate::rescue::{Outcome, Rescue};
use crate::stream::StreamEngine;
use crate::tool_choice::clear_after_turn;
use crate::transport::Transport;
use crate::types::{Prompt, Response};

/// Adapter plus transport plus exception policy
#[derive(Clone)]
pub struct Generator {
    adapter: Adapter,
    transport: Arc<dyn Transport>,
    rescue: Rescue,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("adapter", &self.adapter.name())
            .field("rescue", &self.rescue)
            .finish_non_exhaustive()
    }
}

impl Generator {
    pub fn new(adapter: Adapter, transport: Arc<dyn Transport>) -> Self {
        Self {
            adapter,
            transport,
            rescue: Rescue::new(),
        }
    }

    /// Use `rescue` when running generations through [`Generator::run`]
    #[must_use]
    pub fn with_rescue(mut self, rescue: Rescue) -> Self {
        self.rescue = rescue;
        self
    }

    pub const fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Non-streaming generation
    pub async fn generate(&self, prompt: &Prompt) -> Result<Response, LlmError> {
        let request = self.adapter.build_operation_request(Operation::Chat, prompt)?;
        let raw = self.transport.send(&request).await?;
        self.adapter.parse_response(prompt, raw)
    }

    /// Streaming generation
    ///
    /// Lifecycle events go to the prompt's broadcaster as chunks arrive.
    /// Cancelling `cancel` aborts the stream; the partial message is
    /// returned with `success` unset.
    pub async fn generate_stream(&self, prompt: &Prompt, cancel: &CancellationToken) -> Result<Response, LlmError> {
        let request = self.adapter.build_operation_request(Operation::StreamChat, prompt)?;
        let mut decoder = self.adapter.stream_decoder(prompt)?;
        let engine = StreamEngine::new(prompt.options.broadcaster.clone());
        let mut state = engine.begin();

        let mut events = self.transport.stream(&request).await?;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(provider = self.adapter.name(), "generation cancelled");
                    engine.abort(&mut state);
                    break;
                }
                next = events.next() => next,
            };

            let Some(event) = next else {
                break;
            };

            let chunks = match event.and_then(|event| decoder.decode(&event)) {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::error!(provider = self.adapter.name(), error = %e, "stream failed");
                    engine.abort(&mut state);
                    return Err(e);
                }
            };

            for chunk in chunks {
                engine.process(&mut state, chunk);
            }
            if state.is_closed() {
                break;
            }
        }

        Ok(engine.finish(state).into_response(prompt))
    }

    /// Generate per `prompt.options.stream`, under the exception wrapper
    ///
    /// A completed turn clears a tool choice it satisfied, ready for the
    /// follow-up turn.
    pub async fn run(&self, prompt: &mut Prompt, cancel: &CancellationToken) -> Result<Outcome<Response>, LlmError> {
        let result = if prompt.options.stream {
            self.generate_stream(prompt, cancel).await
        } else {
            self.generate(prompt).await
        };

        let outcome = self.rescue.wrap(result)?;
        if let Outcome::Completed(response) = &outcome {
            clear_after_turn(prompt, response);
        }
        Ok(outcome)
    }

    /// Count the input tokens `prompt` would use
    pub async fn count_tokens(&self, prompt: &Prompt) -> Result<u32, LlmError> {
        let request = self.adapter.build_operation_request(Operation::CountTokens, prompt)?;
        let raw = self.transport.send(&request).await?;
        self.adapter.parse_token_count(prompt, &raw)
    }

    /// Models the provider serves
    pub async fn list_models(&self, prompt: &Prompt) -> Result<Vec<String>, LlmError> {
        let request = self.adapter.build_operation_request(Operation::ListModels, prompt)?;
        let raw = self.transport.send(&request).await?;
        self.adapter.parse_models(prompt, &raw)
    }

    /// Submit `prompt` as a one-entry batch, returning the provider's batch object
    pub async fn submit_batch(&self, prompt: &Prompt) -> Result<Value, LlmError> {
        let request = self.adapter.build_operation_request(Operation::Batch, prompt)?;
        self.transport.send(&request).await
    }
}
