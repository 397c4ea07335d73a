//! Conversion between the canonical model and the chat completions wire format

use serde_json::Value;

use super::{arguments_from_wire, decode, embedded_error, file_data_uri};
use crate::error::LlmError;
use crate::protocol::chat::{
    ChatChoiceMessage, ChatContent, ChatContentPart, ChatFile, ChatFunction, ChatFunctionCall, ChatImageUrl,
    ChatJsonSchema, ChatMessage, ChatRequest, ChatResponse, ChatResponseFormat, ChatStreamChunk, ChatStreamOptions,
    ChatModelList, ChatTool, ChatToolCall, ChatUsage,
};
use crate::types::{
    Action, Content, ContentPart, FinishReason, Message, Prompt, Response, Role, SseEvent, StreamChunk,
    ToolCallFragment, ToolChoice, ToolChoiceMode, Usage,
};

const PROTOCOL: &str = "chat completions";

// -- Request --

/// Build a chat completions request body from a prompt
///
/// Tool declarations and a structured-output schema cannot be combined in
/// this protocol; asking for both is rejected instead of dropping one.
pub fn build_request(prompt: &Prompt, include_usage: bool) -> Result<ChatRequest, LlmError> {
    let options = &prompt.options;

    if options.response_schema.is_some() && !prompt.actions.is_empty() {
        return Err(LlmError::validation(
            "actions",
            "tool declarations cannot be combined with a response schema in chat completions",
        ));
    }

    let mut messages = Vec::with_capacity(prompt.messages.len() + 1);
    if let Some(instructions) = &prompt.instructions {
        messages.push(ChatMessage {
            role: Role::System.as_str().to_owned(),
            content: Some(ChatContent::Text(instructions.clone())),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    for message in &prompt.messages {
        messages.push(to_chat_message(message)?);
    }

    let tools = (options.response_schema.is_none() && !prompt.actions.is_empty()).then(|| {
        prompt
            .actions
            .iter()
            .map(|action| ChatTool {
                tool_type: "function".to_owned(),
                function: ChatFunction {
                    name: action.name.clone(),
                    description: action.description.clone(),
                    parameters: Some(action.parameters_or_empty()),
                    strict: action.strict,
                },
            })
            .collect::<Vec<_>>()
    });

    let tool_choice = tools
        .as_ref()
        .and(options.tool_choice.as_ref())
        .map(tool_choice_value);

    let response_format = options.response_schema.as_ref().map(|schema| ChatResponseFormat::JsonSchema {
        json_schema: ChatJsonSchema {
            name: schema.name.clone(),
            description: schema.description.clone(),
            schema: schema.schema.clone(),
            strict: Some(schema.strict),
        },
    });

    Ok(ChatRequest {
        model: options.model.clone(),
        messages,
        temperature: options.temperature,
        top_p: options.top_p,
        max_tokens: options.max_tokens,
        stop: options.stop.clone(),
        stream: options.stream.then_some(true),
        tools,
        tool_choice,
        response_format,
        stream_options: (options.stream && include_usage).then_some(ChatStreamOptions { include_usage: true }),
        extras: options.extras.clone(),
    })
}

fn to_chat_message(message: &Message) -> Result<ChatMessage, LlmError> {
    let content = match &message.content {
        Content::Text(text) if text.is_empty() && message.requests_actions() => None,
        Content::Text(text) => Some(ChatContent::Text(text.clone())),
        Content::Parts(parts) => Some(ChatContent::Parts(
            parts.iter().map(to_chat_part).collect::<Result<Vec<_>, _>>()?,
        )),
    };

    let tool_calls = message.requests_actions().then(|| {
        message
            .requested_actions
            .iter()
            .map(|action| ChatToolCall {
                id: action.id.clone(),
                tool_type: "function".to_owned(),
                function: ChatFunctionCall {
                    name: action.name.clone(),
                    arguments: Some(Value::String(action.arguments_json())),
                },
            })
            .collect()
    });

    let tool_call_id = if message.role == Role::Tool {
        Some(
            message
                .action_id
                .clone()
                .ok_or_else(|| LlmError::validation("action_id", "tool messages must name the action they answer"))?,
        )
    } else {
        None
    };

    Ok(ChatMessage {
        role: message.role.as_str().to_owned(),
        content,
        tool_calls,
        tool_call_id,
    })
}

fn to_chat_part(part: &ContentPart) -> Result<ChatContentPart, LlmError> {
    match part {
        ContentPart::Text { text } => Ok(ChatContentPart::Text { text: text.clone() }),
        ContentPart::Image { url, detail } => Ok(ChatContentPart::ImageUrl {
            image_url: ChatImageUrl {
                url: url.clone(),
                detail: detail.clone(),
            },
        }),
        ContentPart::File(file) => {
            let file_data = file_data_uri(file);
            if file.file_id.is_none() && file_data.is_none() {
                return Err(LlmError::unsupported(PROTOCOL, "file references by URL"));
            }
            Ok(ChatContentPart::File {
                file: ChatFile {
                    file_id: file.file_id.clone(),
                    file_data,
                    filename: file.filename.clone(),
                },
            })
        }
    }
}

/// Wire value of a tool choice
fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Mode(mode) => Value::String(mode_str(*mode).to_owned()),
        ToolChoice::Action { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name }
        }),
    }
}

pub(crate) const fn mode_str(mode: ToolChoiceMode) -> &'static str {
    match mode {
        ToolChoiceMode::None => "none",
        ToolChoiceMode::Auto => "auto",
        ToolChoiceMode::Required => "required",
    }
}

// -- Response --

/// Parse a complete chat completions response
pub fn parse_response(prompt: &Prompt, raw: Value) -> Result<Response, LlmError> {
    if let Some(err) = embedded_error(&raw) {
        return Err(err);
    }

    let wire: ChatResponse = decode(&raw, "chat completion")?;
    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::provider("chat completion has no choices"))?;

    let message = from_choice_message(choice.message)?;
    let mut response = Response::new(prompt, message, raw);
    response.id = wire.id;
    response.model = wire.model;
    response.usage = wire.usage.map(usage_from_wire);
    response.finish_reason = choice.finish_reason.as_deref().and_then(finish_reason);
    Ok(response)
}

fn from_choice_message(wire: ChatChoiceMessage) -> Result<Message, LlmError> {
    let role: Role = wire.role.parse()?;
    let text = wire.content.or(wire.refusal).unwrap_or_default();

    let actions = wire
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| Action::with_arguments(call.id, call.function.name, arguments_from_wire(call.function.arguments.as_ref())))
        .collect();

    Ok(Message::new(role, text).with_actions(actions))
}

const fn usage_from_wire(usage: ChatUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}

/// Normalise a chat-style finish reason
pub fn finish_reason(reason: &str) -> Option<FinishReason> {
    match reason {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" | "function_call" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

/// Parse a model listing into model ids
pub fn parse_models(raw: &Value) -> Result<Vec<String>, LlmError> {
    if let Some(err) = embedded_error(raw) {
        return Err(err);
    }
    let list: ChatModelList = decode(raw, "model list")?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}

// -- Stream --

/// Decoder for chat completions SSE streams
#[derive(Debug, Default)]
pub struct ChatStreamDecoder {
    metadata_seen: bool,
}

impl ChatStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one SSE event into canonical chunks
    pub fn decode(&mut self, event: &SseEvent) -> Result<Vec<StreamChunk>, LlmError> {
        let data = event.data.trim();
        if data == "[DONE]" {
            return Ok(vec![StreamChunk::Done]);
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let value: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                return Ok(Vec::new());
            }
        };

        if let Some(err) = embedded_error(&value) {
            return Err(err);
        }

        let chunk: ChatStreamChunk = match serde_json::from_value(value) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "skipping SSE chunk with unexpected shape");
                return Ok(Vec::new());
            }
        };

        Ok(self.convert(chunk))
    }

    fn convert(&mut self, chunk: ChatStreamChunk) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();

        if !self.metadata_seen && (chunk.id.is_some() || chunk.model.is_some()) {
            self.metadata_seen = true;
            chunks.push(StreamChunk::Metadata {
                id: chunk.id,
                model: chunk.model,
            });
        }

        for choice in chunk.choices {
            let message_index = choice.index;

            if let Some(role) = choice.delta.role.as_deref().and_then(|r| r.parse::<Role>().ok()) {
                chunks.push(StreamChunk::Start { message_index, role });
            }

            if let Some(text) = choice.delta.content
                && !text.is_empty()
            {
                chunks.push(StreamChunk::Content { message_index, text });
            }

            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = call.function.map_or((None, None), |f| (f.name, f.arguments));
                chunks.push(StreamChunk::ToolCall(ToolCallFragment {
                    message_index,
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                }));
            }

            if let Some(reason) = choice.finish_reason.as_deref().and_then(finish_reason) {
                chunks.push(StreamChunk::Finish { reason });
            }
        }

        if let Some(usage) = chunk.usage {
            chunks.push(StreamChunk::Usage(usage_from_wire(usage)));
        }

        chunks
    }
}
