//! Conversion between the canonical model and the Anthropic Messages format

use std::collections::BTreeMap;

use serde_json::Value;

use super::{decode, embedded_error, error_from_code, split_data_uri};
use crate::error::LlmError;
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicMessage, AnthropicModelList, AnthropicRequest, AnthropicResponse,
    AnthropicResponseBlock, AnthropicSource, AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent,
    AnthropicTokenCount, AnthropicTool, AnthropicToolChoice, AnthropicUsage,
};
use crate::types::{
    Action, Content, ContentPart, FileReference, FinishReason, Message, Prompt, Response, Role, SseEvent, StreamChunk,
    ToolArguments, ToolCallFragment, ToolChoice, ToolChoiceMode, Usage,
};

/// Default max tokens when not specified (Anthropic requires this field)
const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Request --

/// Build a Messages API request body from a prompt
///
/// System messages and instructions are lifted into the top-level `system`
/// field; consecutive turns with the same wire role are merged because the
/// API requires strict user/assistant alternation.
pub fn build_request(prompt: &Prompt) -> Result<AnthropicRequest, LlmError> {
    let options = &prompt.options;

    if options.response_schema.is_some() {
        return Err(LlmError::unsupported("anthropic", "structured output schemas"));
    }

    let mut system_parts: Vec<String> = prompt.instructions.iter().cloned().collect();
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for message in &prompt.messages {
        if message.role == Role::System {
            system_parts.push(message.content.as_text());
            continue;
        }

        let role = if message.role == Role::Assistant { "assistant" } else { "user" };
        let blocks = to_blocks(message)?;
        if blocks.is_empty() {
            tracing::debug!(role, "dropping message without content blocks");
            continue;
        }

        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(AnthropicMessage {
                role: role.to_owned(),
                content: blocks,
            }),
        }
    }

    let tools = (!prompt.actions.is_empty()).then(|| {
        prompt
            .actions
            .iter()
            .map(|action| AnthropicTool {
                name: action.name.clone(),
                description: action.description.clone(),
                input_schema: action.parameters_or_empty(),
            })
            .collect::<Vec<_>>()
    });

    let tool_choice = tools.as_ref().and(options.tool_choice.as_ref()).map(to_tool_choice);

    Ok(AnthropicRequest {
        model: options.model.clone(),
        max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        messages,
        temperature: options.temperature,
        top_p: options.top_p,
        stop_sequences: options.stop.clone(),
        stream: options.stream.then_some(true),
        tools,
        tool_choice,
        extras: options.extras.clone(),
    })
}

fn to_blocks(message: &Message) -> Result<Vec<AnthropicContentBlock>, LlmError> {
    if message.role == Role::Tool {
        let tool_use_id = message
            .action_id
            .clone()
            .ok_or_else(|| LlmError::validation("action_id", "tool messages must name the action they answer"))?;
        let is_error = message
            .metadata
            .get("is_error")
            .and_then(Value::as_bool)
            .filter(|failed| *failed);
        return Ok(vec![AnthropicContentBlock::ToolResult {
            tool_use_id,
            content: Some(message.content.as_text()),
            is_error,
        }]);
    }

    let mut blocks = match &message.content {
        Content::Text(text) if text.is_empty() => Vec::new(),
        Content::Text(text) => vec![AnthropicContentBlock::Text { text: text.clone() }],
        Content::Parts(parts) => parts.iter().map(to_block).collect::<Result<Vec<_>, _>>()?,
    };

    blocks.extend(message.requested_actions.iter().map(|action| AnthropicContentBlock::ToolUse {
        id: action.id.clone(),
        name: action.name.clone(),
        input: action.arguments_value(),
    }));

    Ok(blocks)
}

fn to_block(part: &ContentPart) -> Result<AnthropicContentBlock, LlmError> {
    match part {
        ContentPart::Text { text } => Ok(AnthropicContentBlock::Text { text: text.clone() }),
        ContentPart::Image { url, .. } => {
            let source = match split_data_uri(url) {
                Some((media_type, data)) => AnthropicSource::Base64 {
                    media_type: media_type.to_owned(),
                    data: data.to_owned(),
                },
                None => AnthropicSource::Url { url: url.clone() },
            };
            Ok(AnthropicContentBlock::Image { source })
        }
        ContentPart::File(file) => Ok(AnthropicContentBlock::Document {
            source: document_source(file)?,
            title: file.filename.clone(),
        }),
    }
}

fn document_source(file: &FileReference) -> Result<AnthropicSource, LlmError> {
    if let Some(file_id) = &file.file_id {
        return Ok(AnthropicSource::File {
            file_id: file_id.clone(),
        });
    }
    if let Some(data) = &file.data {
        let (media_type, data) = split_data_uri(data)
            .unwrap_or((file.media_type.as_deref().unwrap_or("application/pdf"), data.as_str()));
        return Ok(AnthropicSource::Base64 {
            media_type: media_type.to_owned(),
            data: data.to_owned(),
        });
    }
    if let Some(url) = &file.url {
        return Ok(AnthropicSource::Url { url: url.clone() });
    }
    Err(LlmError::validation("content", "file reference needs a file_id, url, or data"))
}

fn to_tool_choice(choice: &ToolChoice) -> AnthropicToolChoice {
    let (choice_type, name) = match choice {
        ToolChoice::Mode(ToolChoiceMode::None) => ("none", None),
        ToolChoice::Mode(ToolChoiceMode::Auto) => ("auto", None),
        ToolChoice::Mode(ToolChoiceMode::Required) => ("any", None),
        ToolChoice::Action { name } => ("tool", Some(name.clone())),
    };
    AnthropicToolChoice {
        choice_type: choice_type.to_owned(),
        name,
    }
}

// -- Response --

/// Parse a complete Messages API response
pub fn parse_response(prompt: &Prompt, raw: Value) -> Result<Response, LlmError> {
    if let Some(err) = embedded_error(&raw) {
        return Err(err);
    }

    let wire: AnthropicResponse = decode(&raw, "message")?;
    let role: Role = wire.role.parse()?;

    let mut text = String::new();
    let mut actions = Vec::new();
    for block in wire.content {
        match block {
            AnthropicResponseBlock::Text { text: fragment } => text.push_str(&fragment),
            AnthropicResponseBlock::ToolUse { id, name, input } => {
                actions.push(Action::with_arguments(id, name, input_arguments(input)));
            }
            AnthropicResponseBlock::Other => {}
        }
    }

    let mut response = Response::new(prompt, Message::new(role, text).with_actions(actions), raw);
    response.id = wire.id;
    response.model = wire.model;
    response.usage = wire.usage.map(usage_from_wire);
    response.finish_reason = wire.stop_reason.as_deref().and_then(finish_reason);
    Ok(response)
}

fn input_arguments(input: Value) -> ToolArguments {
    match input {
        Value::Object(map) => ToolArguments::Parsed(map),
        Value::Null => ToolArguments::Missing,
        other => ToolArguments::Malformed(other.to_string()),
    }
}

const fn usage_from_wire(usage: AnthropicUsage) -> Usage {
    Usage::new(usage.input_tokens, usage.output_tokens)
}

/// Normalise an Anthropic stop reason
pub fn finish_reason(reason: &str) -> Option<FinishReason> {
    match reason {
        "end_turn" | "stop_sequence" => Some(FinishReason::Stop),
        "max_tokens" => Some(FinishReason::Length),
        "tool_use" => Some(FinishReason::ToolCalls),
        "refusal" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

/// Parse a token counting response
pub fn parse_token_count(raw: &Value) -> Result<u32, LlmError> {
    if let Some(err) = embedded_error(raw) {
        return Err(err);
    }
    let count: AnthropicTokenCount = decode(raw, "token count")?;
    Ok(count.input_tokens)
}

/// Parse a model listing into model ids
pub fn parse_models(raw: &Value) -> Result<Vec<String>, LlmError> {
    if let Some(err) = embedded_error(raw) {
        return Err(err);
    }
    let list: AnthropicModelList = decode(raw, "model list")?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}

// -- Stream --

/// Decoder for Messages API SSE streams
///
/// Anthropic's content block index is shared across all block types (text,
/// `tool_use`, ...), so it cannot be used as the tool-call index: a tool use
/// that follows a text block would have block index 1+. Tool calls are
/// numbered sequentially instead.
#[derive(Debug, Default)]
pub struct AnthropicStreamDecoder {
    tool_indices: BTreeMap<usize, usize>,
}

impl AnthropicStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one SSE event into canonical chunks
    pub fn decode(&mut self, event: &SseEvent) -> Result<Vec<StreamChunk>, LlmError> {
        let data = event.data.trim();
        if data.is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<AnthropicStreamEvent>(data) {
            Ok(AnthropicStreamEvent::Unknown) => Ok(vec![StreamChunk::Informational {
                kind: event.event.clone(),
            }]),
            Ok(wire) => self.convert(wire),
            Err(e) => {
                tracing::debug!(error = %e, data = %data, "skipping unparseable SSE event");
                Ok(Vec::new())
            }
        }
    }

    fn convert(&mut self, event: AnthropicStreamEvent) -> Result<Vec<StreamChunk>, LlmError> {
        let chunks = match event {
            AnthropicStreamEvent::MessageStart { message } => {
                let mut chunks = vec![StreamChunk::Metadata {
                    id: message.id,
                    model: message.model,
                }];
                if let Ok(role) = message.role.parse::<Role>() {
                    chunks.push(StreamChunk::Start { message_index: 0, role });
                }
                if let Some(usage) = message.usage {
                    chunks.push(StreamChunk::Usage(usage_from_wire(usage)));
                }
                chunks
            }

            AnthropicStreamEvent::ContentBlockStart { index, content_block } => match content_block {
                AnthropicStreamContentBlock::Text { text } if text.is_empty() => Vec::new(),
                AnthropicStreamContentBlock::Text { text } => vec![StreamChunk::text(text)],
                AnthropicStreamContentBlock::ToolUse { id, name, input } => {
                    let tool_index = self.tool_indices.len();
                    self.tool_indices.insert(index, tool_index);
                    let mut fragment = ToolCallFragment::start(tool_index, id, name);
                    // Input is normally `{}` here with the real arguments streamed as deltas
                    if input.as_object().is_some_and(|map| !map.is_empty()) {
                        fragment.arguments = Some(input.to_string());
                    }
                    vec![StreamChunk::ToolCall(fragment)]
                }
                AnthropicStreamContentBlock::Other => vec![StreamChunk::Informational {
                    kind: "content_block_start".to_owned(),
                }],
            },

            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                AnthropicStreamDelta::TextDelta { text } => vec![StreamChunk::text(text)],
                AnthropicStreamDelta::InputJsonDelta { partial_json } => match self.tool_indices.get(&index) {
                    Some(&tool_index) => vec![StreamChunk::ToolCall(ToolCallFragment::arguments(tool_index, partial_json))],
                    None => {
                        tracing::debug!(index, "input delta for unknown content block");
                        Vec::new()
                    }
                },
                AnthropicStreamDelta::Other => vec![StreamChunk::Informational {
                    kind: "content_block_delta".to_owned(),
                }],
            },

            AnthropicStreamEvent::ContentBlockStop { .. } => Vec::new(),

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut chunks = Vec::with_capacity(2);
                if let Some(reason) = delta.stop_reason.as_deref().and_then(finish_reason) {
                    chunks.push(StreamChunk::Finish { reason });
                }
                if let Some(usage) = usage {
                    chunks.push(StreamChunk::Usage(usage_from_wire(usage)));
                }
                chunks
            }

            AnthropicStreamEvent::MessageStop => vec![StreamChunk::Done],

            AnthropicStreamEvent::Ping => vec![StreamChunk::Informational {
                kind: "ping".to_owned(),
            }],

            AnthropicStreamEvent::Error { error } => {
                return Err(error_from_code(Some(&error.error_type), error.message));
            }

            AnthropicStreamEvent::Unknown => vec![StreamChunk::Informational {
                kind: "unknown".to_owned(),
            }],
        };

        Ok(chunks)
    }
}
