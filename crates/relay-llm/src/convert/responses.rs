//! Conversion between the canonical model and the Responses API wire format

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::chat::mode_str;
use super::{arguments_from_wire, decode, embedded_error, error_from_code, file_data_uri};
use crate::error::LlmError;
use crate::protocol::responses::{
    ResponsesIncompleteDetails, ResponsesInputContent, ResponsesInputItem, ResponsesOutputContent,
    ResponsesOutputItem, ResponsesRequest, ResponsesResponse, ResponsesStreamEvent, ResponsesText,
    ResponsesTextFormat, ResponsesTool, ResponsesUsage,
};
use crate::types::{
    Action, Content, ContentPart, FinishReason, Message, Prompt, Response, Role, SseEvent, StreamChunk,
    ToolCallFragment, ToolChoice, Usage,
};

// -- Request --

/// Build a Responses API request body from a prompt
pub fn build_request(prompt: &Prompt) -> Result<ResponsesRequest, LlmError> {
    let options = &prompt.options;

    let mut input = Vec::with_capacity(prompt.messages.len());
    for message in &prompt.messages {
        push_input_items(message, &mut input)?;
    }

    let tools = (!prompt.actions.is_empty()).then(|| {
        prompt
            .actions
            .iter()
            .map(|action| ResponsesTool {
                tool_type: "function".to_owned(),
                name: action.name.clone(),
                description: action.description.clone(),
                parameters: action.parameters_or_empty(),
                strict: action.strict,
            })
            .collect::<Vec<_>>()
    });

    let tool_choice = tools.as_ref().and(options.tool_choice.as_ref()).map(|choice| match choice {
        ToolChoice::Mode(mode) => Value::String(mode_str(*mode).to_owned()),
        ToolChoice::Action { name } => serde_json::json!({"type": "function", "name": name}),
    });

    let text = options.response_schema.as_ref().map(|schema| ResponsesText {
        format: ResponsesTextFormat::JsonSchema {
            name: schema.name.clone(),
            description: schema.description.clone(),
            schema: schema.schema.clone(),
            strict: Some(schema.strict),
        },
    });

    Ok(ResponsesRequest {
        model: options.model.clone(),
        input,
        instructions: prompt.instructions.clone(),
        temperature: options.temperature,
        top_p: options.top_p,
        max_output_tokens: options.max_tokens,
        stream: options.stream.then_some(true),
        tools,
        tool_choice,
        text,
        extras: options.extras.clone(),
    })
}

fn push_input_items(message: &Message, input: &mut Vec<ResponsesInputItem>) -> Result<(), LlmError> {
    match message.role {
        Role::Tool => {
            let call_id = message
                .action_id
                .clone()
                .ok_or_else(|| LlmError::validation("action_id", "tool messages must name the action they answer"))?;
            input.push(ResponsesInputItem::FunctionCallOutput {
                call_id,
                output: message.content.as_text(),
            });
        }
        Role::Assistant => {
            if !message.content.is_empty() {
                input.push(ResponsesInputItem::Message {
                    role: message.role.as_str().to_owned(),
                    content: vec![ResponsesInputContent::OutputText {
                        text: message.content.as_text(),
                    }],
                });
            }
            for action in &message.requested_actions {
                input.push(ResponsesInputItem::FunctionCall {
                    call_id: action.id.clone(),
                    name: action.name.clone(),
                    arguments: action.arguments_json(),
                });
            }
        }
        Role::System | Role::User => {
            let content = match &message.content {
                Content::Text(text) => vec![ResponsesInputContent::InputText { text: text.clone() }],
                Content::Parts(parts) => parts.iter().map(to_input_content).collect(),
            };
            input.push(ResponsesInputItem::Message {
                role: message.role.as_str().to_owned(),
                content,
            });
        }
    }
    Ok(())
}

fn to_input_content(part: &ContentPart) -> ResponsesInputContent {
    match part {
        ContentPart::Text { text } => ResponsesInputContent::InputText { text: text.clone() },
        ContentPart::Image { url, detail } => ResponsesInputContent::InputImage {
            image_url: url.clone(),
            detail: detail.clone(),
        },
        ContentPart::File(file) => ResponsesInputContent::InputFile {
            file_id: file.file_id.clone(),
            file_url: file.url.clone(),
            file_data: file_data_uri(file),
            filename: file.filename.clone(),
        },
    }
}

// -- Response --

/// Parse a complete Responses API response object
pub fn parse_response(prompt: &Prompt, raw: Value) -> Result<Response, LlmError> {
    if let Some(err) = embedded_error(&raw) {
        return Err(err);
    }

    let wire: ResponsesResponse = decode(&raw, "response object")?;
    if wire.status.as_deref() == Some("failed") {
        return Err(failure(&wire));
    }

    let mut role = Role::Assistant;
    let mut text = String::new();
    let mut actions = Vec::new();

    for item in wire.output {
        match item {
            ResponsesOutputItem::Message { role: wire_role, content, .. } => {
                role = wire_role.parse()?;
                for part in content {
                    match part {
                        ResponsesOutputContent::OutputText { text: fragment } => text.push_str(&fragment),
                        ResponsesOutputContent::Refusal { refusal } => text.push_str(&refusal),
                        ResponsesOutputContent::Other => {}
                    }
                }
            }
            ResponsesOutputItem::FunctionCall {
                call_id, name, arguments, ..
            } => {
                let arguments = arguments.map(Value::String);
                actions.push(Action::with_arguments(call_id, name, arguments_from_wire(arguments.as_ref())));
            }
            ResponsesOutputItem::Other => {}
        }
    }

    let finish_reason = finish_reason(wire.incomplete_details.as_ref(), !actions.is_empty());
    let mut response = Response::new(prompt, Message::new(role, text).with_actions(actions), raw);
    response.id = wire.id;
    response.model = wire.model;
    response.usage = wire.usage.map(usage_from_wire);
    response.finish_reason = Some(finish_reason);
    Ok(response)
}

fn finish_reason(incomplete: Option<&ResponsesIncompleteDetails>, called_tools: bool) -> FinishReason {
    match incomplete.map(|d| d.reason.as_str()) {
        Some("max_output_tokens") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ if called_tools => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

fn failure(wire: &ResponsesResponse) -> LlmError {
    wire.error.as_ref().map_or_else(
        || LlmError::provider("response failed"),
        |e| error_from_code(e.code.as_deref(), e.message.clone()),
    )
}

const fn usage_from_wire(usage: ResponsesUsage) -> Usage {
    Usage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens,
    }
}

// -- Stream --

/// Decoder for Responses API SSE streams
///
/// Output items are numbered across messages and tool calls; tool calls are
/// renumbered sequentially so the first call is index 0.
#[derive(Debug, Default)]
pub struct ResponsesStreamDecoder {
    tool_indices: BTreeMap<usize, usize>,
    arguments_seen: BTreeSet<usize>,
}

impl ResponsesStreamDecoder {
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
                tracing::debug!(error = %e, data = %data, "skipping unparseable SSE event");
                return Ok(Vec::new());
            }
        };

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(event.event.as_str())
            .to_owned();

        match serde_json::from_value::<ResponsesStreamEvent>(value) {
            Ok(wire) => self.convert(wire, kind),
            Err(e) => {
                tracing::debug!(error = %e, kind = %kind, "skipping SSE event with unexpected shape");
                Ok(Vec::new())
            }
        }
    }

    fn convert(&mut self, event: ResponsesStreamEvent, kind: String) -> Result<Vec<StreamChunk>, LlmError> {
        let chunks = match event {
            ResponsesStreamEvent::Created { response } => vec![StreamChunk::Metadata {
                id: response.id,
                model: response.model,
            }],

            ResponsesStreamEvent::OutputItemAdded { output_index, item } => match item {
                ResponsesOutputItem::Message { role, .. } => role
                    .parse::<Role>()
                    .map(|role| vec![StreamChunk::Start { message_index: 0, role }])
                    .unwrap_or_default(),
                ResponsesOutputItem::FunctionCall { call_id, name, .. } => {
                    let index = self.tool_indices.len();
                    self.tool_indices.insert(output_index, index);
                    vec![StreamChunk::ToolCall(ToolCallFragment::start(index, call_id, name))]
                }
                ResponsesOutputItem::Other => vec![StreamChunk::Informational { kind }],
            },

            ResponsesStreamEvent::OutputTextDelta { delta, .. } => vec![StreamChunk::text(delta)],

            ResponsesStreamEvent::FunctionCallArgumentsDelta { output_index, delta } => {
                match self.tool_indices.get(&output_index) {
                    Some(&index) => {
                        self.arguments_seen.insert(output_index);
                        vec![StreamChunk::ToolCall(ToolCallFragment::arguments(index, delta))]
                    }
                    None => {
                        tracing::debug!(output_index, "argument delta for unknown output item");
                        Vec::new()
                    }
                }
            }

            // A call whose arguments never streamed carries them on completion
            ResponsesStreamEvent::OutputItemDone {
                output_index,
                item: ResponsesOutputItem::FunctionCall { arguments, .. },
            } => match self.tool_indices.get(&output_index) {
                Some(&index) if !self.arguments_seen.contains(&output_index) => {
                    vec![StreamChunk::ToolCall(ToolCallFragment {
                        index,
                        arguments,
                        ..ToolCallFragment::default()
                    })]
                }
                _ => vec![StreamChunk::Informational { kind }],
            },

            ResponsesStreamEvent::Completed { response } | ResponsesStreamEvent::Incomplete { response } => {
                let mut chunks = Vec::with_capacity(3);
                if let Some(usage) = response.usage {
                    chunks.push(StreamChunk::Usage(usage_from_wire(usage)));
                }
                chunks.push(StreamChunk::Finish {
                    reason: finish_reason(response.incomplete_details.as_ref(), !self.tool_indices.is_empty()),
                });
                chunks.push(StreamChunk::Done);
                chunks
            }

            ResponsesStreamEvent::Failed { response } => return Err(failure(&response)),
            ResponsesStreamEvent::Error { code, message } => return Err(error_from_code(code.as_deref(), message)),

            ResponsesStreamEvent::OutputItemDone { .. } | ResponsesStreamEvent::Other => {
                vec![StreamChunk::Informational { kind }]
            }
        };

        Ok(chunks)
    }
}
