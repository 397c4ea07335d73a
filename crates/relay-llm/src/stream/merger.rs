//! Reassembly of fragmented tool calls

use std::collections::BTreeMap;

use crate::types::{Action, ToolArguments, ToolCallFragment};

/// Tool call under construction
#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: Option<String>,
}

/// Merges tool-call fragments keyed by (message index, tool-call index)
///
/// `id` and `name` are taken from the first fragment that carries them and
/// never overwritten. Argument text is appended in arrival order and parsed
/// once, when the merger is consumed by [`ToolCallMerger::finalize`].
#[derive(Debug, Default)]
pub struct ToolCallMerger {
    calls: BTreeMap<(usize, usize), PendingCall>,
}

impl ToolCallMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into its call
    pub fn merge(&mut self, fragment: &ToolCallFragment) {
        let call = self.calls.entry((fragment.message_index, fragment.index)).or_default();

        if call.id.is_none()
            && let Some(id) = fragment.id.as_ref().filter(|id| !id.is_empty())
        {
            call.id = Some(id.clone());
        }
        if call.name.is_none()
            && let Some(name) = fragment.name.as_ref().filter(|name| !name.is_empty())
        {
            call.name = Some(name.clone());
        }
        if let Some(text) = &fragment.arguments {
            call.arguments.get_or_insert_with(String::new).push_str(text);
        }
    }

    /// In-progress view of the calls on `message_index`
    ///
    /// Arguments are left unparsed in `raw_params` until finalization.
    pub fn snapshot(&self, message_index: usize) -> Vec<Action> {
        self.calls
            .range((message_index, 0)..=(message_index, usize::MAX))
            .map(|(_, call)| {
                let arguments = call
                    .arguments
                    .clone()
                    .map_or(ToolArguments::Missing, ToolArguments::Malformed);
                Action::with_arguments(
                    call.id.clone().unwrap_or_default(),
                    call.name.clone().unwrap_or_default(),
                    arguments,
                )
            })
            .collect()
    }

    /// Parse every argument buffer and group the finished actions by message index
    pub fn finalize(self) -> BTreeMap<usize, Vec<Action>> {
        let mut actions: BTreeMap<usize, Vec<Action>> = BTreeMap::new();

        for ((message_index, index), call) in self.calls {
            let arguments = ToolArguments::parse(call.arguments.as_deref());
            if let ToolArguments::Malformed(text) = &arguments {
                tracing::debug!(index, arguments = %text, "tool call arguments are not a JSON object");
            }

            let id = call.id.unwrap_or_else(|| {
                tracing::debug!(index, "tool call without id, generating one");
                format!("call_{}", uuid::Uuid::new_v4().simple())
            });
            let name = call.name.unwrap_or_else(|| {
                tracing::debug!(index, "tool call without name");
                String::new()
            });

            actions
                .entry(message_index)
                .or_default()
                .push(Action::with_arguments(id, name, arguments));
        }

        actions
    }
}
