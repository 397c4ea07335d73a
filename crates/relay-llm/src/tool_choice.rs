//! Clearing a forced tool choice once it has been honoured
//!
//! A prompt that forces tool use would force it again on the follow-up turn
//! carrying the tool results, looping forever. After each turn the choice
//! is reset when the model did what it was forced to do.

use crate::types::{Action, Prompt, Response, ToolChoice, ToolChoiceMode};

/// Reset `prompt`'s tool choice if `invoked` satisfied it
///
/// Returns whether the choice was cleared.
pub fn clear_tool_choice(prompt: &mut Prompt, invoked: &[Action]) -> bool {
    let clear = match &prompt.options.tool_choice {
        Some(ToolChoice::Mode(ToolChoiceMode::Required)) => {
            if invoked.is_empty() {
                tracing::warn!(
                    model = %prompt.options.model,
                    "tool use was required but the model invoked no tools"
                );
            }
            !invoked.is_empty()
        }
        Some(ToolChoice::Action { name }) => !invoked.is_empty() && invoked.iter().all(|action| &action.name == name),
        Some(ToolChoice::Mode(ToolChoiceMode::Auto | ToolChoiceMode::None)) | None => false,
    };

    if clear {
        tracing::debug!(choice = ?prompt.options.tool_choice, "clearing satisfied tool choice");
        prompt.options.tool_choice = None;
    }
    clear
}

/// Apply [`clear_tool_choice`] with the actions `response` requested
pub fn clear_after_turn(prompt: &mut Prompt, response: &Response) -> bool {
    clear_tool_choice(prompt, &response.message.requested_actions)
}
