//! Plain-text transcript of a planning conversation

use std::collections::HashMap;

use crate::llm::{Message, Role};
use crate::tools::RESERVED_TOOL_NAMES;

/// Tool output longer than this is cut in transcripts
const MAX_TOOL_OUTPUT_CHARS: usize = 2000;

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}\n[... truncated]")
}

/// Render the history for prompts that judge or summarize the conversation
///
/// System messages are left out. Answers to the human pseudo-tools are shown
/// as user turns.
pub fn render(messages: &[Message]) -> String {
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    let mut out = String::new();

    for message in messages {
        match message.role {
            Role::System => continue,
            Role::User => {
                out.push_str(&format!("User: {}\n\n", message.content.trim()));
            }
            Role::Assistant => {
                if !message.content.trim().is_empty() {
                    out.push_str(&format!("Assistant: {}\n\n", message.content.trim()));
                }
                for call in &message.tool_calls {
                    call_names.insert(call.id.as_str(), call.name.as_str());
                    if RESERVED_TOOL_NAMES.contains(&call.name.as_str()) {
                        let question = call.args.get("question").and_then(|q| q.as_str()).unwrap_or_default();
                        out.push_str(&format!("Assistant asks: {}\n", question.trim()));
                        if let Some(options) = call.args.get("options").and_then(|o| o.as_array()) {
                            for (i, option) in options.iter().enumerate() {
                                let title = option
                                    .get("title")
                                    .and_then(|t| t.as_str())
                                    .or_else(|| option.as_str())
                                    .unwrap_or_default();
                                out.push_str(&format!("  {}. {}\n", i + 1, title));
                            }
                        }
                        out.push('\n');
                    } else {
                        out.push_str(&format!("Assistant calls {} with {}\n\n", call.name, call.args));
                    }
                }
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().unwrap_or_default();
                let name = call_names.get(id).copied().unwrap_or("tool");
                if RESERVED_TOOL_NAMES.contains(&name) {
                    out.push_str(&format!("User: {}\n\n", message.content.trim()));
                } else if message.is_error {
                    out.push_str(&format!("Tool {name} failed: {}\n\n", message.content.trim()));
                } else {
                    out.push_str(&format!(
                        "Tool {name} returned: {}\n\n",
                        truncate(message.content.trim(), MAX_TOOL_OUTPUT_CHARS)
                    ));
                }
            }
        }
    }

    out.trim_end().to_string()
}
