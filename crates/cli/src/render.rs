use services::agents::{AgentMessage, MemoryBlock};
use services::wakeup::WakeupLogEntry;

/// Longest memory value shown by `get-memory`.
pub const MEMORY_PREVIEW_CHARS: usize = 200;

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn json_or_empty(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// One display line per message; message types without a renderer are skipped.
pub fn render_message(message: &AgentMessage) -> Option<String> {
    match message.message_type.as_str() {
        "assistant_message" => Some(format!(
            "Assistant: {}",
            message.text().unwrap_or_default()
        )),
        "reasoning_message" => Some(format!(
            "Reasoning: {}",
            message.reasoning.as_deref().unwrap_or_default()
        )),
        "tool_call_message" => Some(format!(
            "Tool call: {}",
            json_or_empty(message.tool_call.as_ref())
        )),
        "tool_return_message" => Some(format!(
            "Tool result: {}",
            json_or_empty(message.tool_return.as_ref())
        )),
        _ => None,
    }
}

pub fn render_messages(messages: &[AgentMessage]) -> Vec<String> {
    messages.iter().filter_map(render_message).collect()
}

pub fn render_memory(blocks: &[MemoryBlock]) -> Vec<String> {
    blocks
        .iter()
        .map(|block| {
            format!(
                "  {}: {}",
                block.label,
                truncate_chars(&block.value, MEMORY_PREVIEW_CHARS)
            )
        })
        .collect()
}

pub fn render_wakeup_log(entry: &WakeupLogEntry) -> Vec<String> {
    let mut lines = vec![format!(
        "[{}] {} messages",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        entry.response_count
    )];
    for message in &entry.messages {
        if let Some(reasoning) = &message.reasoning {
            lines.push(format!("  Reasoning: {reasoning}"));
        }
        if let Some(content) = &message.content {
            lines.push(format!("  Assistant: {content}"));
        }
    }
    lines
}

/// Left-aligned plain-text table.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_row = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_row(headers.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(format_row(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}
