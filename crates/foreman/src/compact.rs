//! Context compaction: replace the oldest slice of a conversation with an
//! LLM-generated summary once the estimated token count crosses a threshold.
//!
//! Installed as an `on_turn_end` hook. Best-effort: any failure is logged
//! and the history is left untouched.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Error;
use crate::hook::{Hook, HookFuture};
use crate::llm::Provider;
use crate::llm::types::{CompletionRequest, ContentBlock, Message};

/// Marker heading that identifies an already-compacted prefix.
const SUMMARY_HEADING: &str = "## Previous Context";

const SUMMARIZATION_SYSTEM: &str = "You are a summarization assistant. Summarize conversations \
     concisely, preserving goals, key decisions, and the context needed to \
     continue the work. Structure every summary as: Goal / Key Decisions / \
     Context. Be brief.";

/// Thresholds for when and how much to compact.
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// Model context window, in tokens.
    pub context_window: usize,
    /// Compact once the estimate reaches this fraction of the window.
    pub trigger_ratio: f64,
    /// The preserved suffix must fit in this fraction of the window.
    pub preserve_ratio: f64,
    /// Characters per token for the estimate.
    pub chars_per_token: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            context_window: 200_000,
            trigger_ratio: 0.75,
            preserve_ratio: 0.25,
            chars_per_token: 4,
        }
    }
}

impl CompactionConfig {
    pub fn new(context_window: usize) -> Self {
        Self {
            context_window,
            ..Self::default()
        }
    }
}

/// Character weight of one message for estimation purposes.
fn message_chars(message: &Message) -> usize {
    match message {
        Message::User { content } => content.len(),
        Message::Assistant { content } => content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.len(),
                ContentBlock::ToolUse { name, input, .. } => {
                    name.len() + input.to_string().len()
                }
            })
            .sum(),
        Message::ToolResult { content, .. } => content.len(),
    }
}

fn estimate_tokens(chars: usize, chars_per_token: usize) -> usize {
    chars.div_ceil(chars_per_token.max(1))
}

/// Hook adapter that rewrites the history into summary + recent suffix.
pub struct CompactionHook<P: Provider> {
    provider: Arc<P>,
    config: CompactionConfig,
}

impl<P: Provider> CompactionHook<P> {
    pub fn new(provider: Arc<P>, config: CompactionConfig) -> Self {
        Self { provider, config }
    }

    async fn compact(&self, messages: &mut Vec<Message>) -> Result<(), Error> {
        let total_chars: usize = messages.iter().map(message_chars).sum();
        let tokens = estimate_tokens(total_chars, self.config.chars_per_token);
        let threshold = self.config.context_window as f64 * self.config.trigger_ratio;
        if (tokens as f64) < threshold {
            return Ok(());
        }

        let cut = self.choose_cut(messages);
        if cut == 0 {
            return Ok(());
        }

        debug!(
            tokens,
            cut,
            total = messages.len(),
            "compacting conversation prefix"
        );

        let archive = &messages[..cut];
        let (previous_summary, archive) = match archive.first() {
            Some(Message::User { content }) if content.starts_with(SUMMARY_HEADING) => {
                (Some(content.clone()), &archive[1..])
            }
            _ => (None, archive),
        };

        let (reads, writes) = extract_file_ops(archive);
        let transcript = render_transcript(archive);
        let prompt = match &previous_summary {
            Some(previous) => format!(
                "Here is the summary of the conversation so far:\n\n{previous}\n\n\
                 Fold in the following newer events and produce an updated summary:\n\n\
                 {transcript}\n\n\
                 Respond with the updated summary only, structured as \
                 Goal / Key Decisions / Context. Be brief."
            ),
            None => format!(
                "Summarize the following conversation so the transcript can be \
                 replaced by your summary:\n\n{transcript}\n\n\
                 Respond with the summary only, structured as \
                 Goal / Key Decisions / Context. Be brief."
            ),
        };

        let response = self
            .provider
            .complete(CompletionRequest {
                system: Some(SUMMARIZATION_SYSTEM.into()),
                messages: vec![Message::user(prompt)],
                tools: vec![],
            })
            .await?;
        let summary = response.text();

        let mut block = format!("{SUMMARY_HEADING}\n\n{summary}");
        if !reads.is_empty() || !writes.is_empty() {
            block.push_str("\n\n## Touched Files (Archived)\n");
            if !reads.is_empty() {
                block.push_str("\nRead:\n");
                for path in &reads {
                    block.push_str(&format!("- {path}\n"));
                }
            }
            if !writes.is_empty() {
                block.push_str("\nModified:\n");
                for path in &writes {
                    block.push_str(&format!("- {path}\n"));
                }
            }
        }

        messages.splice(0..cut, std::iter::once(Message::user(block)));
        Ok(())
    }

    /// Pick the archive/recent boundary: walk backwards until the preserved
    /// suffix would exceed the preserve budget, then advance past any leading
    /// tool-results so no result is orphaned from its originating call.
    fn choose_cut(&self, messages: &[Message]) -> usize {
        let budget = self.config.context_window as f64 * self.config.preserve_ratio;
        let mut cut = messages.len();
        let mut kept = 0f64;
        for (i, message) in messages.iter().enumerate().rev() {
            let tokens =
                estimate_tokens(message_chars(message), self.config.chars_per_token) as f64;
            if kept + tokens > budget {
                break;
            }
            kept += tokens;
            cut = i;
        }
        // Nothing fits: keep the latest message anyway.
        if cut >= messages.len() {
            cut = messages.len() - 1;
        }
        while cut < messages.len() - 1 && messages[cut].is_tool_result() {
            cut += 1;
        }
        cut
    }
}

impl<P: Provider + 'static> Hook for CompactionHook<P> {
    fn on_turn_end<'a>(&'a self, messages: &'a mut Vec<Message>) -> HookFuture<'a> {
        Box::pin(async move {
            if let Err(e) = self.compact(messages).await {
                warn!(error = %e, "context compaction failed, keeping full history");
            }
            Ok(())
        })
    }
}

/// Collect `path` arguments of archived read/load and write calls,
/// sorted and de-duplicated.
fn extract_file_ops(archive: &[Message]) -> (Vec<String>, Vec<String>) {
    let mut reads = BTreeSet::new();
    let mut writes = BTreeSet::new();
    for message in archive {
        let Message::Assistant { content } = message else {
            continue;
        };
        for block in content {
            let ContentBlock::ToolUse { name, input, .. } = block else {
                continue;
            };
            let Some(path) = input.get("path").and_then(|v| v.as_str()) else {
                continue;
            };
            match name.as_str() {
                "read_file" | "load" => {
                    reads.insert(path.to_string());
                }
                "write_file" => {
                    writes.insert(path.to_string());
                }
                _ => {}
            }
        }
    }
    (reads.into_iter().collect(), writes.into_iter().collect())
}

fn render_transcript(archive: &[Message]) -> String {
    archive
        .iter()
        .map(|message| match message {
            Message::User { content } => format!("User: {content}"),
            Message::Assistant { content } => format!(
                "Assistant: {}",
                serde_json::to_string(content).unwrap_or_else(|_| "[]".into())
            ),
            Message::ToolResult {
                tool_use_id,
                content,
                ..
            } => format!("Tool Result ({tool_use_id}): {content}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
