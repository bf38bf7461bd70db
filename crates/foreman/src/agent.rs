//! The agent loop: alternate provider calls and tool executions until the
//! model emits a turn with no tool calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::Error;
use crate::hook::HookSet;
use crate::llm::types::{CompletionRequest, Message, ToolDefinition, ToolResult};
use crate::llm::{Provider, StreamEvent};
use crate::tool::{Tool, ToolContext, ToolSpec};

/// Tool results longer than this are cut down to head + tail.
const TRUNCATE_LIMIT: usize = 32_000;
const HEAD_CHARS: usize = 24_000;
const TAIL_CHARS: usize = 6_000;

/// Run the agent loop to completion and return the final assistant message.
///
/// `messages` is the durable conversation state and is mutated in place:
/// the assistant turn and every tool result are appended as they are
/// produced. Callers needing isolation must clone before calling.
///
/// Tool failures (unknown name, invalid arguments, execution errors) are
/// converted into error-flagged tool results and handed back to the model;
/// only provider errors, stream truncation, and worker aborts are fatal.
pub async fn run_agent_loop<P: Provider>(
    messages: &mut Vec<Message>,
    tools: &[Arc<dyn Tool>],
    provider: &P,
    ctx: &ToolContext,
    system: Option<&str>,
    hooks: &HookSet,
) -> Result<Message, Error> {
    match drive(messages, tools, provider, ctx, system, hooks).await {
        Ok(message) => Ok(message),
        Err(error) => {
            hooks.error(&error).await;
            Err(error)
        }
    }
}

async fn drive<P: Provider>(
    messages: &mut Vec<Message>,
    tools: &[Arc<dyn Tool>],
    provider: &P,
    ctx: &ToolContext,
    system: Option<&str>,
    hooks: &HookSet,
) -> Result<Message, Error> {
    let mut registry: HashMap<String, (ToolSpec, Arc<dyn Tool>)> =
        HashMap::with_capacity(tools.len());
    let mut wire_tools: Vec<ToolDefinition> = Vec::with_capacity(tools.len());
    for tool in tools {
        let spec = tool.spec();
        if registry.contains_key(&spec.name) {
            warn!(tool = %spec.name, "duplicate tool name, keeping first registration");
            continue;
        }
        wire_tools.push(spec.to_wire());
        registry.insert(spec.name.clone(), (spec, tool.clone()));
    }

    let mut turns = 0usize;
    hooks.loop_start().await?;

    loop {
        turns += 1;
        debug!(turn = turns, messages = messages.len(), "starting turn");
        hooks.llm_start(messages).await?;

        let request = CompletionRequest {
            system: system.map(str::to_string),
            messages: messages.clone(),
            tools: wire_tools.clone(),
        };

        let llm_started = Instant::now();
        let assistant = if hooks.has_text_delta() {
            let mut stream = provider.stream(request).await?;
            let mut done = None;
            while let Some(event) = stream.next().await {
                match event? {
                    StreamEvent::TextDelta { text } => hooks.text_delta(&text),
                    StreamEvent::Done { message } => done = Some(message),
                    // Tool deltas and provider-specific events are ignored.
                    _ => {}
                }
            }
            done.ok_or(Error::StreamEndedWithoutMessage)?
        } else {
            provider.complete(request).await?
        };
        hooks.llm_end(&assistant, llm_started.elapsed()).await?;
        messages.push(assistant.clone());

        let calls = assistant.tool_calls();
        if calls.is_empty() {
            hooks.loop_end(turns).await?;
            return Ok(assistant);
        }

        for call in &calls {
            hooks.tool_start(call).await?;
            let tool_started = Instant::now();

            let mut result = match registry.get(&call.name) {
                None => ToolResult::error(call.id.clone(), "Tool not found"),
                Some((spec, tool)) => match spec.schema.validate(&call.input) {
                    Err(issues) => {
                        ToolResult::error(call.id.clone(), format!("Invalid arguments: {issues}"))
                    }
                    Ok(()) => match tool.execute(call.input.clone(), ctx).await {
                        Ok(output) if output.is_error => {
                            ToolResult::error(call.id.clone(), output.content)
                        }
                        Ok(output) => ToolResult::success(call.id.clone(), output.content),
                        Err(e) => ToolResult::error(call.id.clone(), format!("Error: {e}")),
                    },
                },
            };
            result.content = truncate_head_tail(result.content);

            let result = hooks.tool_end(call, result, tool_started.elapsed()).await?;
            messages.push(Message::tool_result(result));
        }

        hooks.turn_end(messages).await?;
    }
}

/// Keep the first 24k and last 6k characters of an over-long result, with a
/// marker noting how many characters were dropped relative to the 30k kept.
fn truncate_head_tail(content: String) -> String {
    let total = content.chars().count();
    if total <= TRUNCATE_LIMIT {
        return content;
    }
    let omitted = total - (HEAD_CHARS + TAIL_CHARS);
    let head_end = content
        .char_indices()
        .nth(HEAD_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    let tail_start = content
        .char_indices()
        .rev()
        .nth(TAIL_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!(
        "{}\n... [{omitted} chars truncated] ...\n{}",
        &content[..head_end],
        &content[tail_start..]
    )
}
