//! Invocation tree reconstruction from transaction logs
//!
//! The runtime prints a flat log; nesting is recovered with an explicit call
//! stack. Each `invoke` opens a [`LogInvocationContext`], `success` and
//! `failed:` close it. A `failed:` line records the error on the frame before
//! unwinding it, so every frame on a failing path carries an error.

use std::collections::HashSet;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use super::line::{classify, LogLine};
use crate::core::LogParseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInvocationContext {
    /// Position in invocation order, unique within the transaction.
    pub id: usize,
    pub program_id: String,
    /// 1 for top-level instructions.
    pub depth: usize,
    /// Top-level instruction this invocation belongs to.
    pub instruction_index: usize,
    pub log_messages: Vec<String>,
    pub data_logs: Vec<String>,
    pub raw_logs: Vec<String>,
    pub errors: Vec<String>,
    pub invoke_result: Option<String>,
    pub truncated: bool,
}

impl LogInvocationContext {
    fn new(id: usize, program_id: &str, depth: usize, instruction_index: usize) -> Self {
        Self {
            id,
            program_id: program_id.to_string(),
            depth,
            instruction_index,
            log_messages: Vec::new(),
            data_logs: Vec::new(),
            raw_logs: Vec::new(),
            errors: Vec::new(),
            invoke_result: None,
            truncated: false,
        }
    }

    pub fn failed(&self) -> bool {
        !self.errors.is_empty()
    }

    /// `Program data:` payloads decoded from base64; undecodable entries are skipped.
    pub fn decoded_data(&self) -> Vec<Vec<u8>> {
        self.data_logs
            .iter()
            .filter_map(|d| general_purpose::STANDARD.decode(d.trim()).ok())
            .collect()
    }
}

struct CallStack {
    frames: Vec<usize>,
}

impl CallStack {
    fn top(&self, line: usize) -> Result<usize, LogParseError> {
        self.frames.last().copied().ok_or(LogParseError::EmptyCallStack { line })
    }
}

fn expect_program(
    contexts: &[LogInvocationContext],
    id: usize,
    program: &str,
    line: usize,
) -> Result<(), LogParseError> {
    let found = &contexts[id].program_id;
    if found != program {
        return Err(LogParseError::CallStackMismatch {
            line,
            expected: program.to_string(),
            found: found.clone(),
        });
    }
    Ok(())
}

/// Rebuild per-invocation contexts from a transaction's log messages.
pub fn parse_logs(logs: &[String]) -> Result<Vec<LogInvocationContext>, LogParseError> {
    let mut contexts: Vec<LogInvocationContext> = Vec::new();
    let mut stack = CallStack { frames: Vec::new() };
    let mut instruction_index = 0usize;

    for (line_no, raw) in logs.iter().enumerate() {
        let parsed = classify(raw).ok_or_else(|| LogParseError::UnrecognizedLine {
            line: line_no,
            text: raw.clone(),
        })?;

        match parsed {
            LogLine::Invoke { program, level } => {
                let depth = stack.frames.len() + 1;
                if level != depth {
                    return Err(LogParseError::DepthMismatch { line: line_no, expected: depth, found: level });
                }
                let id = contexts.len();
                let mut ctx = LogInvocationContext::new(id, program, depth, instruction_index);
                ctx.raw_logs.push(raw.clone());
                contexts.push(ctx);
                stack.frames.push(id);
            }
            LogLine::Success { program } => {
                let id = stack.top(line_no)?;
                expect_program(&contexts, id, program, line_no)?;
                contexts[id].raw_logs.push(raw.clone());
                stack.frames.pop();
                if stack.frames.is_empty() {
                    instruction_index += 1;
                }
            }
            LogLine::Failed { program, error } => {
                // the frame is closed here; a failure line ends its invocation
                let id = stack.top(line_no)?;
                expect_program(&contexts, id, program, line_no)?;
                let ctx = &mut contexts[id];
                ctx.errors.push(error.to_string());
                ctx.raw_logs.push(raw.clone());
                stack.frames.pop();
                if stack.frames.is_empty() {
                    instruction_index += 1;
                }
            }
            LogLine::FailedToComplete { error } => {
                let id = stack.top(line_no)?;
                let ctx = &mut contexts[id];
                ctx.errors.push(error.to_string());
                ctx.raw_logs.push(raw.clone());
            }
            LogLine::Log { message } => {
                let id = stack.top(line_no)?;
                let ctx = &mut contexts[id];
                ctx.log_messages.push(message.to_string());
                ctx.raw_logs.push(raw.clone());
            }
            LogLine::Data { data } => {
                let id = stack.top(line_no)?;
                let ctx = &mut contexts[id];
                ctx.data_logs.push(data.to_string());
                ctx.raw_logs.push(raw.clone());
            }
            LogLine::Return { program, data } => {
                let id = stack.top(line_no)?;
                expect_program(&contexts, id, program, line_no)?;
                let ctx = &mut contexts[id];
                ctx.invoke_result = Some(data.to_string());
                ctx.raw_logs.push(raw.clone());
            }
            LogLine::Consumed { .. } | LogLine::InsufficientLamports | LogLine::Consumption => {
                let id = stack.top(line_no)?;
                contexts[id].raw_logs.push(raw.clone());
            }
            LogLine::Truncated => {
                // the runtime stops logging here; nothing after it is reliable
                if let Some(&id) = stack.frames.last() {
                    contexts[id].truncated = true;
                    contexts[id].raw_logs.push(raw.clone());
                }
                break;
            }
        }
    }

    Ok(contexts)
}

/// Top-level instruction indices whose invocation tree recorded an error.
pub fn failed_instructions(contexts: &[LogInvocationContext]) -> HashSet<usize> {
    contexts
        .iter()
        .filter(|c| c.failed())
        .map(|c| c.instruction_index)
        .collect()
}

/// Contexts belonging to one top-level instruction, in invocation order.
pub fn contexts_for_instruction(
    contexts: &[LogInvocationContext],
    instruction_index: usize,
) -> impl Iterator<Item = &LogInvocationContext> {
    contexts.iter().filter(move |c| c.instruction_index == instruction_index)
}
