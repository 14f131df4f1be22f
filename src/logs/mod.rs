//! Log parser module
//!
//! Rebuilds the per-program invocation tree from runtime log lines.

pub mod line;
pub mod tree;

pub use line::{classify, LogLine};
pub use tree::{contexts_for_instruction, failed_instructions, parse_logs, LogInvocationContext};
