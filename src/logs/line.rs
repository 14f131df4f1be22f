//! Runtime log line classification
//!
//! Every line the Solana runtime emits matches exactly one [`LogLine`] form.

/// Classified log line borrowing from the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLine<'a> {
    Truncated,
    Invoke { program: &'a str, level: usize },
    Success { program: &'a str },
    Failed { program: &'a str, error: &'a str },
    FailedToComplete { error: &'a str },
    Log { message: &'a str },
    Data { data: &'a str },
    Consumed { program: &'a str },
    Return { program: &'a str, data: &'a str },
    InsufficientLamports,
    Consumption,
}

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[inline]
fn is_program_id(s: &str) -> bool {
    (32..=44).contains(&s.len()) && s.bytes().all(|b| BASE58_ALPHABET.contains(&b))
}

pub fn classify(line: &str) -> Option<LogLine<'_>> {
    if line == "Log truncated" {
        return Some(LogLine::Truncated);
    }
    if let Some(message) = line.strip_prefix("Program log: ") {
        return Some(LogLine::Log { message });
    }
    if let Some(data) = line.strip_prefix("Program data: ") {
        return Some(LogLine::Data { data });
    }
    if let Some(rest) = line.strip_prefix("Program return: ") {
        let (program, data) = rest.split_once(' ')?;
        return is_program_id(program).then_some(LogLine::Return { program, data });
    }
    if let Some(error) = line.strip_prefix("Program failed to complete: ") {
        return Some(LogLine::FailedToComplete { error });
    }
    if let Some(rest) = line.strip_prefix("Program consumption: ") {
        return rest.ends_with(" units remaining").then_some(LogLine::Consumption);
    }
    if line.starts_with("Transfer: insufficient lamports") {
        return Some(LogLine::InsufficientLamports);
    }

    let rest = line.strip_prefix("Program ")?;
    let (program, tail) = rest.split_once(' ')?;
    if !is_program_id(program) {
        return None;
    }
    if tail == "success" {
        return Some(LogLine::Success { program });
    }
    if let Some(error) = tail.strip_prefix("failed: ") {
        return Some(LogLine::Failed { program, error });
    }
    if let Some(level) = tail.strip_prefix("invoke [").and_then(|t| t.strip_suffix(']')) {
        return level.parse().ok().map(|level| LogLine::Invoke { program, level });
    }
    if tail.starts_with("consumed ") && tail.ends_with(" compute units") {
        return Some(LogLine::Consumed { program });
    }
    None
}
