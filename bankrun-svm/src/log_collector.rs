use base64::{engine::general_purpose::STANDARD, Engine};
use itertools::Itertools;
use solana_sdk::{instruction::InstructionError, pubkey::Pubkey};

/// Log volume a single transaction may produce
pub const LOG_MESSAGES_BYTES_LIMIT: usize = 10 * 1000;

const LOG_TRUNCATED: &str = "Log truncated";

// -----------------
// LogCollector
// -----------------
#[derive(Debug, Clone)]
pub struct LogCollector {
    messages: Vec<String>,
    bytes_written: usize,
    bytes_limit: Option<usize>,
    limit_warning: bool,
}

impl Default for LogCollector {
    fn default() -> Self {
        Self::new(Some(LOG_MESSAGES_BYTES_LIMIT))
    }
}

impl LogCollector {
    pub fn new(bytes_limit: Option<usize>) -> Self {
        Self {
            messages: Vec::new(),
            bytes_written: 0,
            bytes_limit,
            limit_warning: false,
        }
    }

    pub fn log(&mut self, message: &str) {
        let Some(limit) = self.bytes_limit else {
            self.messages.push(message.to_string());
            return;
        };

        let bytes_written = self.bytes_written.saturating_add(message.len());
        if bytes_written >= limit {
            if !self.limit_warning {
                self.limit_warning = true;
                self.messages.push(LOG_TRUNCATED.to_string());
            }
        } else {
            self.bytes_written = bytes_written;
            self.messages.push(message.to_string());
        }
    }

    pub fn get_recorded_content(&self) -> &[String] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

/// Logs a formatted message through an [crate::InvokeContext] as is.
#[macro_export]
macro_rules! ic_msg {
    ($invoke_context:expr, $($arg:tt)*) => {
        $invoke_context.msg(&format!($($arg)*))
    };
}

// -----------------
// Stable Log Messages
// -----------------
// Downstream tooling parses these, the format must not change.

/// `Program <address> invoke [<depth>]`
pub fn program_invoke(
    logger: &mut LogCollector,
    program_id: &Pubkey,
    invoke_depth: usize,
) {
    logger.log(&format!("Program {program_id} invoke [{invoke_depth}]"));
}

/// `Program log: <program-generated output>`
pub fn program_log(logger: &mut LogCollector, message: &str) {
    logger.log(&format!("Program log: {message}"));
}

/// `Program data: <binary-data-in-base64>*`
pub fn program_data(logger: &mut LogCollector, data: &[&[u8]]) {
    logger.log(&format!(
        "Program data: {}",
        data.iter().map(|chunk| STANDARD.encode(chunk)).join(" ")
    ));
}

/// `Program return: <program-id> <program-generated-data-in-base64>`
pub fn program_return(
    logger: &mut LogCollector,
    program_id: &Pubkey,
    data: &[u8],
) {
    logger.log(&format!(
        "Program return: {program_id} {}",
        STANDARD.encode(data)
    ));
}

/// `Program <address> consumed <consumed> of <remaining> compute units`
pub fn program_consumed(
    logger: &mut LogCollector,
    program_id: &Pubkey,
    consumed: u64,
    remaining: u64,
) {
    logger.log(&format!(
        "Program {program_id} consumed {consumed} of {remaining} compute units"
    ));
}

/// `Program <address> success`
pub fn program_success(logger: &mut LogCollector, program_id: &Pubkey) {
    logger.log(&format!("Program {program_id} success"));
}

/// `Program <address> failed: <program error details>`
pub fn program_failure(
    logger: &mut LogCollector,
    program_id: &Pubkey,
    err: &InstructionError,
) {
    logger.log(&format!("Program {program_id} failed: {err}"));
}
