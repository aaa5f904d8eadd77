pub mod account_rules;
pub mod builtins;
pub mod compute_budget;
pub mod invoke_context;
pub mod log_collector;
pub mod program;
pub mod runtime_transaction;
pub mod sysvar_cache;
pub mod transaction_processor;

pub use invoke_context::{InstructionAccount, InvokeContext};
pub use program::{Program, ProgramRegistry};
pub use runtime_transaction::RuntimeTransaction;
pub use sysvar_cache::SysvarCache;
pub use transaction_processor::{ExecutionOutcome, TransactionProcessor};

/// Compute units charged for every invocation of a builtin program
pub const DEFAULT_BUILTIN_COMPUTE_UNITS: u64 = 150;

/// Largest data size an account can have
pub const MAX_PERMITTED_DATA_LENGTH: u64 = 10 * 1024 * 1024;
