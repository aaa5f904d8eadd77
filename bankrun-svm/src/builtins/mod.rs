use std::sync::Arc;

use solana_sdk::{compute_budget, pubkey::Pubkey, system_program};

use crate::program::Program;

pub mod compute_budget_program;
pub mod system_program_processor;

pub use compute_budget_program::ComputeBudgetProgram;
pub use system_program_processor::SystemProgram;

/// A builtin program that is available in every bank
pub struct BuiltinPrototype {
    pub program_id: Pubkey,
    pub name: &'static str,
    pub entrypoint: fn() -> Arc<dyn Program>,
}

pub static BUILTINS: &[BuiltinPrototype] = &[
    BuiltinPrototype {
        program_id: system_program::ID,
        name: "system_program",
        entrypoint: system_program_entrypoint,
    },
    BuiltinPrototype {
        program_id: compute_budget::ID,
        name: "compute_budget_program",
        entrypoint: compute_budget_entrypoint,
    },
];

fn system_program_entrypoint() -> Arc<dyn Program> {
    Arc::new(SystemProgram)
}

fn compute_budget_entrypoint() -> Arc<dyn Program> {
    Arc::new(ComputeBudgetProgram)
}
