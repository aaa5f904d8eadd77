use std::{collections::HashMap, fmt, sync::Arc};

use solana_sdk::{
    account::{Account, AccountSharedData},
    instruction::InstructionError,
    native_loader,
    pubkey::Pubkey,
    rent::Rent,
};

use crate::invoke_context::InvokeContext;

// -----------------
// Program
// -----------------
/// Executable logic registered for a program id.
pub trait Program: Send + Sync {
    fn process_instruction(
        &self,
        invoke_context: &mut InvokeContext,
    ) -> Result<(), InstructionError>;

    /// Units charged every time the program is invoked, before it runs
    fn base_compute_units(&self) -> u64 {
        0
    }
}

impl<F> Program for F
where
    F: Fn(&mut InvokeContext) -> Result<(), InstructionError> + Send + Sync,
{
    fn process_instruction(
        &self,
        invoke_context: &mut InvokeContext,
    ) -> Result<(), InstructionError> {
        self(invoke_context)
    }
}

// -----------------
// ProgramRegistry
// -----------------
#[derive(Clone)]
pub struct RegisteredProgram {
    pub name: String,
    pub program: Arc<dyn Program>,
}

impl fmt::Debug for RegisteredProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProgram")
            .field("name", &self.name)
            .finish()
    }
}

/// Programs that can be invoked, keyed by program id.
#[derive(Debug, Clone, Default)]
pub struct ProgramRegistry {
    programs: HashMap<Pubkey, RegisteredProgram>,
}

impl ProgramRegistry {
    /// Registry containing the system and compute budget programs
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        for builtin in crate::builtins::BUILTINS {
            registry.add_program(
                builtin.program_id,
                builtin.name,
                (builtin.entrypoint)(),
            );
        }
        registry
    }

    pub fn add_program(
        &mut self,
        program_id: Pubkey,
        name: &str,
        program: Arc<dyn Program>,
    ) -> Option<RegisteredProgram> {
        self.programs.insert(
            program_id,
            RegisteredProgram {
                name: name.to_string(),
                program,
            },
        )
    }

    pub fn get(&self, program_id: &Pubkey) -> Option<Arc<dyn Program>> {
        self.programs
            .get(program_id)
            .map(|registered| registered.program.clone())
    }

    pub fn contains(&self, program_id: &Pubkey) -> bool {
        self.programs.contains_key(program_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pubkey, &RegisteredProgram)> {
        self.programs.iter()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

/// Executable account owned by the native loader that marks `name` as
/// deployed at a program id.
pub fn create_loadable_account(name: &str, rent: &Rent) -> AccountSharedData {
    let data = name.as_bytes().to_vec();
    AccountSharedData::from(Account {
        lamports: rent.minimum_balance(data.len()).max(1),
        data,
        owner: native_loader::id(),
        executable: true,
        rent_epoch: 0,
    })
}
