use std::sync::Arc;

use bankrun_accounts_db::TransactionAccounts;
use log::*;
use solana_sdk::{
    account::AccountSharedData,
    clock::Clock,
    epoch_schedule::EpochSchedule,
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    rent::Rent,
    transaction_context::TransactionReturnData,
};

use crate::{
    account_rules::{verify_lamports_balance, PreAccount},
    ic_msg,
    log_collector::{self, LogCollector},
    program::{Program, ProgramRegistry},
    sysvar_cache::SysvarCache,
};

/// Top level instruction plus at most four nested invocations
pub const MAX_INVOKE_STACK_HEIGHT: usize = 5;

/// Maximum size of the data a program may return
pub const MAX_RETURN_DATA: usize = 1024;

// -----------------
// InstructionAccount
// -----------------
/// Account of an instruction, refers to the transaction accounts by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionAccount {
    pub index_in_transaction: usize,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug)]
struct InstructionFrame {
    program_id: Pubkey,
    accounts: Vec<InstructionAccount>,
    data: Vec<u8>,
    pre_accounts: Vec<PreAccount>,
}

// -----------------
// InvokeContext
// -----------------
/// Everything a program can access while processing an instruction.
///
/// The context owns the accounts of the transaction for the duration of
/// its execution. Accounts are addressed by their index in the current
/// instruction.
pub struct InvokeContext {
    accounts: TransactionAccounts,
    programs: Arc<ProgramRegistry>,
    sysvars: Arc<SysvarCache>,
    log_collector: LogCollector,
    compute_meter: u64,
    return_data: TransactionReturnData,
    stack: Vec<InstructionFrame>,
}

impl InvokeContext {
    pub fn new(
        accounts: TransactionAccounts,
        programs: Arc<ProgramRegistry>,
        sysvars: Arc<SysvarCache>,
        compute_unit_limit: u64,
    ) -> Self {
        Self {
            accounts,
            programs,
            sysvars,
            log_collector: LogCollector::default(),
            compute_meter: compute_unit_limit,
            return_data: TransactionReturnData::default(),
            stack: Vec::new(),
        }
    }

    /// Hands back the accounts together with the logs and return data
    /// produced while processing.
    pub fn into_parts(
        self,
    ) -> (TransactionAccounts, Vec<String>, TransactionReturnData) {
        (
            self.accounts,
            self.log_collector.into_messages(),
            self.return_data,
        )
    }

    // -----------------
    // Instruction Processing
    // -----------------
    /// Runs the program registered for `program_id` and verifies the
    /// account changes it made.
    pub fn process_instruction(
        &mut self,
        program_id: Pubkey,
        instruction_accounts: Vec<InstructionAccount>,
        data: Vec<u8>,
    ) -> Result<(), InstructionError> {
        if self.stack.len() >= MAX_INVOKE_STACK_HEIGHT {
            return Err(InstructionError::CallDepth);
        }
        // Direct recursion is fine, but a program further up the stack may
        // not be re-entered
        let contains = self
            .stack
            .iter()
            .any(|frame| frame.program_id == program_id);
        let is_last = self
            .stack
            .last()
            .map_or(false, |frame| frame.program_id == program_id);
        if contains && !is_last {
            self.msg("Cross-program invocation reentrancy not allowed");
            return Err(InstructionError::ReentrancyNotAllowed);
        }
        let program = self
            .programs
            .get(&program_id)
            .ok_or(InstructionError::UnsupportedProgramId)?;

        let pre_accounts = self.pre_accounts(&instruction_accounts)?;
        self.stack.push(InstructionFrame {
            program_id,
            accounts: instruction_accounts,
            data,
            pre_accounts,
        });
        self.return_data = TransactionReturnData {
            program_id,
            data: Vec::new(),
        };
        log_collector::program_invoke(
            &mut self.log_collector,
            &program_id,
            self.stack.len(),
        );

        let pre_remaining_units = self.compute_meter;
        let result = self.run_program(program.as_ref());
        let consumed = pre_remaining_units.saturating_sub(self.compute_meter);
        log_collector::program_consumed(
            &mut self.log_collector,
            &program_id,
            consumed,
            pre_remaining_units,
        );

        match &result {
            Ok(()) => {
                if self.return_data.program_id == program_id
                    && !self.return_data.data.is_empty()
                {
                    log_collector::program_return(
                        &mut self.log_collector,
                        &program_id,
                        &self.return_data.data,
                    );
                }
                log_collector::program_success(
                    &mut self.log_collector,
                    &program_id,
                );
            }
            Err(err) => {
                trace!("Program {program_id} failed: {err:?}");
                log_collector::program_failure(
                    &mut self.log_collector,
                    &program_id,
                    err,
                );
            }
        }
        self.stack.pop();
        result
    }

    fn run_program(
        &mut self,
        program: &dyn Program,
    ) -> Result<(), InstructionError> {
        self.consume_checked(program.base_compute_units())?;
        program.process_instruction(self)?;
        self.verify_current_instruction()
    }

    fn pre_accounts(
        &self,
        instruction_accounts: &[InstructionAccount],
    ) -> Result<Vec<PreAccount>, InstructionError> {
        let mut pre_accounts: Vec<PreAccount> =
            Vec::with_capacity(instruction_accounts.len());
        for instruction_account in instruction_accounts {
            let index = instruction_account.index_in_transaction;
            if let Some(pre) = pre_accounts
                .iter_mut()
                .find(|pre| pre.index_in_transaction == index)
            {
                pre.is_writable |= instruction_account.is_writable;
                continue;
            }
            let account = self
                .accounts
                .account(index)
                .ok_or(InstructionError::MissingAccount)?;
            pre_accounts.push(PreAccount::new(
                index,
                instruction_account.is_writable,
                account.clone(),
            ));
        }
        Ok(pre_accounts)
    }

    fn verify_current_instruction(&self) -> Result<(), InstructionError> {
        let frame = self.current_frame()?;
        let mut post_accounts = Vec::with_capacity(frame.pre_accounts.len());
        for pre in &frame.pre_accounts {
            let post = self
                .accounts
                .account(pre.index_in_transaction)
                .ok_or(InstructionError::MissingAccount)?;
            pre.verify(&frame.program_id, post)?;
            post_accounts.push(post);
        }
        verify_lamports_balance(
            frame.pre_accounts.iter().map(|pre| &pre.account),
            post_accounts.into_iter(),
        )
    }

    // -----------------
    // Cross Program Invocation
    // -----------------
    /// Invokes another program with a subset of the current instruction's
    /// accounts.
    pub fn invoke(
        &mut self,
        instruction: Instruction,
    ) -> Result<(), InstructionError> {
        self.native_invoke(instruction, &[])
    }

    /// Same as [Self::invoke], program derived addresses created from the
    /// seeds and the current program id count as signers.
    pub fn invoke_signed(
        &mut self,
        instruction: Instruction,
        signers_seeds: &[&[&[u8]]],
    ) -> Result<(), InstructionError> {
        let program_id = self.get_program_id()?;
        let signers = signers_seeds
            .iter()
            .map(|seeds| {
                Pubkey::create_program_address(seeds, &program_id)
                    .map_err(|_| InstructionError::InvalidSeeds)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.native_invoke(instruction, &signers)
    }

    fn native_invoke(
        &mut self,
        instruction: Instruction,
        signers: &[Pubkey],
    ) -> Result<(), InstructionError> {
        let caller_accounts = self.current_frame()?.accounts.clone();

        let mut instruction_accounts =
            Vec::with_capacity(instruction.accounts.len());
        for account_meta in &instruction.accounts {
            let Some(index_in_transaction) =
                self.accounts.index_of(&account_meta.pubkey)
            else {
                ic_msg!(
                    self,
                    "Instruction references an unknown account {}",
                    account_meta.pubkey
                );
                return Err(InstructionError::MissingAccount);
            };
            let Some(caller_account) = caller_accounts.iter().find(|account| {
                account.index_in_transaction == index_in_transaction
            }) else {
                ic_msg!(
                    self,
                    "Instruction references an unknown account {}",
                    account_meta.pubkey
                );
                return Err(InstructionError::MissingAccount);
            };

            // Readonly in caller cannot become writable in callee
            if account_meta.is_writable && !caller_account.is_writable {
                ic_msg!(
                    self,
                    "{}'s writable privilege escalated",
                    account_meta.pubkey
                );
                return Err(InstructionError::PrivilegeEscalation);
            }
            // To be signed in the callee, it must be either signed in the
            // caller or by the program
            if account_meta.is_signer
                && !(caller_account.is_signer
                    || signers.contains(&account_meta.pubkey))
            {
                ic_msg!(
                    self,
                    "{}'s signer privilege escalated",
                    account_meta.pubkey
                );
                return Err(InstructionError::PrivilegeEscalation);
            }
            instruction_accounts.push(InstructionAccount {
                index_in_transaction,
                is_signer: account_meta.is_signer,
                is_writable: account_meta.is_writable,
            });
        }

        if self.accounts.index_of(&instruction.program_id).is_none() {
            ic_msg!(self, "Unknown program {}", instruction.program_id);
            return Err(InstructionError::MissingAccount);
        }

        // Changes the caller made so far have to be valid before the callee
        // gets to see them
        self.verify_current_instruction()?;
        self.process_instruction(
            instruction.program_id,
            instruction_accounts,
            instruction.data,
        )?;
        self.refresh_pre_accounts()
    }

    /// The callee verified its own changes, the caller is only held
    /// accountable for what it does from here on.
    fn refresh_pre_accounts(&mut self) -> Result<(), InstructionError> {
        let frame = self
            .stack
            .last_mut()
            .ok_or(InstructionError::CallDepth)?;
        for pre in frame.pre_accounts.iter_mut() {
            pre.account = self
                .accounts
                .account(pre.index_in_transaction)
                .ok_or(InstructionError::MissingAccount)?
                .clone();
        }
        Ok(())
    }

    // -----------------
    // Instruction Accessors
    // -----------------
    fn current_frame(&self) -> Result<&InstructionFrame, InstructionError> {
        self.stack.last().ok_or(InstructionError::CallDepth)
    }

    pub fn get_stack_height(&self) -> usize {
        self.stack.len()
    }

    pub fn get_program_id(&self) -> Result<Pubkey, InstructionError> {
        Ok(self.current_frame()?.program_id)
    }

    pub fn get_instruction_data(&self) -> &[u8] {
        self.stack
            .last()
            .map(|frame| frame.data.as_slice())
            .unwrap_or_default()
    }

    pub fn get_number_of_instruction_accounts(&self) -> usize {
        self.stack
            .last()
            .map(|frame| frame.accounts.len())
            .unwrap_or_default()
    }

    pub fn check_number_of_instruction_accounts(
        &self,
        expected_at_least: usize,
    ) -> Result<(), InstructionError> {
        if self.get_number_of_instruction_accounts() < expected_at_least {
            Err(InstructionError::NotEnoughAccountKeys)
        } else {
            Ok(())
        }
    }

    pub fn get_instruction_account(
        &self,
        index_in_instruction: usize,
    ) -> Result<&InstructionAccount, InstructionError> {
        self.current_frame()?
            .accounts
            .get(index_in_instruction)
            .ok_or(InstructionError::NotEnoughAccountKeys)
    }

    pub fn get_key(
        &self,
        index_in_instruction: usize,
    ) -> Result<&Pubkey, InstructionError> {
        let index = self
            .get_instruction_account(index_in_instruction)?
            .index_in_transaction;
        self.accounts
            .key(index)
            .ok_or(InstructionError::MissingAccount)
    }

    pub fn is_signer(
        &self,
        index_in_instruction: usize,
    ) -> Result<bool, InstructionError> {
        Ok(self.get_instruction_account(index_in_instruction)?.is_signer)
    }

    pub fn is_writable(
        &self,
        index_in_instruction: usize,
    ) -> Result<bool, InstructionError> {
        Ok(self
            .get_instruction_account(index_in_instruction)?
            .is_writable)
    }

    pub fn get_account(
        &self,
        index_in_instruction: usize,
    ) -> Result<&AccountSharedData, InstructionError> {
        let index = self
            .get_instruction_account(index_in_instruction)?
            .index_in_transaction;
        self.accounts
            .account(index)
            .ok_or(InstructionError::MissingAccount)
    }

    /// Any account can be modified here, whether the modification was
    /// allowed is verified once the program returns.
    pub fn get_account_mut(
        &mut self,
        index_in_instruction: usize,
    ) -> Result<&mut AccountSharedData, InstructionError> {
        let index = self
            .get_instruction_account(index_in_instruction)?
            .index_in_transaction;
        self.accounts
            .get_mut(index)
            .map(|loaded| &mut loaded.account)
            .ok_or(InstructionError::MissingAccount)
    }

    // -----------------
    // Sysvars
    // -----------------
    pub fn get_clock(&self) -> &Clock {
        self.sysvars.get_clock()
    }

    pub fn get_rent(&self) -> &Rent {
        self.sysvars.get_rent()
    }

    pub fn get_epoch_schedule(&self) -> &EpochSchedule {
        self.sysvars.get_epoch_schedule()
    }

    // -----------------
    // Compute Meter
    // -----------------
    /// Consume compute units, fails once the meter is exhausted
    pub fn consume_checked(
        &mut self,
        amount: u64,
    ) -> Result<(), InstructionError> {
        let exceeded = self.compute_meter < amount;
        self.compute_meter = self.compute_meter.saturating_sub(amount);
        if exceeded {
            return Err(InstructionError::ComputationalBudgetExceeded);
        }
        Ok(())
    }

    pub fn get_remaining(&self) -> u64 {
        self.compute_meter
    }

    // -----------------
    // Logs and Return Data
    // -----------------
    /// Logs `Program log: <message>`
    pub fn log(&mut self, message: &str) {
        log_collector::program_log(&mut self.log_collector, message);
    }

    /// Logs `Program data: <base64>*`
    pub fn log_data(&mut self, data: &[&[u8]]) {
        log_collector::program_data(&mut self.log_collector, data);
    }

    /// Logs the message as is, used by the runtime and builtins
    pub fn msg(&mut self, message: &str) {
        self.log_collector.log(message);
    }

    pub fn get_log_messages(&self) -> &[String] {
        self.log_collector.get_recorded_content()
    }

    pub fn set_return_data(
        &mut self,
        data: Vec<u8>,
    ) -> Result<(), InstructionError> {
        if data.len() > MAX_RETURN_DATA {
            ic_msg!(
                self,
                "Return data too large ({} > {MAX_RETURN_DATA})",
                data.len()
            );
            return Err(InstructionError::InvalidArgument);
        }
        let program_id = self.get_program_id()?;
        self.return_data = TransactionReturnData { program_id, data };
        Ok(())
    }

    pub fn get_return_data(&self) -> (&Pubkey, &[u8]) {
        (&self.return_data.program_id, &self.return_data.data)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bankrun_accounts_db::LoadedAccount;
    use solana_sdk::{
        account::{ReadableAccount, WritableAccount},
        instruction::AccountMeta,
        system_instruction, system_program,
    };

    use super::*;
    use crate::program::create_loadable_account;

    struct Fixture {
        context: InvokeContext,
        payer: Pubkey,
        recipient: Pubkey,
    }

    fn loaded(
        key: Pubkey,
        account: AccountSharedData,
        is_writable: bool,
    ) -> LoadedAccount {
        LoadedAccount {
            key,
            account,
            is_writable,
            existed: true,
            touched: false,
        }
    }

    fn fixture(programs: ProgramRegistry, compute_units: u64) -> Fixture {
        fixture_with_accounts(programs, compute_units, vec![])
    }

    /// Payer and recipient come first, followed by `extra_accounts`
    fn fixture_with_accounts(
        programs: ProgramRegistry,
        compute_units: u64,
        extra_accounts: Vec<LoadedAccount>,
    ) -> Fixture {
        let payer = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let mut accounts = vec![
            loaded(
                payer,
                AccountSharedData::new(1_000, 0, &system_program::id()),
                true,
            ),
            loaded(
                recipient,
                AccountSharedData::new(0, 0, &system_program::id()),
                true,
            ),
        ];
        accounts.extend(extra_accounts);
        for (program_id, registered) in programs.iter() {
            accounts.push(loaded(
                *program_id,
                create_loadable_account(&registered.name, &Rent::default()),
                false,
            ));
        }
        Fixture {
            context: InvokeContext::new(
                TransactionAccounts::new(accounts),
                Arc::new(programs),
                Arc::new(SysvarCache::default()),
                compute_units,
            ),
            payer,
            recipient,
        }
    }

    fn top_level_accounts() -> Vec<InstructionAccount> {
        vec![
            InstructionAccount {
                index_in_transaction: 0,
                is_signer: true,
                is_writable: true,
            },
            InstructionAccount {
                index_in_transaction: 1,
                is_signer: false,
                is_writable: true,
            },
        ]
    }

    #[test]
    fn test_lamports_minted_out_of_thin_air() {
        let program_id = Pubkey::new_unique();
        let mut programs = ProgramRegistry::default();
        programs.add_program(
            program_id,
            "minter",
            Arc::new(
                |ic: &mut InvokeContext| -> Result<(), InstructionError> {
                    let account = ic.get_account_mut(1)?;
                    account.set_lamports(account.lamports() + 1);
                    Ok(())
                },
            ),
        );
        let Fixture { mut context, .. } = fixture(programs, 10_000);
        assert_matches!(
            context.process_instruction(
                program_id,
                top_level_accounts(),
                vec![]
            ),
            Err(InstructionError::UnbalancedInstruction)
        );
    }

    #[test]
    fn test_compute_meter_exhaustion() {
        let program_id = Pubkey::new_unique();
        let mut programs = ProgramRegistry::default();
        programs.add_program(
            program_id,
            "burner",
            Arc::new(
                |ic: &mut InvokeContext| -> Result<(), InstructionError> {
                    ic.consume_checked(600)
                },
            ),
        );
        let Fixture { mut context, .. } = fixture(programs, 1_000);
        assert!(context
            .process_instruction(program_id, top_level_accounts(), vec![])
            .is_ok());
        assert_eq!(context.get_remaining(), 400);
        assert_matches!(
            context.process_instruction(
                program_id,
                top_level_accounts(),
                vec![]
            ),
            Err(InstructionError::ComputationalBudgetExceeded)
        );
        assert_eq!(context.get_remaining(), 0);

        let logs = context.get_log_messages();
        assert_eq!(
            logs.last().unwrap(),
            &format!(
                "Program {program_id} failed: Computational budget exceeded"
            )
        );
    }

    #[test]
    fn test_return_data() {
        let program_id = Pubkey::new_unique();
        let mut programs = ProgramRegistry::default();
        programs.add_program(
            program_id,
            "returner",
            Arc::new(
                |ic: &mut InvokeContext| -> Result<(), InstructionError> {
                    ic.log("returning");
                    ic.set_return_data(vec![7; 3])
                },
            ),
        );
        let Fixture { mut context, .. } = fixture(programs, 1_000);
        context
            .process_instruction(program_id, top_level_accounts(), vec![])
            .unwrap();

        let (_, logs, return_data) = context.into_parts();
        assert_eq!(return_data.program_id, program_id);
        assert_eq!(return_data.data, vec![7; 3]);
        assert_eq!(
            logs,
            vec![
                format!("Program {program_id} invoke [1]"),
                "Program log: returning".to_string(),
                format!(
                    "Program {program_id} consumed 0 of 1000 compute units"
                ),
                format!("Program return: {program_id} BwcH"),
                format!("Program {program_id} success"),
            ]
        );
    }

    #[test]
    fn test_return_data_too_large() {
        let program_id = Pubkey::new_unique();
        let mut programs = ProgramRegistry::default();
        programs.add_program(
            program_id,
            "returner",
            Arc::new(
                |ic: &mut InvokeContext| -> Result<(), InstructionError> {
                    ic.set_return_data(vec![0; MAX_RETURN_DATA + 1])
                },
            ),
        );
        let Fixture { mut context, .. } = fixture(programs, 1_000);
        assert_matches!(
            context.process_instruction(
                program_id,
                top_level_accounts(),
                vec![]
            ),
            Err(InstructionError::InvalidArgument)
        );
    }

    #[test]
    fn test_cpi_transfer_with_signer_privilege() {
        let program_id = Pubkey::new_unique();
        let mut programs = ProgramRegistry::with_builtins();
        programs.add_program(
            program_id,
            "forwarder",
            Arc::new(
                |ic: &mut InvokeContext| -> Result<(), InstructionError> {
                    let from = *ic.get_key(0)?;
                    let to = *ic.get_key(1)?;
                    ic.invoke(system_instruction::transfer(&from, &to, 100))
                },
            ),
        );
        let Fixture {
            mut context,
            payer,
            recipient,
        } = fixture(programs, 10_000);
        context
            .process_instruction(program_id, top_level_accounts(), vec![])
            .unwrap();

        let (accounts, logs, _) = context.into_parts();
        let payer_idx = accounts.index_of(&payer).unwrap();
        let recipient_idx = accounts.index_of(&recipient).unwrap();
        assert_eq!(accounts.account(payer_idx).unwrap().lamports(), 900);
        assert_eq!(accounts.account(recipient_idx).unwrap().lamports(), 100);
        assert!(logs.contains(&format!(
            "Program {} invoke [2]",
            system_program::id()
        )));
    }

    #[test]
    fn test_cpi_invoke_signed_with_program_address() {
        let program_id = Pubkey::new_unique();
        let (vault, bump) =
            Pubkey::find_program_address(&[b"vault"], &program_id);
        let mut programs = ProgramRegistry::with_builtins();
        programs.add_program(
            program_id,
            "vault",
            Arc::new(
                move |ic: &mut InvokeContext| -> Result<(), InstructionError> {
                    let vault = *ic.get_key(2)?;
                    let to = *ic.get_key(1)?;
                    let transfer =
                        system_instruction::transfer(&vault, &to, 200);
                    if ic.get_instruction_data().is_empty() {
                        ic.invoke(transfer)
                    } else {
                        ic.invoke_signed(transfer, &[&[b"vault", &[bump]]])
                    }
                },
            ),
        );
        let Fixture {
            mut context,
            recipient,
            ..
        } = fixture_with_accounts(
            programs,
            10_000,
            vec![loaded(
                vault,
                AccountSharedData::new(500, 0, &system_program::id()),
                true,
            )],
        );
        let vault_idx = 2;
        let mut instruction_accounts = top_level_accounts();
        instruction_accounts.push(InstructionAccount {
            index_in_transaction: vault_idx,
            is_signer: false,
            is_writable: true,
        });

        // without the seeds the vault can't sign
        assert_matches!(
            context.process_instruction(
                program_id,
                instruction_accounts.clone(),
                vec![]
            ),
            Err(InstructionError::PrivilegeEscalation)
        );
        context
            .process_instruction(program_id, instruction_accounts, vec![1])
            .unwrap();

        let (accounts, _, _) = context.into_parts();
        let recipient_idx = accounts.index_of(&recipient).unwrap();
        assert_eq!(accounts.account(vault_idx).unwrap().lamports(), 300);
        assert_eq!(accounts.account(recipient_idx).unwrap().lamports(), 200);
    }

    #[test]
    fn test_cpi_reads_callee_return_data() {
        let caller_id = Pubkey::new_unique();
        let returner_id = Pubkey::new_unique();
        let mut programs = ProgramRegistry::default();
        programs.add_program(
            returner_id,
            "returner",
            Arc::new(
                |ic: &mut InvokeContext| -> Result<(), InstructionError> {
                    ic.set_return_data(vec![7; 3])
                },
            ),
        );
        programs.add_program(
            caller_id,
            "caller",
            Arc::new(
                move |ic: &mut InvokeContext| -> Result<(), InstructionError> {
                    ic.invoke(Instruction::new_with_bytes(
                        returner_id,
                        &[],
                        vec![],
                    ))?;
                    let (program_id, data) = ic.get_return_data();
                    if program_id != &returner_id {
                        return Err(InstructionError::InvalidArgument);
                    }
                    let doubled = data.iter().map(|b| b * 2).collect();
                    ic.set_return_data(doubled)
                },
            ),
        );
        let Fixture { mut context, .. } = fixture(programs, 1_000);
        context
            .process_instruction(caller_id, top_level_accounts(), vec![])
            .unwrap();

        let (_, _, return_data) = context.into_parts();
        assert_eq!(return_data.program_id, caller_id);
        assert_eq!(return_data.data, vec![14; 3]);
    }

    #[test]
    fn test_cpi_signer_privilege_escalation() {
        let program_id = Pubkey::new_unique();
        let mut programs = ProgramRegistry::with_builtins();
        programs.add_program(
            program_id,
            "escalator",
            Arc::new(
                |ic: &mut InvokeContext| -> Result<(), InstructionError> {
                    let from = *ic.get_key(1)?;
                    let to = *ic.get_key(0)?;
                    ic.invoke(Instruction::new_with_bincode(
                        system_program::id(),
                        &system_instruction::SystemInstruction::Transfer {
                            lamports: 1,
                        },
                        vec![
                            AccountMeta::new(from, true),
                            AccountMeta::new(to, false),
                        ],
                    ))
                },
            ),
        );
        let Fixture { mut context, .. } = fixture(programs, 10_000);
        assert_matches!(
            context.process_instruction(
                program_id,
                top_level_accounts(),
                vec![]
            ),
            Err(InstructionError::PrivilegeEscalation)
        );
    }

    #[test]
    fn test_unknown_program() {
        let Fixture { mut context, .. } =
            fixture(ProgramRegistry::default(), 1_000);
        assert_matches!(
            context.process_instruction(
                Pubkey::new_unique(),
                top_level_accounts(),
                vec![]
            ),
            Err(InstructionError::UnsupportedProgramId)
        );
    }
}
