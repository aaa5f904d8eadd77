use bankrun_svm::compute_budget::ComputeBudgetLimits;
use solana_sdk::{fee_calculator::FeeRateGovernor, message::Message};

/// Fee a transaction pays, split by what it is charged for
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeeDetails {
    pub signature_fee: u64,
    pub prioritization_fee: u64,
}

impl FeeDetails {
    pub fn total_fee(&self) -> u64 {
        self.signature_fee.saturating_add(self.prioritization_fee)
    }
}

pub fn calculate_signature_fee(
    signature_count: u64,
    governor: &FeeRateGovernor,
) -> u64 {
    signature_count.saturating_mul(governor.lamports_per_signature)
}

/// Fee of a message given the signature rate of its blockhash and its
/// sanitized compute budget
pub fn calculate_fee_details(
    message: &Message,
    lamports_per_signature: u64,
    compute_budget: &ComputeBudgetLimits,
) -> FeeDetails {
    let signature_count = u64::from(message.header.num_required_signatures);
    FeeDetails {
        signature_fee: calculate_signature_fee(
            signature_count,
            &FeeRateGovernor {
                lamports_per_signature,
                ..FeeRateGovernor::default()
            },
        ),
        prioritization_fee: compute_budget.prioritization_fee(),
    }
}

/// Rate the bank charges per signature.
/// An explicit override wins, otherwise a governor without a rate derives
/// one the way a fresh cluster does.
pub fn derive_fee_rate_governor(
    genesis_governor: &FeeRateGovernor,
    lamports_per_signature: Option<u64>,
) -> FeeRateGovernor {
    let mut governor = if genesis_governor.lamports_per_signature == 0 {
        FeeRateGovernor::new_derived(genesis_governor, 0)
    } else {
        genesis_governor.clone()
    };
    if let Some(lamports_per_signature) = lamports_per_signature {
        governor.lamports_per_signature = lamports_per_signature;
    }
    governor
}

#[cfg(test)]
mod tests {
    use solana_sdk::{
        compute_budget::ComputeBudgetInstruction, hash::Hash,
        pubkey::Pubkey, signature::Keypair, signer::Signer,
        system_instruction,
    };
    use test_case::test_case;

    use super::*;

    #[test_case(1, 5000, 5000 ; "one signature")]
    #[test_case(3, 5000, 15_000 ; "three signatures")]
    #[test_case(2, 0, 0 ; "free")]
    fn test_calculate_signature_fee(
        signature_count: u64,
        lamports_per_signature: u64,
        expected: u64,
    ) {
        let governor = FeeRateGovernor {
            lamports_per_signature,
            ..FeeRateGovernor::default()
        };
        assert_eq!(
            calculate_signature_fee(signature_count, &governor),
            expected
        );
    }

    #[test]
    fn test_derive_fee_rate_governor() {
        let genesis = FeeRateGovernor::default();
        assert_eq!(genesis.lamports_per_signature, 0);
        assert_eq!(
            derive_fee_rate_governor(&genesis, None).lamports_per_signature,
            5000
        );
        assert_eq!(
            derive_fee_rate_governor(&genesis, Some(42)).lamports_per_signature,
            42
        );

        let explicit = FeeRateGovernor::new(10_000, 0);
        assert_eq!(
            derive_fee_rate_governor(&explicit, None).lamports_per_signature,
            10_000
        );
    }

    #[test]
    fn test_fee_details_with_priority() {
        let payer = Keypair::new();
        let message = Message::new_with_blockhash(
            &[
                ComputeBudgetInstruction::set_compute_unit_limit(200_000),
                ComputeBudgetInstruction::set_compute_unit_price(1_500),
                system_instruction::transfer(
                    &payer.pubkey(),
                    &Pubkey::new_unique(),
                    1,
                ),
            ],
            Some(&payer.pubkey()),
            &Hash::new_unique(),
        );
        let compute_budget = ComputeBudgetLimits {
            compute_unit_limit: 200_000,
            compute_unit_price: 1_500,
        };
        let details = calculate_fee_details(&message, 5000, &compute_budget);
        assert_eq!(details.signature_fee, 5000);
        // 1_500 * 200_000 / 1_000_000
        assert_eq!(details.prioritization_fee, 300);
        assert_eq!(details.total_fee(), 5300);
    }
}
