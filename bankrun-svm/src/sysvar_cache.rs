use solana_sdk::{
    clock::Clock, epoch_schedule::EpochSchedule,
    fee_calculator::FeeRateGovernor, rent::Rent,
};

/// Sysvar values a transaction observes during its whole execution.
///
/// A cache is taken by value when a transaction starts, changes made to the
/// bank's sysvars afterwards are not visible to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SysvarCache {
    clock: Clock,
    rent: Rent,
    epoch_schedule: EpochSchedule,
    fee_rate_governor: FeeRateGovernor,
}

impl SysvarCache {
    pub fn new(
        clock: Clock,
        rent: Rent,
        epoch_schedule: EpochSchedule,
        fee_rate_governor: FeeRateGovernor,
    ) -> Self {
        Self {
            clock,
            rent,
            epoch_schedule,
            fee_rate_governor,
        }
    }

    pub fn get_clock(&self) -> &Clock {
        &self.clock
    }

    pub fn get_rent(&self) -> &Rent {
        &self.rent
    }

    pub fn get_epoch_schedule(&self) -> &EpochSchedule {
        &self.epoch_schedule
    }

    pub fn get_fee_rate_governor(&self) -> &FeeRateGovernor {
        &self.fee_rate_governor
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    pub fn set_rent(&mut self, rent: Rent) {
        self.rent = rent;
    }

    pub fn set_epoch_schedule(&mut self, epoch_schedule: EpochSchedule) {
        self.epoch_schedule = epoch_schedule;
    }

    pub fn set_fee_rate_governor(&mut self, fee_rate_governor: FeeRateGovernor) {
        self.fee_rate_governor = fee_rate_governor;
    }
}
