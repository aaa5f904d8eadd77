mod bank;
pub mod programs;
pub mod transactions;
