//! Operator commands around the test suite.

pub mod balances;
pub mod deploy;
pub mod track;
