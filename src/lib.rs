#![allow(clippy::too_many_arguments)]
// src/lib.rs

pub mod blockchain;
pub mod cli;
pub mod core;
pub mod harness;
pub mod ops;
