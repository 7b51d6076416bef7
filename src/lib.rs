//! Bicho Risk Engine - Library Root
//!
//! Stake-unit combinatorics and per-number exposure limits for jogo do
//! bicho bets. Re-exports all modules for integration tests and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
