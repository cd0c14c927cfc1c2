//! # ir-stateright
//!
//! Stateright model of the refinement run lifecycle.
//!
//! The model drives [`ir_core::RunMachine`] directly, so the transition table
//! checked here is the one the orchestrator executes. Several callers race
//! for the single in-flight slot; every interleaving of invocations, service
//! outcomes and verdicts is explored.

pub mod run_model;

pub use run_model::{Caller, CallerId, RunAction, RunModel, RunModelState};
