//! Three-address code generation.
//!
//! The TAC emitter is diagnostic only: the evaluator in [`crate::runtime`]
//! never reads its output. It exists so embedders can display a linear,
//! register-machine-shaped view of a program for teaching purposes.

pub mod tac;

pub use tac::{Instruction, Opcode, TacEmitter, TacProgram};
