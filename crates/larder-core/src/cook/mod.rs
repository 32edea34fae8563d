//! Consumption engine: the atomic "cook" operation.

pub mod engine;


pub use engine::{ConsumptionEngine, CookError, CookPhase, CookReceipt};
