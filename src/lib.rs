#![allow(non_snake_case)]
pub mod config;
pub mod consistency;
pub mod error;
pub mod filter;
pub mod history;
pub mod plotting;
pub mod pose;
pub mod simulator;
pub mod state_estimator;

pub use error::EkfError;
pub use filter::{PoseFilter, StepOutcome};
