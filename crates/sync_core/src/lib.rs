//! Synchronized colour cycle over every registered vendor adapter.

pub mod controller;
pub mod jitter;
pub mod progression;
pub mod scheduler;
pub mod ticker;

pub use controller::{
    AdapterSummary, ControllerBuilder, ControllerSettings, ControllerStatus, LightController,
};
pub use jitter::{FixedJitter, JitterSource, RandomJitter};
pub use progression::HueProgression;
pub use scheduler::{CycleScheduler, TickReport};
pub use ticker::{IntervalTicker, Ticker};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
