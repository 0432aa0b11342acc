pub mod bus;
pub mod cli;
pub mod format;
pub mod isa;
pub mod labels;
pub mod monitor;

pub use bus::{Bus, MemBus};
pub use monitor::Monitor;
