pub mod broadcast;
pub mod clock;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod io;
pub mod notify;
pub mod obs;
pub mod paths;
pub mod process;
pub mod production;
pub mod status;
pub mod telegram;
pub mod timeline;
pub mod watchdog;
pub mod worker;
pub mod youtube;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{CastkeeperError, Result};
