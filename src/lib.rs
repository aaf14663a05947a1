// Library surface shared by the timer, the converter and integration tests.
// Terminal drawing stays in the binary.
pub mod app_dirs;
pub mod config;
pub mod convert;
pub mod cstimer;
pub mod error;
pub mod export;
pub mod runtime;
pub mod scramble;
pub mod session;
pub mod solve;
pub mod stats;
pub mod store;
pub mod timer;
pub mod util;

pub use error::{CubeError, Result};
