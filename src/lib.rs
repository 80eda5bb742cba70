pub mod bridge;
pub mod cancel;
pub mod config;
pub mod consts;
pub mod error;
pub mod layout;
pub mod logging;
pub mod report;
pub mod runner;
pub mod task;

pub use bridge::DetectionBridge;
pub use error::{DetectionError, ErrorKind, Result};
pub use task::{DetectionRequest, DetectionResult, TaskKind};
