//! Project-wide constants.

use std::time::Duration;

/// Directory holding per-request artifacts written by the object detector.
pub const PROCESSED_DIR: &str = "processed";

/// Directory holding JSON written by the generic disease detector.
pub const RESULTS_DIR: &str = "results";

/// The well-known results file shared by every generic detection in shared mode.
pub const RESULTS_FILE: &str = "results.json";

/// Prefix for object detection artifacts: `processed_<basename>`.
pub const PROCESSED_PREFIX: &str = "processed_";

/// Interpreter the detection scripts are run with unless configured otherwise.
pub const DEFAULT_INTERPRETER: &str = "python";

pub const DEFAULT_GENERIC_SCRIPT: &str = "model.py";
pub const DEFAULT_OBJECTS_SCRIPT: &str = "models/object_detection.py";
pub const DEFAULT_SKIN_DISEASE_SCRIPT: &str = "models/skin_disease_detection.py";

/// Maximum stderr bytes kept on an execution failure. Anything beyond this is truncated.
pub const MAX_STDERR_BYTES: usize = 4_000;

/// Convert a `timeout_secs` config value to a deadline. Zero means unbounded.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Generate a request identifier: 128 random bits, lowercase hex.
pub fn request_id() -> String {
    use rand::RngExt;

    let id: u128 = rand::rng().random();
    format!("{id:032x}")
}
