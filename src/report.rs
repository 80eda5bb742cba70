//! One JSON line per detection, as printed by the `detect` command.

use serde_json::{Value, json};

use crate::error::Result;
use crate::task::{DetectionRequest, DetectionResult};

/// The line for one finished request: the detector's JSON on success,
/// `{"error", "kind", "image"}` on failure.
pub fn outcome_line(request: &DetectionRequest, outcome: &Result<DetectionResult>) -> Value {
    match outcome {
        Ok(result) => result.to_json(),
        Err(e) => json!({
            "error": e.reason(),
            "kind": e.kind(),
            "image": request.image_path.to_string_lossy(),
        }),
    }
}
