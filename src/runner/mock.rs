use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Invocation, RunOutput, Runner};
use crate::error::{DetectionError, Result};

/// A scripted runner for tests. Returns pre-defined outputs in order and
/// records every invocation it was given.
pub struct MockRunner {
    outputs: Vec<RunOutput>,
    index: AtomicUsize,
    calls: Mutex<Vec<Invocation>>,
}

impl MockRunner {
    pub fn new(outputs: Vec<RunOutput>) -> Self {
        Self {
            outputs,
            index: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A runner whose single run exits 0 with the given stdout.
    pub fn succeeding(stdout: &str) -> Self {
        Self::new(vec![RunOutput {
            exit_code: Some(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }])
    }

    /// A runner whose single run exits with `code` and the given stderr.
    pub fn failing(code: i32, stderr: &str) -> Self {
        Self::new(vec![RunOutput {
            exit_code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }])
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Runner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<RunOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        self.outputs
            .get(i)
            .cloned()
            .ok_or_else(|| DetectionError::Execution {
                program: invocation.display_name(),
                detail: format!("MockRunner: no more outputs (called {} times)", i + 1),
            })
    }
}
