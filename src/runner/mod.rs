pub mod mock;
pub mod process;

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

/// One external program run: what to start and with which arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Invocation {
    /// `[interpreter] <script> <args...>`
    pub fn new(interpreter: Option<&str>, script: PathBuf, args: Vec<OsString>) -> Self {
        match interpreter {
            Some(interpreter) => {
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(script.into_os_string());
                all.extend(args);
                Self {
                    program: interpreter.into(),
                    args: all,
                }
            }
            None => Self {
                program: script.into_os_string(),
                args,
            },
        }
    }

    /// Program name for logs and error messages.
    pub fn display_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// What a finished program left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external program to completion. Spawn failures are errors;
/// a non-zero exit is not, it is reported through [`RunOutput`].
///
/// Dropping the returned future must stop the program.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<RunOutput>;
}
