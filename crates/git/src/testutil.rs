//! Scripted [`CommandRunner`] for exercising git logic without processes.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::GitError;
use crate::runner::{CommandOutput, CommandRunner};

type Handler = Box<dyn Fn(&str, &[String]) -> Result<String, String> + Send + Sync>;

/// Fake runner with two modes: a per-program queue of canned results, or
/// a handler closure deciding per invocation. Every call is recorded.
pub(crate) struct FakeRunner {
    handler: Option<Handler>,
    queues: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self {
            handler: None,
            queues: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            queues: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful invocation of `program` producing `stdout`.
    pub(crate) fn expect_ok(&self, program: &str, stdout: impl Into<String>) {
        self.queues
            .lock()
            .unwrap()
            .entry(program.to_string())
            .or_default()
            .push_back(Ok(stdout.into()));
    }

    /// Queue a failing invocation of `program` with the given stderr.
    pub(crate) fn expect_fail(&self, program: &str, stderr: impl Into<String>) {
        self.queues
            .lock()
            .unwrap()
            .entry(program.to_string())
            .or_default()
            .push_back(Err(stderr.into()));
    }

    /// Every `(program, args)` invocation seen so far.
    pub(crate) fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, GitError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        let result = if let Some(handler) = &self.handler {
            handler(program, args)
        } else {
            self.queues
                .lock()
                .unwrap()
                .get_mut(program)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| {
                    panic!("unexpected invocation of {program} with args {args:?}")
                })
        };

        Ok(match result {
            Ok(stdout) => CommandOutput {
                stdout,
                stderr: String::new(),
                exit_code: Some(0),
            },
            Err(stderr) => CommandOutput {
                stdout: String::new(),
                stderr,
                exit_code: Some(1),
            },
        })
    }
}
