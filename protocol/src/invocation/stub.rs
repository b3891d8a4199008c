//! Scripted invoker for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ContractCall, ContractInvoker, InvocationOutput, InvocationResult, NativeValue};
use crate::error::{GatewayError, Result};

/// Replies to each function name with a fixed, pre-scripted result and
/// records every call it receives.
#[derive(Debug, Default)]
pub struct StubInvoker {
    responses: HashMap<String, Result<InvocationResult>>,
    calls: Mutex<Vec<ContractCall>>,
}

impl StubInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, function: &str, result: Result<InvocationResult>) -> Self {
        self.responses.insert(function.to_string(), result);
        self
    }

    /// `function` returns `value`; the raw output is the bare rendering.
    pub fn with_value(self, function: &str, value: NativeValue) -> Self {
        let raw = value.to_string();
        self.with_result(
            function,
            Ok(InvocationResult {
                raw,
                output: InvocationOutput::Value(value),
            }),
        )
    }

    pub fn with_envelope(self, function: &str, envelope: &str) -> Self {
        self.with_result(
            function,
            Ok(InvocationResult {
                raw: envelope.to_string(),
                output: InvocationOutput::Envelope(envelope.to_string()),
            }),
        )
    }

    pub fn with_submitted(self, function: &str, hash: &str) -> Self {
        self.with_result(
            function,
            Ok(InvocationResult {
                raw: String::new(),
                output: InvocationOutput::Submitted {
                    hash: Some(hash.to_string()),
                },
            }),
        )
    }

    pub fn with_error(self, function: &str, error: GatewayError) -> Self {
        self.with_result(function, Err(error))
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ContractInvoker for StubInvoker {
    async fn invoke(&self, call: &ContractCall) -> Result<InvocationResult> {
        self.calls.lock().push(call.clone());
        match self.responses.get(&call.function) {
            Some(result) => result.clone(),
            None => Err(GatewayError::ExecutionFailure {
                message: format!("no scripted response for {}", call.function),
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }

    fn strategy(&self) -> &'static str {
        "stub"
    }
}
