//! In-process sessions for unit tests.

use crate::session::ToolSession;
use chorus_types::{ChorusError, ToolDescriptor, ToolOutput};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Answers every call with `"{server}:{tool}"` and records the call.
pub(crate) struct StaticSession {
    name: String,
    tools: Vec<ToolDescriptor>,
    calls: Mutex<Vec<String>>,
    closes: AtomicUsize,
    fail_close: bool,
}

impl StaticSession {
    pub(crate) fn new(name: &str, tools: &[&str]) -> Arc<Self> {
        Arc::new(Self::build(name, tools, false))
    }

    pub(crate) fn failing_close(name: &str, tools: &[&str]) -> Arc<Self> {
        Arc::new(Self::build(name, tools, true))
    }

    fn build(name: &str, tools: &[&str], fail_close: bool) -> Self {
        Self {
            name: name.to_string(),
            tools: tools
                .iter()
                .map(|t| ToolDescriptor {
                    name: t.to_string(),
                    description: format!("{t} from {name}"),
                    input_schema: Default::default(),
                })
                .collect(),
            calls: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            fail_close,
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl ToolSession for StaticSession {
    fn server_name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        _arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ChorusError>> + Send + 'a>> {
        self.calls.lock().unwrap().push(name.to_string());
        let text = format!("{}:{name}", self.name);
        Box::pin(async move { Ok(ToolOutput::text(text)) })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), ChorusError>> + Send + '_>> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.fail_close {
                Err(ChorusError::Transport {
                    server: self.name.clone(),
                    message: "kill failed".to_string(),
                })
            } else {
                Ok(())
            }
        })
    }
}
