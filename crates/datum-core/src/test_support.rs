//! Scripted handlers for exercising the engine without real sources

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::handler::{HandlerResult, OpContext, SourceHandler};
use crate::source::SourceSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Fingerprint,
    Fetch,
}

/// Shared record of handler invocations, in call order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(String, CallKind)>>>,
}

impl CallLog {
    fn record(&self, handler: &str, kind: CallKind) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((handler.to_string(), kind));
    }

    pub fn calls(&self) -> Vec<(String, CallKind)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Handler names in call order, with consecutive repeats collapsed.
    pub fn handlers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.calls().into_iter().map(|(name, _)| name).collect();
        names.dedup();
        names
    }
}

/// A handler whose behavior is fixed up front.
///
/// By default it fingerprints as `"{name}-fp"` and fetches the text
/// `"data from {name}"`.
#[derive(Debug, Clone)]
pub struct ScriptedHandler {
    name: String,
    fingerprint: String,
    content: String,
    fail: Option<String>,
    fail_fetch: Option<String>,
    hang: bool,
    log: Option<CallLog>,
}

impl ScriptedHandler {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            fingerprint: format!("{name}-fp"),
            content: format!("data from {name}"),
            name,
            fail: None,
            fail_fetch: None,
            hang: false,
            log: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Fail every operation with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail = Some(message.into());
        self
    }

    /// Fingerprint normally but fail fetches with `message`.
    pub fn failing_fetch(mut self, message: impl Into<String>) -> Self {
        self.fail_fetch = Some(message.into());
        self
    }

    /// Never complete any operation.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    async fn enter(&self, kind: CallKind) -> HandlerResult<()> {
        if let Some(log) = &self.log {
            log.record(&self.name, kind);
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.fail {
            Some(message) => Err(HandlerError::Other(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SourceHandler for ScriptedHandler {
    async fn fingerprint(&self, _ctx: &OpContext, _source: &SourceSpec) -> HandlerResult<String> {
        self.enter(CallKind::Fingerprint).await?;
        Ok(self.fingerprint.clone())
    }

    async fn fetch(&self, _ctx: &OpContext, _source: &SourceSpec, dest: &Path) -> HandlerResult<()> {
        self.enter(CallKind::Fetch).await?;
        if let Some(message) = &self.fail_fetch {
            return Err(HandlerError::Other(message.clone()));
        }
        datum_fs::io::write_atomic(dest, self.content.as_bytes())?;
        Ok(())
    }
}
