//! Scripted portal doubles shared by the engine and manager tests.

use async_trait::async_trait;
use gstmap_core::{Gstin, GstinDetails, GstinSummary, Pan};
use gstmap_portal::{
    DetailFetcher, DetailOutcome, LookupOutcome, PortalError, PortalSession,
    Result as PortalResult, SessionProvider,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// One scripted response for a PAN lookup.
#[derive(Debug, Clone)]
pub enum Step {
    Found(Vec<GstinSummary>),
    NoRecords,
    Transient(&'static str),
    Fatal(&'static str),
}

/// One scripted response for a detail fetch.
#[derive(Debug, Clone)]
pub enum DetailStep {
    Found(GstinDetails),
    NotFound,
    Transient(&'static str),
    Fatal(&'static str),
}

pub fn summary(gstin: &str) -> GstinSummary {
    GstinSummary {
        gstin: Gstin::parse(gstin).expect("valid gstin"),
        status: "Active".to_string(),
        state: "Maharashtra".to_string(),
    }
}

/// Portal session that replays scripted steps per identifier.
///
/// Lookups pop the next step scripted for the identifier; identifiers with
/// no script get the default step. Every call is recorded for assertions.
pub struct ScriptedSession {
    steps: Mutex<HashMap<String, VecDeque<Step>>>,
    default: Step,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSession {
    pub fn new(default: Step) -> Self {
        Self {
            steps: Mutex::new(HashMap::new()),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, key: &str, steps: Vec<Step>) {
        self.steps
            .lock()
            .expect("steps lock")
            .insert(key.to_string(), steps.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn next_step(&self, key: &str) -> Step {
        self.calls
            .lock()
            .expect("calls lock")
            .push(key.to_string());
        self.steps
            .lock()
            .expect("steps lock")
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl PortalSession for ScriptedSession {
    async fn lookup(&self, pan: &Pan) -> PortalResult<LookupOutcome> {
        match self.next_step(pan.as_str()) {
            Step::Found(summaries) => Ok(LookupOutcome::Found(summaries)),
            Step::NoRecords => Ok(LookupOutcome::NoRecords),
            Step::Transient(msg) => Err(PortalError::Transient(msg.to_string())),
            Step::Fatal(msg) => Err(PortalError::Fatal(msg.to_string())),
        }
    }
}

/// Detail fetcher that replays scripted steps per GSTIN.
pub struct ScriptedFetcher {
    steps: Mutex<HashMap<String, VecDeque<DetailStep>>>,
    default: DetailStep,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(default: DetailStep) -> Self {
        Self {
            steps: Mutex::new(HashMap::new()),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, key: &str, steps: Vec<DetailStep>) {
        self.steps
            .lock()
            .expect("steps lock")
            .insert(key.to_string(), steps.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn next_step(&self, key: &str) -> DetailStep {
        self.calls
            .lock()
            .expect("calls lock")
            .push(key.to_string());
        self.steps
            .lock()
            .expect("steps lock")
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl DetailFetcher for ScriptedFetcher {
    async fn fetch(&self, gstin: &Gstin) -> PortalResult<DetailOutcome> {
        match self.next_step(gstin.as_str()) {
            DetailStep::Found(details) => Ok(DetailOutcome::Found(details)),
            DetailStep::NotFound => Ok(DetailOutcome::NotFound),
            DetailStep::Transient(msg) => Err(PortalError::Transient(msg.to_string())),
            DetailStep::Fatal(msg) => Err(PortalError::Fatal(msg.to_string())),
        }
    }
}

struct SharedSession(Arc<ScriptedSession>);

#[async_trait]
impl PortalSession for SharedSession {
    async fn lookup(&self, pan: &Pan) -> PortalResult<LookupOutcome> {
        self.0.lookup(pan).await
    }
}

struct SharedFetcher(Arc<ScriptedFetcher>);

#[async_trait]
impl DetailFetcher for SharedFetcher {
    async fn fetch(&self, gstin: &Gstin) -> PortalResult<DetailOutcome> {
        self.0.fetch(gstin).await
    }
}

/// Provider handing out sessions backed by shared scripts, so tests can
/// assert against the script after the worker finishes.
pub struct ScriptedProvider {
    pub session: Arc<ScriptedSession>,
    pub fetcher: Arc<ScriptedFetcher>,
    fail_open: Mutex<Option<&'static str>>,
}

impl ScriptedProvider {
    pub fn new(session: Arc<ScriptedSession>, fetcher: Arc<ScriptedFetcher>) -> Self {
        Self {
            session,
            fetcher,
            fail_open: Mutex::new(None),
        }
    }

    /// Make every subsequent open fail fatally, as a browser launch
    /// failure would.
    pub fn fail_open(&self, message: &'static str) {
        *self.fail_open.lock().expect("fail_open lock") = Some(message);
    }

    fn open_error(&self) -> Option<PortalError> {
        self.fail_open
            .lock()
            .expect("fail_open lock")
            .map(|msg| PortalError::Fatal(msg.to_string()))
    }
}

#[async_trait]
impl SessionProvider for ScriptedProvider {
    async fn open_session(&self, _headless: bool) -> PortalResult<Box<dyn PortalSession>> {
        if let Some(e) = self.open_error() {
            return Err(e);
        }
        Ok(Box::new(SharedSession(Arc::clone(&self.session))))
    }

    async fn open_fetcher(&self, _headless: bool) -> PortalResult<Box<dyn DetailFetcher>> {
        if let Some(e) = self.open_error() {
            return Err(e);
        }
        Ok(Box::new(SharedFetcher(Arc::clone(&self.fetcher))))
    }
}
