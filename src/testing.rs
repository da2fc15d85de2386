//! Scriptable in-memory identity provider for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::ProviderConfig;
use crate::error::Error;
use crate::provider::{IdentityProvider, InitOptions};

pub(crate) const FRESH_TOKEN: &str = "header.eyJleHAiOjk5OTk5OTk5OTksInJlYWxtX2FjY2VzcyI6eyJyb2xlcyI6WyJhZG1pbiJdfX0.sig";
pub(crate) const STALE_TOKEN: &str = "header.eyJleHAiOjF9.sig";

#[derive(Clone)]
pub(crate) enum InitOutcome {
    Restored(String),
    Anonymous,
    Fail(String),
}

#[derive(Clone)]
pub(crate) enum RefreshOutcome {
    Keep,
    Rotate(String),
    Fail(String),
}

pub(crate) struct Recorder {
    pub(crate) init_outcome: Mutex<InitOutcome>,
    pub(crate) init_delay: Mutex<Option<Duration>>,
    pub(crate) refresh_outcome: Mutex<RefreshOutcome>,
    pub(crate) refresh_delay: Mutex<Option<Duration>>,
    pub(crate) token: Mutex<Option<String>>,
    pub(crate) connected: Mutex<Vec<ProviderConfig>>,
    pub(crate) min_validities: Mutex<Vec<u64>>,
    pub(crate) init_calls: AtomicUsize,
    pub(crate) refresh_calls: AtomicUsize,
    pub(crate) login_calls: AtomicUsize,
    pub(crate) logout_calls: AtomicUsize,
    pub(crate) register_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl Recorder {
    pub(crate) fn new(init_outcome: InitOutcome) -> Arc<Self> {
        Arc::new(Self {
            init_outcome: Mutex::new(init_outcome),
            init_delay: Mutex::new(None),
            refresh_outcome: Mutex::new(RefreshOutcome::Keep),
            refresh_delay: Mutex::new(None),
            token: Mutex::new(None),
            connected: Mutex::new(Vec::new()),
            min_validities: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub(crate) fn factory(
        self: &Arc<Self>,
    ) -> impl Fn(&ProviderConfig) -> RecordingProvider + Send + Sync + 'static {
        let recorder = self.clone();
        move |config: &ProviderConfig| {
            recorder.connected.lock().push(config.clone());
            RecordingProvider {
                recorder: recorder.clone(),
            }
        }
    }

    pub(crate) fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub(crate) struct RecordingProvider {
    recorder: Arc<Recorder>,
}

impl IdentityProvider for RecordingProvider {
    async fn init(&self, _options: InitOptions) -> Result<bool, Error> {
        let rec = &self.recorder;
        rec.init_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *rec.init_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = rec.init_outcome.lock().clone();
        match outcome {
            InitOutcome::Restored(token) => {
                *rec.token.lock() = Some(token);
                Ok(true)
            }
            InitOutcome::Anonymous => Ok(false),
            InitOutcome::Fail(detail) => Err(Error::provider("init", detail)),
        }
    }

    async fn update_token(&self, min_validity: u64) -> Result<bool, Error> {
        let rec = &self.recorder;
        rec.refresh_calls.fetch_add(1, Ordering::SeqCst);
        rec.min_validities.lock().push(min_validity);
        let now = rec.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        rec.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *rec.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        rec.in_flight.fetch_sub(1, Ordering::SeqCst);

        let outcome = rec.refresh_outcome.lock().clone();
        match outcome {
            RefreshOutcome::Keep => Ok(false),
            RefreshOutcome::Rotate(token) => {
                *rec.token.lock() = Some(token);
                Ok(true)
            }
            RefreshOutcome::Fail(detail) => Err(Error::provider("update_token", detail)),
        }
    }

    fn login(&self) -> Result<(), Error> {
        self.recorder.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn logout(&self) -> Result<(), Error> {
        self.recorder.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn register(&self) -> Result<(), Error> {
        self.recorder.register_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn token(&self) -> Option<String> {
        self.recorder.token.lock().clone()
    }
}

pub(crate) fn test_config() -> ProviderConfig {
    ProviderConfig::new("https://sso.example.com", "acme", "portal")
}
