//! The recorder: the one place allowed to trigger a live HTTP call.
//!
//! Owns the configuration, the transport collaborator and the currently
//! inserted cassette. Each incoming request is played back when a match
//! exists; otherwise the record-mode state machine decides between a live
//! call (recorded and returned) and a descriptive failure.

mod mode;

pub use mode::RecordMode;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::cassette::Cassette;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::matchers::CompositeMatcher;
use crate::scrub::Scrubber;
use crate::storage;
use crate::transport::HttpTransport;

pub struct Recorder {
    config: Config,
    transport: Box<dyn HttpTransport>,
    cassette: Option<Cassette>,
    /// How often each distinct request has been handled against the current
    /// cassette; drives index-based playback of repeated identical requests.
    occurrences: HashMap<String, u64>,
}

impl Recorder {
    pub fn new(config: Config, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            cassette: None,
            occurrences: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cassette(&self) -> Option<&Cassette> {
        self.cassette.as_ref()
    }

    /// Insert a cassette for a recording session, ejecting any current one
    /// and opening (or creating) its storage through the backend registry.
    pub fn insert_cassette(&mut self, name: &str) -> Result<()> {
        self.eject_cassette();
        let storage = storage::create(
            self.config.storage.as_str(),
            &self.config.cassette_dir,
            name,
        )?;
        let matcher = CompositeMatcher::from_names(&self.config.enabled_matchers)?;
        let scrubber = Scrubber::new(self.config.redactions.clone());
        self.cassette = Some(Cassette::new(name, storage, matcher, scrubber));
        info!(cassette = name, "inserted cassette");
        Ok(())
    }

    /// Release the current cassette and forget per-request occurrence
    /// counts.
    pub fn eject_cassette(&mut self) {
        if let Some(cassette) = self.cassette.take() {
            info!(cassette = cassette.name(), "ejected cassette");
        }
        self.occurrences.clear();
    }

    /// Play back a matching recording, or consult the record mode for a
    /// live call. This is the hook point integrations route outgoing
    /// requests through.
    pub fn handle_request(&mut self, request: &Request) -> Result<Response> {
        let cassette = self.cassette.as_ref().ok_or(Error::NoCassetteInserted)?;

        let key = serde_json::to_string(&request.to_record())?;
        let counter = self.occurrences.entry(key).or_insert(0);
        let index = *counter;
        *counter += 1;

        if let Some(response) = cassette.playback(request, index)? {
            return Ok(response);
        }

        if !self.config.mode.allows_live_call(cassette.is_new()) {
            return Err(Error::RequestNotAllowed {
                method: request.method(),
                url: request.url().to_string(),
                mode: self.config.mode.to_string(),
            });
        }

        debug!(
            method = %request.method(),
            url = request.url(),
            mode = %self.config.mode,
            "no recording matched, performing live call"
        );
        let response = self.transport.send(request).map_err(Error::Transport)?;
        cassette.record(request, &response)?;
        Ok(response)
    }
}
