//! Tapedeck: a record-and-replay cassette engine for HTTP test fixtures.
//!
//! The first time a test suite runs, real HTTP interactions are captured
//! and appended to a cassette file; subsequent runs replay the stored
//! responses without touching the network.
//!
//! Components:
//! - `http` - request/response value objects and their record form
//! - `matchers` - named predicates composed into a [`CompositeMatcher`]
//! - `storage` - streaming, append-only json/yaml/blackhole backends
//! - `scrub` - secret redaction applied around storage
//! - `cassette` - match/playback/record over one storage handle
//! - `recorder` - the record-mode state machine and live-call gate
//!
//! Integrations register an [`HttpTransport`] and route outgoing requests
//! through [`Recorder::handle_request`]; everything else is configuration.

pub mod cassette;
pub mod config;
pub mod error;
pub mod http;
pub mod matchers;
pub mod recorder;
pub mod scrub;
pub mod storage;
pub mod transport;

pub use cassette::Cassette;
pub use config::Config;
pub use error::{Error, Result};
pub use http::{PostFile, Request, Response, Status};
pub use matchers::CompositeMatcher;
pub use recorder::{RecordMode, Recorder};
pub use scrub::{Redaction, Scrubber};
pub use storage::{Storage, StorageKind};
pub use transport::HttpTransport;
