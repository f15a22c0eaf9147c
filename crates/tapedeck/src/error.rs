//! Error types for the cassette engine.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cassette recording and playback
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The URL a request was built from carries no parseable host.
    #[error("Could not read host from URL '{0}'")]
    InvalidHost(String),

    /// The configured cassette directory does not exist.
    #[error("Cassette path '{0}' does not exist. Please either create it or set a different cassette path")]
    CassettePathNotFound(String),

    /// An unrecognized record mode name was supplied.
    #[error("Invalid record mode '{0}'. Expected one of: new_episodes, once, none")]
    InvalidMode(String),

    /// A matcher was enabled by a name the registry does not know.
    #[error("Unknown request matcher '{0}'. Available matchers: {1}")]
    UnknownMatcher(String, String),

    /// Matcher names must be non-empty.
    #[error("Request matcher name must not be empty")]
    EmptyMatcherName,

    /// A storage backend was requested by a name the registry does not know.
    #[error("Unknown storage backend '{0}'. Available backends: json, yaml, blackhole")]
    UnknownStorage(String),

    /// `Recorder::handle_request` was called before any cassette was inserted.
    #[error(
        "Invalid http request. No cassette inserted. \
         Please make sure to insert a cassette in your unit test using \
         Recorder::insert_cassette(\"name_of_cassette\")"
    )]
    NoCassetteInserted,

    /// An unmatched request was refused by the current record mode.
    #[error(
        "The request '{method} {url}' does not match a previously recorded request \
         and the record mode is '{mode}'. If you want to send the request anyway, \
         make sure your record mode is 'new_episodes'"
    )]
    RequestNotAllowed {
        method: String,
        url: String,
        mode: String,
    },

    /// A cassette file contains content the storage backend cannot parse.
    #[error("Cassette '{path}' is corrupt: {reason}")]
    CorruptCassette { path: String, reason: String },

    /// A stored interaction record is missing fields or has the wrong shape.
    #[error("Malformed interaction record: {0}")]
    MalformedRecord(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Errors from the live-call transport collaborator, propagated as-is.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}
