//! errors raised while decoding traffic from peers.
//!
//! none of these are fatal: the session that produced one logs it and keeps
//! going. startup failures use `anyhow` instead (see main.rs / config.rs).

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// frame was not valid json or not a `{event, data}` envelope
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    /// an outbound event could not be serialized
    #[error("failed to encode {event}: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown event {0:?}")]
    UnknownEvent(String),

    #[error("device report is not a json object")]
    ReportNotObject,
}

pub type Result<T> = std::result::Result<T, RelayError>;
