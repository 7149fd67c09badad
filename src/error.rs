use thiserror::Error;

/// Errors raised by the generation core.
///
/// `Transport`, `Status`, `StreamRead`, `Stream` and `Decode` all describe a failure to
/// talk to a provider and are propagated verbatim; nothing below the caller
/// retries them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{backend} request failed: {source}")]
    Transport {
        backend: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{backend} API error: HTTP {status} - {body}")]
    Status {
        backend: &'static str,
        status: u16,
        body: String,
    },

    #[error("{backend} stream interrupted: {source}")]
    StreamRead {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The provider reported an error inside the stream, or the stream ended
    /// before its terminal signal.
    #[error("{backend} stream failed: {message}")]
    Stream {
        backend: &'static str,
        message: String,
    },

    #[error("failed to decode {backend} response: {message}")]
    Decode {
        backend: &'static str,
        message: String,
    },

    #[error("the model returned no candidates")]
    EmptyResult,

    #[error("{0}")]
    Validation(String),

    #[error("agent did not finish the message within {0} steps")]
    ToolBudgetExceeded(usize),

    #[error("editor failed: {0}")]
    Editor(String),

    #[error("git failed: {0}")]
    Git(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn decode(backend: &'static str, message: impl ToString) -> Self {
        Error::Decode {
            backend,
            message: message.to_string(),
        }
    }

    /// True for every failure that happened while reaching a provider.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. }
                | Error::Status { .. }
                | Error::StreamRead { .. }
                | Error::Stream { .. }
                | Error::Decode { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
