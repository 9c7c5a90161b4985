use thiserror::Error;

/// Error enum for crate-specific errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// [chrono::ParseError]
    #[error(transparent)]
    ChronoParse(#[from] chrono::ParseError),

    /// This vector is not a valid bounding box.
    #[error("invalid bbox: {0:?}")]
    InvalidBbox(Vec<f64>),

    /// This string is not a valid datetime or datetime interval.
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),

    /// The start of an interval is after its end.
    #[error("start ({start}) is after end ({end})")]
    StartIsAfterEnd {
        /// The start of the interval.
        start: String,

        /// The end of the interval.
        end: String,
    },

    /// The base url used to resolve a relative href is not a url.
    #[error("malformed base url: {0}")]
    MalformedBaseUrl(String),

    /// The document has no `type` field and its shape doesn't tell us what it is.
    #[error("could not infer the type of the document")]
    UnknownShape,

    /// This is not a JSON object.
    #[error("json value is not an object")]
    NotAnObject(serde_json::Value),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// [url::ParseError]
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
}
