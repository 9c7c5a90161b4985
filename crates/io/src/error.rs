use thiserror::Error;

/// Crate-specific error enum
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The server responded with a non-2xx status.
    #[error("{status} {status_text} when getting href={href}")]
    Fetch {
        /// The HTTP status code.
        status: u16,

        /// The canonical reason phrase for the status.
        status_text: String,

        /// The href that we were trying to get.
        href: String,
    },

    /// The response body is not valid JSON, or not the shape we expected.
    #[error("could not decode href={href}: {source}")]
    Decode {
        /// The href that we were trying to decode.
        href: String,

        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Returned when unable to read a local file.
    #[error("{io}: {path}")]
    FromPath {
        /// The [std::io::Error]
        #[source]
        io: std::io::Error,

        /// The path.
        path: String,
    },

    /// The href is neither a url nor a usable path.
    #[error("invalid href: {0}")]
    InvalidHref(String),

    /// We expected one kind of STAC value but got another.
    #[error("incorrect type: expected={expected}, actual={actual}")]
    IncorrectType {
        /// The actual type of the value.
        actual: String,

        /// The expected type.
        expected: String,
    },

    /// [reqwest::Error]
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// [serde_urlencoded::ser::Error]
    #[error(transparent)]
    SerdeUrlencoded(#[from] serde_urlencoded::ser::Error),

    /// [stac_map::Error]
    #[error(transparent)]
    Stac(#[from] stac_map::Error),

    /// [url::ParseError]
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Returns true if retrying the request might succeed.
    ///
    /// Connection failures, timeouts, and gateway statuses are transient;
    /// everything else (4xx, bad JSON, bad hrefs) is deterministic.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Reqwest(err) => err.is_timeout() || err.is_connect(),
            Error::Fetch { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }
}

impl Error {
    /// Attaches the href to JSON decoding errors.
    pub(crate) fn with_href(self, href: &str) -> Error {
        match self {
            Error::SerdeJson(source) | Error::Stac(stac_map::Error::SerdeJson(source)) => {
                Error::Decode {
                    href: href.to_string(),
                    source,
                }
            }
            error => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use rstest::rstest;

    #[rstest]
    #[case(404, false)]
    #[case(500, false)]
    #[case(502, true)]
    #[case(503, true)]
    #[case(504, true)]
    fn transient_statuses(#[case] status: u16, #[case] transient: bool) {
        let error = Error::Fetch {
            status,
            status_text: String::new(),
            href: "https://stac.test".to_string(),
        };
        assert_eq!(error.is_transient(), transient);
    }

    #[test]
    fn with_href() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        match Error::from(source).with_href("https://stac.test/bad.json") {
            Error::Decode { href, .. } => assert_eq!(href, "https://stac.test/bad.json"),
            error => panic!("unexpected error: {error}"),
        }
    }
}
