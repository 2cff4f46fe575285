use std::fmt;
use std::time::SystemTimeError;

use serde_json::Value;
use thiserror::Error;

use crate::transport::ConnectionError;

pub type Result<T> = std::result::Result<T, Error>;
pub type SignResult<T> = std::result::Result<T, SignError>;
pub type TokenReaderResult<T> = std::result::Result<T, TokenReaderError>;
pub type ParseResult<T> = std::result::Result<T, ParseFailure>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("client is not configured : {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("OAuth sign failed : {0}")]
    Signer(#[from] SignError),
    #[error("request failed : {0}")]
    Transport(#[from] ConnectionError),
    #[error("cannot build request : {0}")]
    Http(#[from] http::Error),
    #[error("token exchange failed with status {status}:\n{body}")]
    TokenExchangeFailed { status: u16, body: String },
    #[error("token acquisition failed : {0}")]
    TokenReader(#[from] TokenReaderError),
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),
    #[error(transparent)]
    JsonParse(#[from] JsonParseError),
    #[error("invalid client configuration : {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// `true` for failures the API reported on purpose (permission denied,
    /// quota exceeded, ...), as opposed to integration bugs or transport
    /// trouble.
    pub fn is_operational(&self) -> bool {
        matches!(self, Error::Retrieve(_))
    }
}

impl From<ParseFailure> for Error {
    fn from(failure: ParseFailure) -> Self {
        match failure {
            ParseFailure::Retrieve(e) => Error::Retrieve(e),
            ParseFailure::Json(e) => Error::JsonParse(e),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("client is missing consumer")]
    MissingConsumer,
    #[error("client is missing access token")]
    MissingAccessToken,
    #[error("a request token must be supplied")]
    MissingRequestToken,
    #[error("record has no actor to address the request to")]
    MissingActor,
    #[error("connection must be for '{expected}', but was for '{actual}'")]
    HostMismatch { expected: String, actual: String },
    #[error("the client this record was fetched with has been dropped")]
    ClientDropped,
}

#[derive(Error, Debug)]
pub enum SignError {
    #[error("malformed query string : {0}")]
    MalformedQuery(String),
    #[error("invalid url {0} : {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("failed to compute time since Unix Epoch : {0}")]
    Clock(#[from] SystemTimeError),
}

#[derive(Error, Debug, Clone)]
pub enum TokenReaderError {
    #[error("response has malformed format: not found {0} in {1}")]
    TokenKeyNotFound(&'static str, String),
}

/// The API answered with a well-formed error envelope.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct RetrieveError {
    pub uri: Option<String>,
    pub message: String,
}

impl fmt::Display for RetrieveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uri {
            Some(ref uri) => write!(f, "could not retrieve '{}': {}", uri, self.message),
            None => write!(f, "could not retrieve: {}", self.message),
        }
    }
}

/// The API sent JSON that does not have the expected shape. Usually a bug,
/// or a sign that the wire format drifted.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct JsonParseError {
    pub uri: Option<String>,
    /// The key whose absence (or wrong type) triggered the failure.
    pub key: Option<String>,
    pub object: Value,
    pub reason: String,
}

impl JsonParseError {
    pub(crate) fn missing(key: &str, object: &Value) -> Self {
        JsonParseError {
            uri: None,
            key: Some(key.to_string()),
            object: object.clone(),
            reason: format!("missing key '{}'", key),
        }
    }

    pub(crate) fn unexpected<T: Into<String>>(reason: T, object: &Value) -> Self {
        JsonParseError {
            uri: None,
            key: None,
            object: object.clone(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for JsonParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uri {
            Some(ref uri) => write!(f, "parse failed for '{}': ", uri)?,
            None => write!(f, "parse failed: ")?,
        }
        match self.key {
            Some(ref key) => write!(f, "KeyError({}) on {}", key, self.object),
            None => write!(f, "{} on {}", self.reason, self.object),
        }
    }
}

/// Outcome of mapping a response that did not yield an entity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseFailure {
    #[error(transparent)]
    Retrieve(RetrieveError),
    #[error(transparent)]
    Json(JsonParseError),
}

impl ParseFailure {
    /// Attach the request URL the failing payload came from.
    pub fn at(self, uri: &str) -> Self {
        match self {
            ParseFailure::Retrieve(e) => ParseFailure::Retrieve(RetrieveError {
                uri: Some(uri.to_string()),
                ..e
            }),
            ParseFailure::Json(e) => ParseFailure::Json(JsonParseError {
                uri: Some(uri.to_string()),
                ..e
            }),
        }
    }
}

impl From<JsonParseError> for ParseFailure {
    fn from(e: JsonParseError) -> Self {
        ParseFailure::Json(e)
    }
}

impl From<RetrieveError> for ParseFailure {
    fn from(e: RetrieveError) -> Self {
        ParseFailure::Retrieve(e)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_failure_carries_uri() {
        let failure = ParseFailure::from(RetrieveError {
            uri: None,
            message: "quota exceeded".to_string(),
        })
        .at("https://www.googleapis.com/buzz/v1/activities/@me/@self?alt=json");
        let err = Error::from(failure);
        assert!(err.is_operational());
        assert_eq!(
            err.to_string(),
            "could not retrieve 'https://www.googleapis.com/buzz/v1/activities/@me/@self?alt=json': quota exceeded"
        );
    }

    #[test]
    fn json_parse_error_names_key() {
        let object = json!({"title": "no id"});
        let err = Error::from(ParseFailure::from(JsonParseError::missing("id", &object)));
        assert!(!err.is_operational());
        assert_eq!(
            err.to_string(),
            r#"parse failed: KeyError(id) on {"title":"no id"}"#
        );
    }
}
