use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use http::Method;
use rand::distributions::Alphanumeric;
use rand::Rng;
use url::Url;

use crate::signer::{normalize_url, percent_encode, Signer, HMAC_SHA1};
use crate::{
    ConfigurationError, Consumer, Result, SignError, SignResult, Token, OAUTH_CALLBACK_KEY,
    OAUTH_CONSUMER_KEY, OAUTH_KEY_PREFIX, OAUTH_NONCE_KEY, OAUTH_SIGNATURE_KEY,
    OAUTH_SIGNATURE_METHOD_KEY, OAUTH_TIMESTAMP_KEY, OAUTH_TOKEN_KEY, OAUTH_VERIFIER_KEY,
    OAUTH_VERSION_KEY, REALM_KEY, SCOPE_KEY,
};
use crate::secrets::Secrets;

const OAUTH_VERSION: &str = "1.0";
const NONCE_LENGTH: usize = 32;

/// Per-request protocol parameters.
///
/// Nonce and timestamp are generated at build time unless fixed here.
#[derive(Debug, Clone, Default)]
pub struct OAuthParameters<'a> {
    callback: Option<Cow<'a, str>>,
    nonce: Option<Cow<'a, str>>,
    realm: Option<Cow<'a, str>>,
    scope: Option<Cow<'a, str>>,
    timestamp: Option<u64>,
    verifier: Option<Cow<'a, str>>,
    version: bool,
}

impl<'a> OAuthParameters<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn callback<T>(self, callback: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            callback: Some(callback.into()),
            ..self
        }
    }

    /// set the oauth_nonce value
    pub fn nonce<T>(self, nonce: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// set the realm announced in the `Authorization` header
    pub fn realm<T>(self, realm: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            realm: Some(realm.into()),
            ..self
        }
    }

    /// set the space separated `scope` list sent with request-token calls
    pub fn scope<T>(self, scope: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            scope: Some(scope.into()),
            ..self
        }
    }

    /// set the oauth_timestamp value
    pub fn timestamp<T>(self, timestamp: T) -> Self
    where
        T: Into<u64>,
    {
        OAuthParameters {
            timestamp: Some(timestamp.into()),
            ..self
        }
    }

    /// set the oauth_verifier value
    pub fn verifier<T>(self, verifier: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            verifier: Some(verifier.into()),
            ..self
        }
    }

    /// set the oauth_version value (boolean)
    ///
    /// # Note
    /// When the version has value `true`, oauth_version will be set with "1.0".
    /// Otherwise, oauth_version will not be included in your request.
    pub fn version<T>(self, version: T) -> Self
    where
        T: Into<bool>,
    {
        OAuthParameters {
            version: version.into(),
            ..self
        }
    }

    fn protocol_parameters(
        &self,
        consumer: &Consumer,
        token: Option<&Token>,
    ) -> SignResult<Vec<(String, String)>> {
        let nonce = match self.nonce {
            Some(ref nonce) => nonce.to_string(),
            None => generate_nonce(),
        };
        let timestamp = match self.timestamp {
            Some(timestamp) => timestamp,
            None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
        };

        let mut params = vec![
            (OAUTH_CONSUMER_KEY.to_string(), consumer.key().to_string()),
            (OAUTH_NONCE_KEY.to_string(), nonce),
            (OAUTH_SIGNATURE_METHOD_KEY.to_string(), HMAC_SHA1.to_string()),
            (OAUTH_TIMESTAMP_KEY.to_string(), timestamp.to_string()),
        ];
        if self.version {
            params.push((OAUTH_VERSION_KEY.to_string(), OAUTH_VERSION.to_string()));
        }
        if let Some(token) = token {
            params.push((OAUTH_TOKEN_KEY.to_string(), token.key().to_string()));
        }
        if let Some(ref callback) = self.callback {
            params.push((OAUTH_CALLBACK_KEY.to_string(), callback.to_string()));
        }
        if let Some(ref verifier) = self.verifier {
            params.push((OAUTH_VERIFIER_KEY.to_string(), verifier.to_string()));
        }
        if let Some(ref scope) = self.scope {
            params.push((SCOPE_KEY.to_string(), scope.to_string()));
        }
        Ok(params)
    }
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Parse a query string, refusing anything that is not a `&` separated list
/// of `key=value` fields.
///
/// When a key repeats, the first value wins.
pub fn parse_query_strict(query: &str) -> SignResult<Vec<(String, String)>> {
    let mut params: Vec<(String, String)> = Vec::new();
    for field in query.split('&') {
        if !field.contains('=') {
            return Err(SignError::MalformedQuery(format!(
                "bad query field '{}' in '{}'",
                field, query
            )));
        }
        if let Some((key, value)) = url::form_urlencoded::parse(field.as_bytes()).next() {
            if !params.iter().any(|(k, _)| k.as_str() == key.as_ref()) {
                params.push((key.into_owned(), value.into_owned()));
            }
        }
    }
    Ok(params)
}

/// A fully signed OAuth request, ready to be serialized.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    method: Method,
    url: Url,
    params: BTreeMap<String, String>,
    realm: Option<String>,
}

impl SignedRequest {
    /// Sign `url` for `method` with the given credentials.
    ///
    /// Query parameters of `url` and `extra` (for example a form body) are
    /// signed along with the protocol parameters.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigurationError::MissingConsumer`] when no consumer is
    /// supplied, and with [`SignError::MalformedQuery`] when the query string
    /// of `url` cannot be parsed strictly.
    pub fn build<K, V>(
        method: Method,
        url: &Url,
        consumer: Option<&Consumer>,
        token: Option<&Token>,
        parameters: &OAuthParameters<'_>,
        extra: &[(K, V)],
    ) -> Result<SignedRequest>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let consumer = consumer.ok_or(ConfigurationError::MissingConsumer)?;

        let mut params = BTreeMap::new();
        if let Some(query) = url.query().filter(|q| !q.is_empty()) {
            for (key, value) in parse_query_strict(query)? {
                params.entry(key).or_insert(value);
            }
        }
        for (key, value) in extra {
            params
                .entry(key.as_ref().to_string())
                .or_insert_with(|| value.as_ref().to_string());
        }
        for (key, value) in parameters.protocol_parameters(consumer, token)? {
            params.insert(key, value);
        }

        let pairs = params.iter().collect::<Vec<_>>();
        let secrets = Secrets::new(consumer).token_option(token);
        let signature = Signer::new(&secrets).generate_signature(method.as_str(), url, &pairs);
        params.insert(OAUTH_SIGNATURE_KEY.to_string(), signature);

        let mut url = url.clone();
        url.set_query(None);
        url.set_fragment(None);

        Ok(SignedRequest {
            method,
            url,
            params,
            realm: parameters.realm.as_ref().map(|r| r.to_string()),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn get_parameter(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn signature(&self) -> &str {
        self.get_parameter(OAUTH_SIGNATURE_KEY).unwrap_or_default()
    }

    /// All parameters as an `application/x-www-form-urlencoded` body.
    pub fn to_postdata(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// The `oauth_*` parameters as an `Authorization` header value.
    pub fn to_header(&self) -> String {
        let oauth = self
            .params
            .iter()
            .filter(|(k, _)| k.starts_with(OAUTH_KEY_PREFIX))
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(",");
        match self.realm {
            // OAuth oauth_...,realm="realm"
            Some(ref realm) => format!("OAuth {},{}=\"{}\"", oauth, REALM_KEY, realm),
            // OAuth oauth_...
            None => format!("OAuth {}", oauth),
        }
    }

    /// The normalized URL with every parameter appended as its query.
    pub fn to_url(&self) -> String {
        format!("{}?{}", normalize_url(&self.url), self.to_postdata())
    }
}
