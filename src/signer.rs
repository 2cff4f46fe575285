use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;
use url::Url;

use crate::{SecretsProvider, OAUTH_SIGNATURE_KEY};

/// Name sent in `oauth_signature_method`.
pub const HMAC_SHA1: &str = "HMAC-SHA1";

/// Everything except `A-Z a-z 0-9 - . _ ~` is escaped.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

/// Percent-encode a string with the OAuth reserved character set.
pub fn percent_encode(input: &str) -> String {
    percent_encoding::utf8_percent_encode(input, OAUTH_ENCODE_SET).to_string()
}

/// `scheme://host[:port]/path`, with default ports, query and fragment removed.
pub fn normalize_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        // `Url::port` already hides the scheme's default port
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// Encode every pair, sort by encoded key then encoded value, and join them.
///
/// `oauth_signature` is never part of its own input and is skipped.
pub fn normalize_parameters<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut encoded = params
        .iter()
        .filter(|(k, _)| k.as_ref() != OAUTH_SIGNATURE_KEY)
        .map(|(k, v)| (percent_encode(k.as_ref()), percent_encode(v.as_ref())))
        .collect::<Vec<_>>();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// `METHOD&normalized_url&normalized_params`, each component encoded.
pub fn signature_base_string<K, V>(method: &str, url: &Url, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    format!(
        "{}&{}&{}",
        percent_encode(&method.to_ascii_uppercase()),
        percent_encode(&normalize_url(url)),
        percent_encode(&normalize_parameters(params))
    )
}

/// Sign `base_string`, returning the base64 encoded HMAC-SHA1 digest.
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: Option<&str>) -> String {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or_default())
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(base_string.as_bytes());
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}

/// Signs requests with the credentials of a [`SecretsProvider`].
#[derive(Debug, Clone)]
pub struct Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    secrets: &'a TSecretsProvider,
}

impl<'a, TSecretsProvider> Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    pub fn new(secrets: &'a TSecretsProvider) -> Self {
        Signer { secrets }
    }

    pub fn generate_signature<K, V>(&self, method: &str, url: &Url, params: &[(K, V)]) -> String
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let (_, consumer_secret) = self.secrets.get_consumer_key_pair();
        let (_, token_secret) = self.secrets.get_token_option_pair();
        let base_string = signature_base_string(method, url, params);
        sign(&base_string, consumer_secret, token_secret)
    }
}
