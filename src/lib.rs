/*!
buzz-oauth1: a blocking client for the Buzz activity-stream API.

# Overview

This library signs every request with OAuth 1.0a (HMAC-SHA1), walks the
three-legged token exchange, keeps one persistent connection per host and
maps the API's loosely shaped JSON into [`Person`], [`Post`] and
[`Comment`] records.

# How to use

## Basic usecase 1 - reading a feed

```ignore
use buzz_oauth1::{Client, ClientConfig, Consumer, Feed, Token};

let config = ClientConfig::default()
    .consumer(Consumer::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]"))
    .access_token(Token::new("[ACCESS_TOKEN]", "[TOKEN_SECRET]"));
let client = Client::new(config);

for post in client.posts(Feed::Consumption, "@me")? {
    println!("{}: {:?}", post.id, post.content);
    // comments are fetched once, then cached on the record
    for comment in post.comments()? {
        println!("  {:?}", comment.content);
    }
}
```

## Basic usecase 2 - acquiring an access token

```ignore
use std::io;
use buzz_oauth1::{Client, ClientConfig, Consumer, FULL_ACCESS_SCOPE};

let config = ClientConfig::default()
    .consumer(Consumer::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]"))
    .scope(FULL_ACCESS_SCOPE);
let client = Client::new(config);

// step 1: acquire request token & token secret
client.fetch_request_token("oob")?;

// step 2: let the user authorize it
println!("please access to: {}", client.authorization_url(None)?);
println!("input verifier: ");
let mut user_input = String::new();
io::stdin().read_line(&mut user_input)?;

// step 3: acquire access token
let token = client.fetch_access_token(user_input.trim(), None)?;
println!("your token is: {:?}", token);
```

## Loading credentials from TOML

```ignore
let config = buzz_oauth1::ClientConfig::from_toml_str(r#"
    scopes = ["https://www.googleapis.com/auth/buzz.readonly"]

    [consumer]
    key = "anonymous"
    secret = "anonymous"
"#)?;
```
*/
mod client;
mod config;
mod error;
pub mod mapper;
mod model;
mod request;
mod secrets;
mod signer;
mod token_reader;
pub mod transport;

// exposed to external program
pub use client::{Client, Feed, HandshakeState};
pub use config::ClientConfig;
pub use error::{
    ConfigurationError, Error, JsonParseError, ParseFailure, ParseResult, Result, RetrieveError,
    SignError, SignResult, TokenReaderError, TokenReaderResult,
};
pub use model::{Comment, Identifier, Person, Post};
pub use request::{parse_query_strict, OAuthParameters, SignedRequest};
pub use secrets::{Consumer, Secrets, SecretsProvider, Token};
pub use signer::{
    normalize_parameters, normalize_url, percent_encode, sign, signature_base_string, Signer,
    HMAC_SHA1,
};
pub use token_reader::{TokenReader, TokenResponse};
pub use transport::{Connection, ConnectionError, Connector, ReqwestConnector};

// exposed constant variables
/// Represents `oauth_callback`.
pub const OAUTH_CALLBACK_KEY: &str = "oauth_callback";
/// Represents `oauth_nonce`.
pub const OAUTH_NONCE_KEY: &str = "oauth_nonce";
/// Represents `oauth_timestamp`.
pub const OAUTH_TIMESTAMP_KEY: &str = "oauth_timestamp";
/// Represents `oauth_verifier`.
pub const OAUTH_VERIFIER_KEY: &str = "oauth_verifier";
/// Represents `oauth_version`.
pub const OAUTH_VERSION_KEY: &str = "oauth_version";
/// Represents `realm`.
pub const REALM_KEY: &str = "realm";
/// Represents `scope`, sent with request-token calls.
pub const SCOPE_KEY: &str = "scope";

/// Read-only access to the user's activities.
pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/buzz.readonly";
/// Read and write access to the user's activities.
pub const FULL_ACCESS_SCOPE: &str = "https://www.googleapis.com/auth/buzz";

/// Host serving the resource API.
pub const API_HOST: &str = "www.googleapis.com";
/// Host serving the token endpoints.
pub const OAUTH_HOST: &str = "www.google.com";

pub const API_PREFIX: &str = "https://www.googleapis.com/buzz/v1";
pub const OAUTH_REQUEST_TOKEN_URI: &str = "https://www.google.com/accounts/OAuthGetRequestToken";
pub const OAUTH_ACCESS_TOKEN_URI: &str = "https://www.google.com/accounts/OAuthGetAccessToken";
pub const OAUTH_AUTHORIZATION_URI: &str =
    "https://www.google.com/buzz/api/auth/OAuthAuthorizeToken";
pub const OAUTH_TOKEN_INFO_URI: &str = "https://www.google.com/accounts/AuthSubTokenInfo";

// crate-private constant variables
pub(crate) const OAUTH_KEY_PREFIX: &str = "oauth_";
pub(crate) const OAUTH_SIGNATURE_METHOD_KEY: &str = "oauth_signature_method";
pub(crate) const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
pub(crate) const OAUTH_SIGNATURE_KEY: &str = "oauth_signature";
pub(crate) const OAUTH_TOKEN_KEY: &str = "oauth_token";
