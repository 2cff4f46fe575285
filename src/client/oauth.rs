use http::Method;
use tracing::debug;
use url::Url;

use super::{Client, NO_EXTRA};
use crate::{
    ConfigurationError, OAuthParameters, Result, SignError, SignedRequest, Token, TokenReader,
    OAUTH_ACCESS_TOKEN_URI, OAUTH_AUTHORIZATION_URI, OAUTH_REQUEST_TOKEN_URI, OAUTH_TOKEN_KEY,
    SCOPE_KEY,
};

const DOMAIN_KEY: &str = "domain";

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint).map_err(|e| SignError::InvalidUrl(endpoint.to_string(), e).into())
}

impl Client {
    /// Obtain a request token, sending `callback_uri` as `oauth_callback`.
    ///
    /// A request token (or access token) already held is returned without
    /// touching the network.
    pub fn fetch_request_token(&self, callback_uri: &str) -> Result<Token> {
        if let Some(token) = self.access_token().or_else(|| self.request_token()) {
            return Ok(token);
        }
        let consumer = self.consumer().ok_or(ConfigurationError::MissingConsumer)?;

        let scope = self.scopes().join(" ");
        let parameters = OAuthParameters::new()
            .version(true)
            .callback(callback_uri)
            .scope(scope);
        let endpoint = parse_endpoint(OAUTH_REQUEST_TOKEN_URI)?;
        let signed = SignedRequest::build(
            Method::POST,
            &endpoint,
            Some(&consumer),
            None,
            &parameters,
            NO_EXTRA,
        )?;

        let token = self.fetch_oauth_response(&signed)?.parse_oauth_token()?.into_token();
        debug!("obtained request token");
        self.set_request_token(token.clone());
        Ok(token)
    }

    /// The page the user visits to authorize `token` (or the held request
    /// token).
    pub fn authorization_url(&self, token: Option<&Token>) -> Result<Url> {
        let token = match token {
            Some(token) => token.clone(),
            None => self
                .request_token()
                .ok_or(ConfigurationError::MissingRequestToken)?,
        };
        let consumer = self.consumer().ok_or(ConfigurationError::MissingConsumer)?;

        let mut url = parse_endpoint(OAUTH_AUTHORIZATION_URI)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(OAUTH_TOKEN_KEY, token.key())
                .append_pair(DOMAIN_KEY, consumer.key());
            for scope in self.scopes() {
                query.append_pair(SCOPE_KEY, &scope);
            }
        }
        Ok(url)
    }

    /// Trade the authorized request token and `verifier` for an access token.
    ///
    /// An access token already held is returned without touching the
    /// network.
    pub fn fetch_access_token(&self, verifier: &str, token: Option<&Token>) -> Result<Token> {
        if let Some(token) = self.access_token() {
            return Ok(token);
        }
        let request_token = match token {
            Some(token) => token.clone(),
            None => self
                .request_token()
                .ok_or(ConfigurationError::MissingRequestToken)?,
        };
        let consumer = self.consumer().ok_or(ConfigurationError::MissingConsumer)?;

        let parameters = OAuthParameters::new().version(true).verifier(verifier);
        let endpoint = parse_endpoint(OAUTH_ACCESS_TOKEN_URI)?;
        let signed = SignedRequest::build(
            Method::POST,
            &endpoint,
            Some(&consumer),
            Some(&request_token),
            &parameters,
            NO_EXTRA,
        )?;

        let token = self.fetch_oauth_response(&signed)?.parse_oauth_token()?.into_token();
        debug!("obtained access token");
        self.set_access_token(token.clone());
        Ok(token)
    }
}
