use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request, Response};
use tracing::{debug, warn};
use url::Url;

use crate::transport::{Connection, ConnectionError, Connector, ReqwestConnector};
use crate::{
    ClientConfig, ConfigurationError, Consumer, Error, OAuthParameters, Result, SignedRequest,
    Token, API_HOST, OAUTH_HOST,
};

mod activities;
mod oauth;

pub use activities::Feed;

const NO_EXTRA: &[(&str, &str)] = &[];

/// Where the client stands in the three-legged token exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    NoToken,
    RequestTokenObtained,
    AccessTokenObtained,
}

/// The two hosts the client keeps a connection to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pinned {
    Api,
    OAuth,
}

impl Pinned {
    fn host(self) -> &'static str {
        match self {
            Pinned::Api => API_HOST,
            Pinned::OAuth => OAUTH_HOST,
        }
    }
}

type Slot = RefCell<Option<Box<dyn Connection>>>;

struct ClientInner {
    connector: Box<dyn Connector>,
    api_connection: Slot,
    oauth_connection: Slot,
    consumer: RefCell<Option<Consumer>>,
    request_token: RefCell<Option<Token>>,
    access_token: RefCell<Option<Token>>,
    scopes: RefCell<Vec<String>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        for slot in [&mut self.api_connection, &mut self.oauth_connection] {
            if let Some(mut connection) = slot.get_mut().take() {
                connection.close();
            }
        }
    }
}

/// Blocking client for the activity-stream API.
///
/// `Client` is a cheap handle: clones share credentials and connections.
/// Records fetched through it keep a weak reference back, so their lazy
/// operations keep working for as long as one handle is alive.
#[derive(Clone)]
pub struct Client {
    inner: Rc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("consumer", &self.inner.consumer.borrow())
            .field("state", &self.handshake_state())
            .field("scopes", &self.inner.scopes.borrow())
            .finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new(ClientConfig::default())
    }
}

impl Client {
    /// Constructs a new `Client` talking over `reqwest`.
    pub fn new(config: ClientConfig) -> Self {
        let mut connector = ReqwestConnector::new();
        if let Some(ref user_agent) = config.user_agent {
            connector = connector.user_agent(user_agent.clone());
        }
        Client::with_connector(config, connector)
    }

    /// Constructs a new `Client` with a custom [`Connector`].
    pub fn with_connector<C>(config: ClientConfig, connector: C) -> Self
    where
        C: Connector + 'static,
    {
        Client {
            inner: Rc::new(ClientInner {
                connector: Box::new(connector),
                api_connection: RefCell::new(None),
                oauth_connection: RefCell::new(None),
                consumer: RefCell::new(config.consumer),
                request_token: RefCell::new(None),
                access_token: RefCell::new(config.access_token),
                scopes: RefCell::new(config.scopes),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakClient {
        WeakClient(Rc::downgrade(&self.inner))
    }

    pub fn consumer(&self) -> Option<Consumer> {
        self.inner.consumer.borrow().clone()
    }

    pub fn set_consumer(&self, consumer: Consumer) {
        *self.inner.consumer.borrow_mut() = Some(consumer);
    }

    pub fn request_token(&self) -> Option<Token> {
        self.inner.request_token.borrow().clone()
    }

    pub fn set_request_token(&self, token: Token) {
        *self.inner.request_token.borrow_mut() = Some(token);
    }

    pub fn access_token(&self) -> Option<Token> {
        self.inner.access_token.borrow().clone()
    }

    pub fn set_access_token(&self, token: Token) {
        *self.inner.access_token.borrow_mut() = Some(token);
    }

    pub fn scopes(&self) -> Vec<String> {
        self.inner.scopes.borrow().clone()
    }

    /// Request `scope` during the next handshake.
    pub fn add_scope<T: Into<String>>(&self, scope: T) {
        let scope = scope.into();
        let mut scopes = self.inner.scopes.borrow_mut();
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }

    pub fn handshake_state(&self) -> HandshakeState {
        if self.inner.access_token.borrow().is_some() {
            HandshakeState::AccessTokenObtained
        } else if self.inner.request_token.borrow().is_some() {
            HandshakeState::RequestTokenObtained
        } else {
            HandshakeState::NoToken
        }
    }

    /// Send a request to the resource API.
    ///
    /// The request is signed when an access token is held; without one it
    /// goes out unsigned. Stale connections are retried once.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigurationError::MissingConsumer`] when no consumer is
    /// configured, and with [`ConfigurationError::HostMismatch`] when `url`
    /// does not point at the resource host.
    pub fn fetch_api_response(
        &self,
        method: Method,
        url: &Url,
        headers: HeaderMap,
    ) -> Result<Response<Vec<u8>>> {
        let request = self.signed_request(method, url, headers)?;
        self.send(Pinned::Api, &request)
    }

    /// A signed request to the authorization host, sent without retrying.
    pub(crate) fn fetch_oauth_api_response(
        &self,
        method: Method,
        url: &Url,
    ) -> Result<Response<Vec<u8>>> {
        let request = self.signed_request(method, url, HeaderMap::new())?;
        self.send_single(Pinned::OAuth, &request)
    }

    fn signed_request(
        &self,
        method: Method,
        url: &Url,
        headers: HeaderMap,
    ) -> Result<Request<Vec<u8>>> {
        let consumer = self.consumer().ok_or(ConfigurationError::MissingConsumer)?;

        let mut request = Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .body(Vec::new())?;
        request.headers_mut().extend(headers);
        if let Some(token) = self.access_token() {
            let signed = SignedRequest::build(
                method,
                url,
                Some(&consumer),
                Some(&token),
                &OAuthParameters::new().version(true),
                NO_EXTRA,
            )?;
            let authorization =
                HeaderValue::from_str(&signed.to_header()).map_err(http::Error::from)?;
            request.headers_mut().insert(AUTHORIZATION, authorization);
        }

        debug!(method = %request.method(), url = %url, "fetching");
        Ok(request)
    }

    /// POST a signed token-exchange request as a form body.
    fn fetch_oauth_response(&self, signed: &SignedRequest) -> Result<Response<Vec<u8>>> {
        let request = Request::builder()
            .method(signed.method().clone())
            .uri(signed.url().as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(signed.to_postdata().into_bytes())?;
        debug!(url = %signed.url(), "fetching token");
        self.send(Pinned::OAuth, &request)
    }

    fn slot(&self, pinned: Pinned) -> &Slot {
        match pinned {
            Pinned::Api => &self.inner.api_connection,
            Pinned::OAuth => &self.inner.oauth_connection,
        }
    }

    /// Send over the pinned connection, retrying once on a fresh connection
    /// when the current one turns out to be stale.
    fn send(&self, pinned: Pinned, request: &Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        check_host(pinned, request)?;
        match self.send_once(pinned, request)? {
            Ok(response) => Ok(response),
            Err(e) if e.is_stale() => {
                warn!(host = pinned.host(), error = %e, "stale connection, reconnecting once");
                self.reset(pinned);
                self.send_once(pinned, request)?.map_err(Error::from)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Send over the pinned connection once. A stale connection is dropped
    /// so the next call starts on a fresh one.
    fn send_single(&self, pinned: Pinned, request: &Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        check_host(pinned, request)?;
        self.send_once(pinned, request)?.map_err(|e| {
            if e.is_stale() {
                self.reset(pinned);
            }
            Error::from(e)
        })
    }

    /// The outer result carries connect and configuration failures, the
    /// inner one what happened on the wire.
    fn send_once(
        &self,
        pinned: Pinned,
        request: &Request<Vec<u8>>,
    ) -> Result<std::result::Result<Response<Vec<u8>>, ConnectionError>> {
        let host = pinned.host();
        let mut slot = self.slot(pinned).borrow_mut();
        let connection = match slot.take() {
            Some(connection) => connection,
            None => self.inner.connector.connect(host)?,
        };
        let connection = slot.insert(connection);
        if connection.host() != host {
            return Err(ConfigurationError::HostMismatch {
                expected: host.to_string(),
                actual: connection.host().to_string(),
            }
            .into());
        }
        Ok(connection.send(request))
    }

    fn reset(&self, pinned: Pinned) {
        if let Some(mut connection) = self.slot(pinned).borrow_mut().take() {
            connection.close();
        }
    }
}

fn check_host(pinned: Pinned, request: &Request<Vec<u8>>) -> Result<()> {
    let expected = pinned.host();
    let actual = request.uri().host().unwrap_or_default();
    if actual != expected {
        return Err(ConfigurationError::HostMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Handle held by records on the client that fetched them.
#[derive(Clone, Default)]
pub(crate) struct WeakClient(Weak<ClientInner>);

impl WeakClient {
    pub(crate) fn upgrade(&self) -> Result<Client> {
        match self.0.upgrade() {
            Some(inner) => Ok(Client { inner }),
            None => Err(ConfigurationError::ClientDropped.into()),
        }
    }
}

impl fmt::Debug for WeakClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakClient")
            .field(&(self.0.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::testing::{response, ScriptedConnector};

    pub(crate) fn authorized_client() -> (Client, ScriptedConnector) {
        let connector = ScriptedConnector::new();
        let config = ClientConfig::default()
            .consumer(Consumer::new("key", "secret"))
            .access_token(Token::new("token", "token-secret"));
        (Client::with_connector(config, connector.clone()), connector)
    }

    fn api_url() -> Url {
        Url::parse("https://www.googleapis.com/buzz/v1/activities/@me/@self?alt=json").unwrap()
    }

    fn stale() -> std::result::Result<Response<Vec<u8>>, ConnectionError> {
        Err(ConnectionError::Stale("connection reset by peer".to_string()))
    }

    #[test]
    fn signs_when_access_token_held() {
        let (client, connector) = authorized_client();
        connector.push_json("{}");
        client
            .fetch_api_response(Method::GET, &api_url(), HeaderMap::new())
            .unwrap();

        let requests = connector.requests();
        let authorization = requests[0].headers()[AUTHORIZATION].to_str().unwrap();
        assert!(authorization.starts_with("OAuth "));
        assert!(authorization.contains("oauth_token=\"token\""));
        assert!(authorization.contains("oauth_version=\"1.0\""));
        assert_eq!(requests[0].uri().to_string(), api_url().as_str());
        assert_eq!(connector.connects(), vec![API_HOST]);
    }

    #[test]
    fn unsigned_without_access_token() {
        let connector = ScriptedConnector::new();
        let client = Client::with_connector(
            ClientConfig::default().consumer(Consumer::anonymous()),
            connector.clone(),
        );
        connector.push_json("{}");
        client
            .fetch_api_response(Method::GET, &api_url(), HeaderMap::new())
            .unwrap();
        assert!(connector.requests()[0].headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn missing_consumer() {
        let connector = ScriptedConnector::new();
        let client = Client::with_connector(ClientConfig::default(), connector.clone());
        let result = client.fetch_api_response(Method::GET, &api_url(), HeaderMap::new());
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::MissingConsumer))
        ));
        assert!(connector.requests().is_empty());
    }

    #[test]
    fn connection_is_reused() {
        let (client, connector) = authorized_client();
        connector.push_json("{}").push_json("{}");
        for _ in 0..2 {
            client
                .fetch_api_response(Method::GET, &api_url(), HeaderMap::new())
                .unwrap();
        }
        assert_eq!(connector.connects().len(), 1);
        assert_eq!(connector.requests().len(), 2);
    }

    #[test]
    fn stale_connection_is_retried_once() {
        let (client, connector) = authorized_client();
        connector.push(stale()).push(Ok(response(200, "{\"ok\":1}")));
        let resp = client
            .fetch_api_response(Method::GET, &api_url(), HeaderMap::new())
            .unwrap();
        assert_eq!(resp.body(), b"{\"ok\":1}");
        assert_eq!(connector.requests().len(), 2);
        assert_eq!(connector.connects().len(), 2);
        assert_eq!(connector.closes(), 1);
    }

    #[test]
    fn second_stale_failure_surfaces() {
        let (client, connector) = authorized_client();
        connector.push(stale()).push(stale()).push_json("{}");
        let result = client.fetch_api_response(Method::GET, &api_url(), HeaderMap::new());
        assert!(matches!(result, Err(Error::Transport(ConnectionError::Stale(_)))));
        assert_eq!(connector.requests().len(), 2);
    }

    #[test]
    fn other_failures_are_not_retried() {
        let (client, connector) = authorized_client();
        connector
            .push(Err(ConnectionError::Failed("dns".to_string())))
            .push_json("{}");
        let result = client.fetch_api_response(Method::GET, &api_url(), HeaderMap::new());
        assert!(matches!(result, Err(Error::Transport(ConnectionError::Failed(_)))));
        assert_eq!(connector.requests().len(), 1);
    }

    #[test]
    fn connection_for_wrong_host() {
        let connector = ScriptedConnector {
            reported_host: Some("evil.example.com".to_string()),
            ..ScriptedConnector::new()
        };
        let client = Client::with_connector(
            ClientConfig::default().consumer(Consumer::anonymous()),
            connector.clone(),
        );
        let result = client.fetch_api_response(Method::GET, &api_url(), HeaderMap::new());
        match result {
            Err(Error::Configuration(ConfigurationError::HostMismatch { expected, actual })) => {
                assert_eq!(expected, API_HOST);
                assert_eq!(actual, "evil.example.com");
            }
            other => panic!("expected HostMismatch, got {:?}", other),
        }
        assert!(connector.requests().is_empty());
    }

    #[test]
    fn request_for_wrong_host() {
        let (client, connector) = authorized_client();
        let url = Url::parse("https://www.google.com/accounts/AuthSubTokenInfo").unwrap();
        let result = client.fetch_api_response(Method::GET, &url, HeaderMap::new());
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::HostMismatch { .. }))
        ));
        assert!(connector.connects().is_empty());
    }

    #[test]
    fn connections_close_on_drop() {
        let (client, connector) = authorized_client();
        connector.push_json("{}");
        client
            .fetch_api_response(Method::GET, &api_url(), HeaderMap::new())
            .unwrap();
        let other = client.clone();
        drop(client);
        assert_eq!(connector.closes(), 0);
        drop(other);
        assert_eq!(connector.closes(), 1);
    }

    #[test]
    fn handshake_state_follows_tokens() {
        let client = Client::with_connector(ClientConfig::default(), ScriptedConnector::new());
        assert_eq!(client.handshake_state(), HandshakeState::NoToken);
        client.set_request_token(Token::new("r", "rs"));
        assert_eq!(client.handshake_state(), HandshakeState::RequestTokenObtained);
        client.set_access_token(Token::new("a", "as"));
        assert_eq!(client.handshake_state(), HandshakeState::AccessTokenObtained);
    }
}
