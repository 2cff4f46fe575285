use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use http::{Request, Response};
use reqwest::blocking::Client as ReqwestClient;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The peer closed the connection, or it is busy with another request.
    /// Worth one retry on a fresh connection.
    #[error("connection is stale : {0}")]
    Stale(String),
    #[error("{0}")]
    Failed(String),
}

impl ConnectionError {
    pub fn is_stale(&self) -> bool {
        matches!(self, ConnectionError::Stale(_))
    }
}

/// A connection pinned to a single host.
pub trait Connection {
    fn host(&self) -> &str;

    fn send(&mut self, request: &Request<Vec<u8>>) -> Result<Response<Vec<u8>>, ConnectionError>;

    fn close(&mut self) {}
}

/// Opens connections on demand.
pub trait Connector {
    fn connect(&self, host: &str) -> Result<Box<dyn Connection>, ConnectionError>;
}

/// [`Connector`] backed by `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct ReqwestConnector {
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl ReqwestConnector {
    pub fn new() -> Self {
        ReqwestConnector {
            user_agent: None,
            timeout: None,
        }
    }

    pub fn user_agent<T: Into<String>>(self, user_agent: T) -> Self {
        ReqwestConnector {
            user_agent: Some(user_agent.into()),
            ..self
        }
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        ReqwestConnector {
            timeout: Some(timeout),
            ..self
        }
    }
}

impl Default for ReqwestConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for ReqwestConnector {
    fn connect(&self, host: &str) -> Result<Box<dyn Connection>, ConnectionError> {
        let mut builder = ReqwestClient::builder().https_only(true);
        if let Some(ref user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConnectionError::Failed(e.to_string()))?;
        debug!(host = %host, "opened connection");
        Ok(Box::new(ReqwestConnection {
            host: host.to_string(),
            client: Some(client),
        }))
    }
}

pub struct ReqwestConnection {
    host: String,
    client: Option<ReqwestClient>,
}

impl Connection for ReqwestConnection {
    fn host(&self) -> &str {
        &self.host
    }

    fn send(&mut self, request: &Request<Vec<u8>>) -> Result<Response<Vec<u8>>, ConnectionError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ConnectionError::Stale(format!("connection to {} is closed", self.host)))?;
        let resp = client
            .request(request.method().clone(), request.uri().to_string())
            .headers(request.headers().clone())
            .body(request.body().clone())
            .send()
            .map_err(classify)?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().map_err(classify)?;

        let mut response = Response::new(body.to_vec());
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(host = %self.host, "closed connection");
        }
    }
}

/// A connection the peer closed before answering, or reset, aborted or cut
/// short, means the pooled connection went away under us.
fn classify(err: reqwest::Error) -> ConnectionError {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_canceled() {
                return ConnectionError::Stale(err.to_string());
            }
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return ConnectionError::Stale(err.to_string());
            }
        }
        source = cause.source();
    }
    ConnectionError::Failed(err.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use http::{Request, Response, StatusCode};

    use super::{Connection, ConnectionError, Connector};

    pub(crate) type Outcome = Result<Response<Vec<u8>>, ConnectionError>;

    #[derive(Default)]
    pub(crate) struct Script {
        pub outcomes: VecDeque<Outcome>,
        pub requests: Vec<Request<Vec<u8>>>,
        pub connects: Vec<String>,
        pub closes: usize,
    }

    /// Plays back canned outcomes in order, recording what was sent.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedConnector {
        pub script: Rc<RefCell<Script>>,
        /// Host reported by every connection, overriding the requested one.
        pub reported_host: Option<String>,
    }

    impl ScriptedConnector {
        pub fn new() -> Self {
            Default::default()
        }

        pub fn push(&self, outcome: Outcome) -> &Self {
            self.script.borrow_mut().outcomes.push_back(outcome);
            self
        }

        pub fn push_json(&self, body: &str) -> &Self {
            self.push(Ok(response(200, body)))
        }

        pub fn requests(&self) -> Vec<Request<Vec<u8>>> {
            self.script.borrow().requests.clone()
        }

        pub fn connects(&self) -> Vec<String> {
            self.script.borrow().connects.clone()
        }

        pub fn closes(&self) -> usize {
            self.script.borrow().closes
        }
    }

    pub(crate) fn response(status: u16, body: &str) -> Response<Vec<u8>> {
        let mut resp = Response::new(body.as_bytes().to_vec());
        *resp.status_mut() = StatusCode::from_u16(status).unwrap();
        resp
    }

    struct ScriptedConnection {
        host: String,
        script: Rc<RefCell<Script>>,
    }

    impl Connector for ScriptedConnector {
        fn connect(&self, host: &str) -> Result<Box<dyn Connection>, ConnectionError> {
            self.script.borrow_mut().connects.push(host.to_string());
            Ok(Box::new(ScriptedConnection {
                host: self.reported_host.clone().unwrap_or_else(|| host.to_string()),
                script: self.script.clone(),
            }))
        }
    }

    impl Connection for ScriptedConnection {
        fn host(&self) -> &str {
            &self.host
        }

        fn send(&mut self, request: &Request<Vec<u8>>) -> Outcome {
            let mut script = self.script.borrow_mut();
            script.requests.push(request.clone());
            script
                .outcomes
                .pop_front()
                .unwrap_or_else(|| Err(ConnectionError::Failed("script exhausted".to_string())))
        }

        fn close(&mut self) {
            self.script.borrow_mut().closes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    /// Accepts one connection, reads the request head and hangs up without
    /// answering.
    fn hang_up_after_request() -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/buzz/v1", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 512];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
        });
        (url, handle)
    }

    #[test]
    fn peer_hang_up_is_stale() {
        let (url, server) = hang_up_after_request();
        let err = ReqwestClient::new().get(url).send().unwrap_err();
        let classified = classify(err);
        assert!(classified.is_stale(), "got {:?}", classified);
        server.join().unwrap();
    }

    #[test]
    fn refused_connection_is_failed() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let err = ReqwestClient::new()
            .get(format!("http://{}/", addr))
            .send()
            .unwrap_err();
        let classified = classify(err);
        assert!(!classified.is_stale(), "got {:?}", classified);
    }

    #[test]
    fn closed_connection_reports_stale() {
        let mut conn = ReqwestConnector::new()
            .user_agent("buzz-oauth1-test")
            .connect("www.googleapis.com")
            .unwrap();
        assert_eq!(conn.host(), "www.googleapis.com");
        conn.close();
        let request = Request::get("https://www.googleapis.com/buzz/v1")
            .body(Vec::new())
            .unwrap();
        assert!(conn.send(&request).unwrap_err().is_stale());
    }
}
