use serde::Deserialize;

use crate::{Consumer, Result, Token};

/// Credentials and settings a [`Client`](crate::Client) starts with.
///
/// Every field is optional, so a partial TOML table still loads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub consumer: Option<Consumer>,
    /// A previously obtained access token; skips the handshake entirely.
    pub access_token: Option<Token>,
    /// Scopes requested during the handshake.
    pub scopes: Vec<String>,
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn consumer(self, consumer: Consumer) -> Self {
        ClientConfig {
            consumer: Some(consumer),
            ..self
        }
    }

    pub fn access_token(self, access_token: Token) -> Self {
        ClientConfig {
            access_token: Some(access_token),
            ..self
        }
    }

    /// Add a scope unless it is already requested.
    pub fn scope<T: Into<String>>(mut self, scope: T) -> Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    pub fn user_agent<T: Into<String>>(self, user_agent: T) -> Self {
        ClientConfig {
            user_agent: Some(user_agent.into()),
            ..self
        }
    }
}
