use std::fmt;

use serde::Deserialize;

const ANONYMOUS: &str = "anonymous";

/// Identity of the registered application.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Consumer {
    key: String,
    secret: String,
}

impl Consumer {
    pub fn new<TKey, TSecret>(key: TKey, secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        Consumer {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// The consumer the provider accepts for unregistered applications.
    pub fn anonymous() -> Self {
        Consumer::new(ANONYMOUS, ANONYMOUS)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A request token or an access token.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Token {
    key: String,
    secret: String,
}

impl Token {
    pub fn new<TKey, TSecret>(key: TKey, secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        Token {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

pub trait SecretsProvider {
    fn get_consumer_key_pair(&self) -> (&str, &str);

    fn get_token_pair_option(&self) -> Option<(&str, &str)>;

    fn get_token_option_pair(&self) -> (Option<&str>, Option<&str>) {
        self.get_token_pair_option()
            .map(|s| (Some(s.0), Some(s.1)))
            .unwrap_or((None, None))
    }
}

/// Borrowed view over the credentials a single request is signed with.
#[derive(Debug, Clone, Copy)]
pub struct Secrets<'a> {
    consumer: &'a Consumer,
    token: Option<&'a Token>,
}

impl<'a> Secrets<'a> {
    pub fn new(consumer: &'a Consumer) -> Self {
        Secrets {
            consumer,
            token: None,
        }
    }

    pub fn token(self, token: &'a Token) -> Self {
        Secrets {
            token: Some(token),
            ..self
        }
    }

    pub fn token_option(self, token: Option<&'a Token>) -> Self {
        Secrets { token, ..self }
    }
}

impl SecretsProvider for Secrets<'_> {
    fn get_consumer_key_pair(&self) -> (&str, &str) {
        (self.consumer.key(), self.consumer.secret())
    }

    fn get_token_pair_option(&self) -> Option<(&str, &str)> {
        self.token.map(|t| (t.key(), t.secret()))
    }
}
