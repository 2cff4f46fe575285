use std::collections::HashMap;

use http::{Response, StatusCode};
use serde::Deserialize;

use crate::{Error, Result, Token, TokenReaderError, TokenReaderResult, OAUTH_TOKEN_KEY};

const OAUTH_TOKEN_SECRET_KEY: &str = "oauth_token_secret";

/// Represents response of token acquisition.
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    /// OAuth Token
    pub oauth_token: String,
    /// OAuth Token Secret
    pub oauth_token_secret: String,
    /// Other contents
    #[serde(flatten)]
    pub remain: HashMap<String, String>,
}

impl TokenResponse {
    pub fn into_token(self) -> Token {
        Token::new(self.oauth_token, self.oauth_token_secret)
    }
}

/// Add parse_oauth_token feature to a raw authorization-server response.
pub trait TokenReader: private::Sealed {
    fn parse_oauth_token(self) -> Result<TokenResponse>;
}

impl TokenReader for Response<Vec<u8>> {
    fn parse_oauth_token(self) -> Result<TokenResponse> {
        let status = self.status();
        let text = String::from_utf8_lossy(self.body()).into_owned();
        if status != StatusCode::OK {
            return Err(Error::TokenExchangeFailed {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(read_oauth_token(text)?)
    }
}

fn read_oauth_token(text: String) -> TokenReaderResult<TokenResponse> {
    let mut destructured = url::form_urlencoded::parse(text.as_bytes())
        .into_owned()
        .collect::<HashMap<String, String>>();
    let oauth_token = destructured.remove(OAUTH_TOKEN_KEY);
    let oauth_token_secret = destructured.remove(OAUTH_TOKEN_SECRET_KEY);
    match (oauth_token, oauth_token_secret) {
        (Some(t), Some(s)) => Ok(TokenResponse {
            oauth_token: t,
            oauth_token_secret: s,
            remain: destructured,
        }),
        (None, _) => Err(TokenReaderError::TokenKeyNotFound(OAUTH_TOKEN_KEY, text)),
        (_, _) => Err(TokenReaderError::TokenKeyNotFound(
            OAUTH_TOKEN_SECRET_KEY,
            text,
        )),
    }
}

mod private {
    use http::Response;

    pub trait Sealed {}
    impl Sealed for Response<Vec<u8>> {}
}

#[cfg(test)]
mod test {

    use super::*;

    fn response(status: u16, body: &str) -> Response<Vec<u8>> {
        let mut resp = Response::new(body.as_bytes().to_vec());
        *resp.status_mut() = StatusCode::from_u16(status).unwrap();
        resp
    }

    #[test]
    fn parse_response_typical() {
        let resp_str_sample = "oauth_token=Z6eEdO8MOmk394WozF5oKyuAv855l4Mlqo7hhlSLik&oauth_token_secret=Kd75W4OQfb2oJTV0vzGzeXftVAwgMnEK9MumzYcM&oauth_callback_confirmed=true";
        for parsed in &[
            read_oauth_token(resp_str_sample.to_string()).unwrap(),
            serde_urlencoded::from_str::<TokenResponse>(resp_str_sample).unwrap(),
            response(200, resp_str_sample).parse_oauth_token().unwrap(),
        ] {
            assert_eq!(
                parsed.oauth_token,
                "Z6eEdO8MOmk394WozF5oKyuAv855l4Mlqo7hhlSLik"
            );
            assert_eq!(
                parsed.oauth_token_secret,
                "Kd75W4OQfb2oJTV0vzGzeXftVAwgMnEK9MumzYcM"
            );
            assert_eq!(parsed.remain.len(), 1);
            let oauth_callback_confirmed = parsed.remain.get("oauth_callback_confirmed").unwrap();
            assert_eq!(oauth_callback_confirmed, "true");
        }
    }

    #[test]
    fn parse_response_encoded() {
        let parsed = read_oauth_token("oauth_token=4%2FabC&oauth_token_secret=x%2By".to_string())
            .unwrap()
            .into_token();
        assert_eq!(parsed, Token::new("4/abC", "x+y"));
    }

    #[test]
    fn parse_response_edge() {
        let resp_str_sample = "oauth_token==&oauth_token_secret=&keyonly=&keyonly2&=&&";
        for parsed in &[
            read_oauth_token(resp_str_sample.to_string()).unwrap(),
            serde_urlencoded::from_str::<TokenResponse>(resp_str_sample).unwrap(),
        ] {
            assert_eq!(parsed.oauth_token, "=");
            assert_eq!(parsed.oauth_token_secret, "");
            assert_eq!(parsed.remain.len(), 3);
            let keyonly = parsed.remain.get("keyonly").unwrap();
            assert_eq!(keyonly, "");
            let keyonly2 = parsed.remain.get("keyonly2").unwrap();
            assert_eq!(keyonly2, "");
            let empty = parsed.remain.get("").unwrap();
            assert_eq!(empty, "");
        }
    }

    #[test]
    fn parse_token_notfound() {
        let resp_str_sample = "oauth_token_secret=";
        let parsed = read_oauth_token(resp_str_sample.to_string());
        if let Err(TokenReaderError::TokenKeyNotFound(key, resp_str)) = parsed {
            assert_eq!(key, OAUTH_TOKEN_KEY);
            assert_eq!(resp_str, resp_str_sample)
        } else {
            panic!("expected TokenKeyNotFound, got {:?}", parsed)
        }
    }

    #[test]
    fn parse_token_secret_notfound() {
        let resp_str_sample = "oauth_token=";
        let parsed = read_oauth_token(resp_str_sample.to_string());
        if let Err(TokenReaderError::TokenKeyNotFound(key, resp_str)) = parsed {
            assert_eq!(key, OAUTH_TOKEN_SECRET_KEY);
            assert_eq!(resp_str, resp_str_sample)
        } else {
            panic!("expected TokenKeyNotFound, got {:?}", parsed)
        }
    }

    #[test]
    fn non_200_is_token_exchange_failure() {
        let parsed = response(400, "signature_invalid").parse_oauth_token();
        match parsed {
            Err(Error::TokenExchangeFailed { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "signature_invalid");
            }
            other => panic!("expected TokenExchangeFailed, got {:?}", other),
        }
    }
}
