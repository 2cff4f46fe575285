use serde_json::Value;

use crate::model::{Comment, Person, Post};
use crate::{JsonParseError, ParseResult, RetrieveError};

const ERROR_KEY: &str = "error";
const MESSAGE_KEY: &str = "message";
const DATA_KEY: &str = "data";
const LIST_KEYS: [&str; 3] = ["items", "resource", "item"];
const VALUE_KEY: &str = "value";

/// Present and not `null`, `false`, `0`, `""`, `[]` or `{}`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn truthy<'v>(object: &'v Value, key: &str) -> Option<&'v Value> {
    object.get(key).filter(|v| is_truthy(v))
}

fn first_truthy<'v>(object: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter().find_map(|key| truthy(object, key))
}

fn string_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_string(object: &Value, key: &str) -> ParseResult<String> {
    let value = object
        .get(key)
        .ok_or_else(|| JsonParseError::missing(key, object))?;
    string_of(value).ok_or_else(|| {
        JsonParseError {
            key: Some(key.to_string()),
            ..JsonParseError::unexpected(format!("'{}' is not a scalar", key), object)
        }
        .into()
    })
}

/// A string, or an object carrying the string under `value`.
fn text(object: &Value, key: &str) -> ParseResult<Option<String>> {
    match object.get(key) {
        Some(nested @ Value::Object(_)) => required_string(nested, VALUE_KEY).map(Some),
        Some(value) if is_truthy(value) => Ok(string_of(value)),
        _ => Ok(None),
    }
}

/// A string, or the first element of a list of strings.
fn first_of(object: &Value, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::Array(list)) => list.first().and_then(string_of),
        Some(value) if is_truthy(value) => string_of(value),
        _ => None,
    }
}

fn check_error(value: &Value) -> ParseResult<()> {
    match truthy(value, ERROR_KEY) {
        Some(error) => {
            let message = match error.get(MESSAGE_KEY).and_then(string_of) {
                Some(message) => message,
                None => string_of(error).unwrap_or_else(|| error.to_string()),
            };
            Err(RetrieveError { uri: None, message }.into())
        }
        None => Ok(()),
    }
}

/// Decode a response body.
pub fn decode(body: &[u8]) -> ParseResult<Value> {
    serde_json::from_slice(body).map_err(|e| {
        JsonParseError::unexpected(
            format!("invalid JSON: {}", e),
            &Value::String(String::from_utf8_lossy(body).into_owned()),
        )
        .into()
    })
}

/// Peel the response envelope off `json`.
///
/// A truthy `data` member replaces the value, then a truthy `items`,
/// `resource` or `item` member (first present wins) replaces it again. An
/// `error` member at any stage short-circuits into a [`RetrieveError`].
pub fn unwrap_envelope(json: &Value) -> ParseResult<&Value> {
    if !json.is_object() {
        return Err(JsonParseError::unexpected("expected a JSON object", json).into());
    }
    check_error(json)?;

    let mut current = json;
    if let Some(data) = truthy(current, DATA_KEY) {
        current = data;
        check_error(current)?;
    }
    if current.is_object() {
        if let Some(inner) = first_truthy(current, &LIST_KEYS) {
            current = inner;
            check_error(current)?;
        }
    }
    Ok(current)
}

/// Fail with a [`RetrieveError`] if `json` is an error envelope.
///
/// Used for write operations whose success payload is ignored.
pub fn check_response(json: &Value) -> ParseResult<()> {
    if json.is_object() {
        unwrap_envelope(json)?;
    }
    Ok(())
}

pub fn parse_person(json: &Value) -> ParseResult<Person> {
    let object = unwrap_envelope(json)?;
    if !object.is_object() {
        return Err(JsonParseError::unexpected("expected a person object", object).into());
    }

    let uri = first_truthy(object, &["uri", "profileUrl"]).and_then(string_of);
    let id = match truthy(object, "id").and_then(string_of) {
        Some(id) => id,
        // profile URIs end with the user id
        None => match uri.as_deref().and_then(|u| u.rsplit_once('/')) {
            Some((_, tail)) => tail.to_string(),
            None => return Err(JsonParseError::missing("id", object).into()),
        },
    };
    let list = |key| match truthy(object, key) {
        Some(Value::Array(values)) => values.clone(),
        _ => Vec::new(),
    };

    Ok(Person {
        id,
        name: first_truthy(object, &["name", "displayName"]).and_then(string_of),
        uri,
        photo: first_truthy(object, &["photoUrl", "thumbnailUrl"]).and_then(string_of),
        uris: list("urls"),
        photos: list("photos"),
        json: json.clone(),
        client: Default::default(),
    })
}

fn parse_actor(object: &Value) -> ParseResult<Option<Person>> {
    first_truthy(object, &["author", "actor"])
        .map(parse_person)
        .transpose()
}

/// `content`, `{"content": {"value": ..}}` or `object.content`.
fn parse_content(object: &Value) -> ParseResult<Option<String>> {
    match text(object, "content")? {
        Some(content) => Ok(Some(content)),
        None => Ok(truthy(object, "object")
            .and_then(|o| truthy(o, "content"))
            .and_then(string_of)),
    }
}

pub fn parse_post(json: &Value) -> ParseResult<Post> {
    let object = unwrap_envelope(json)?;
    Ok(Post {
        id: required_string(object, "id")?,
        content: parse_content(object)?,
        title: text(object, "title")?,
        verb: first_of(object, "verb").or_else(|| first_of(object, "type")),
        actor: parse_actor(object)?,
        json: json.clone(),
        client: Default::default(),
        comments: Default::default(),
        likers: Default::default(),
    })
}

pub fn parse_comment(json: &Value) -> ParseResult<Comment> {
    let object = unwrap_envelope(json)?;
    Ok(Comment {
        id: required_string(object, "id")?,
        content: parse_content(object)?,
        actor: parse_actor(object)?,
        json: json.clone(),
        client: Default::default(),
    })
}

/// An omitted list means "no results".
fn parse_list<T>(json: &Value, parse: fn(&Value) -> ParseResult<T>) -> ParseResult<Vec<T>> {
    match unwrap_envelope(json)? {
        Value::Array(items) => items.iter().map(parse).collect(),
        _ => Ok(Vec::new()),
    }
}

pub fn parse_people(json: &Value) -> ParseResult<Vec<Person>> {
    parse_list(json, parse_person)
}

pub fn parse_posts(json: &Value) -> ParseResult<Vec<Post>> {
    parse_list(json, parse_post)
}

pub fn parse_comments(json: &Value) -> ParseResult<Vec<Comment>> {
    parse_list(json, parse_comment)
}
