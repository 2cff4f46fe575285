use std::borrow::Cow;
use std::cell::OnceCell;

use serde_json::Value;

use crate::client::{Feed, WeakClient};
use crate::{ConfigurationError, Result};

#[derive(Debug, Clone)]
pub struct Person {
    pub id: String,
    pub name: Option<String>,
    /// Profile URI.
    pub uri: Option<String>,
    pub photo: Option<String>,
    /// Raw `urls` entries.
    pub uris: Vec<Value>,
    /// Raw `photos` entries.
    pub photos: Vec<Value>,
    /// The payload this record was mapped from.
    pub json: Value,
    pub(crate) client: WeakClient,
}

impl Person {
    /// Posts authored by this person.
    pub fn posts(&self) -> Result<Vec<Post>> {
        self.client.upgrade()?.posts(Feed::Authored, self)
    }

    pub(crate) fn attach(mut self, client: &WeakClient) -> Self {
        self.client = client.clone();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub content: Option<String>,
    pub title: Option<String>,
    pub verb: Option<String>,
    pub actor: Option<Person>,
    pub json: Value,
    pub(crate) client: WeakClient,
    pub(crate) comments: OnceCell<Vec<Comment>>,
    pub(crate) likers: OnceCell<Vec<Person>>,
}

impl Post {
    fn actor_id(&self) -> Result<&str> {
        match self.actor {
            Some(ref actor) => Ok(actor.id.as_str()),
            None => Err(ConfigurationError::MissingActor.into()),
        }
    }

    /// Comments on this post, fetched on first use and cached afterwards.
    pub fn comments(&self) -> Result<&[Comment]> {
        if let Some(comments) = self.comments.get() {
            return Ok(comments);
        }
        let comments = self
            .client
            .upgrade()?
            .comments(self.actor_id()?, self)?;
        Ok(self.comments.get_or_init(|| comments))
    }

    /// People who liked this post, fetched on first use and cached afterwards.
    pub fn likers(&self) -> Result<&[Person]> {
        if let Some(likers) = self.likers.get() {
            return Ok(likers);
        }
        let likers = self.client.upgrade()?.likers(self.actor_id()?, self)?;
        Ok(self.likers.get_or_init(|| likers))
    }

    pub fn like(&self) -> Result<()> {
        self.client.upgrade()?.like_post(self.actor_id()?, self)
    }

    pub fn unlike(&self) -> Result<()> {
        self.client.upgrade()?.unlike_post(self.actor_id()?, self)
    }

    pub fn mute(&self) -> Result<()> {
        self.client.upgrade()?.mute_post(self.actor_id()?, self)
    }

    pub fn unmute(&self) -> Result<()> {
        self.client.upgrade()?.unmute_post(self.actor_id()?, self)
    }

    pub(crate) fn attach(mut self, client: &WeakClient) -> Self {
        self.actor = self.actor.map(|actor| actor.attach(client));
        self.client = client.clone();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub content: Option<String>,
    pub actor: Option<Person>,
    pub json: Value,
    pub(crate) client: WeakClient,
}

impl Comment {
    pub(crate) fn attach(mut self, client: &WeakClient) -> Self {
        self.actor = self.actor.map(|actor| actor.attach(client));
        self.client = client.clone();
        self
    }
}

/// Anything that names a user or a post in a request path.
#[derive(Debug, Clone)]
pub enum Identifier<'a> {
    Raw(Cow<'a, str>),
    Person(&'a Person),
    Post(&'a Post),
}

impl Identifier<'_> {
    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Raw(id) => id.as_ref(),
            Identifier::Person(person) => person.id.as_str(),
            Identifier::Post(post) => post.id.as_str(),
        }
    }
}

impl<'a> From<&'a str> for Identifier<'a> {
    fn from(id: &'a str) -> Self {
        Identifier::Raw(Cow::Borrowed(id))
    }
}

impl<'a> From<&'a String> for Identifier<'a> {
    fn from(id: &'a String) -> Self {
        Identifier::Raw(Cow::Borrowed(id))
    }
}

impl From<String> for Identifier<'_> {
    fn from(id: String) -> Self {
        Identifier::Raw(Cow::Owned(id))
    }
}

impl<'a> From<&'a Person> for Identifier<'a> {
    fn from(person: &'a Person) -> Self {
        Identifier::Person(person)
    }
}

impl<'a> From<&'a Post> for Identifier<'a> {
    fn from(post: &'a Post) -> Self {
        Identifier::Post(post)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mapper::{parse_person, parse_post};
    use crate::Error;

    #[test]
    fn identifiers() {
        let person = parse_person(&json!({"id": "123"})).unwrap();
        let post = parse_post(&json!({"id": "tag:p1"})).unwrap();
        let owned = String::from("@me");

        assert_eq!(Identifier::from("@me").as_str(), "@me");
        assert_eq!(Identifier::from(&owned).as_str(), "@me");
        assert_eq!(Identifier::from(owned.clone()).as_str(), "@me");
        assert_eq!(Identifier::from(&person).as_str(), "123");
        assert_eq!(Identifier::from(&post).as_str(), "tag:p1");
    }

    #[test]
    fn detached_records_report_dropped_client() {
        let post = parse_post(&json!({"id": "1", "actor": {"id": "2"}})).unwrap();
        assert!(matches!(
            post.comments(),
            Err(Error::Configuration(ConfigurationError::ClientDropped))
        ));
        assert!(matches!(
            post.actor.as_ref().unwrap().posts(),
            Err(Error::Configuration(ConfigurationError::ClientDropped))
        ));
    }
}
