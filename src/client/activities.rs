use http::header::HeaderMap;
use http::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::oauth::parse_endpoint;
use super::Client;
use crate::mapper;
use crate::{
    Comment, ConfigurationError, Error, Identifier, Person, Post, Result, SignError, API_PREFIX,
    OAUTH_TOKEN_INFO_URI,
};

const ME: &str = "@me";

/// The activity collections of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Feed {
    /// Posts the user authored (`@self`).
    #[default]
    Authored,
    /// Posts the user authored and made public (`@public`).
    Public,
    /// The user's home stream (`@consumption`).
    Consumption,
    /// Posts the user muted (`@muted`).
    Muted,
    /// Posts the user liked (`@liked`).
    Liked,
}

impl Feed {
    pub fn as_str(self) -> &'static str {
        match self {
            Feed::Authored => "@self",
            Feed::Public => "@public",
            Feed::Consumption => "@consumption",
            Feed::Muted => "@muted",
            Feed::Liked => "@liked",
        }
    }
}

/// `{API_PREFIX}/{segments..}?alt=json&{query..}`
fn endpoint(segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
    let mut url = parse_endpoint(API_PREFIX)?;
    if let Ok(mut path) = url.path_segments_mut() {
        path.extend(segments);
    }
    let mut pairs = vec![("alt", "json")];
    pairs.extend_from_slice(query);
    let query = serde_urlencoded::to_string(&pairs)
        .map_err(|e| SignError::MalformedQuery(e.to_string()))?;
    url.set_query(Some(&query));
    Ok(url)
}

impl Client {
    fn get_json(&self, url: &Url) -> Result<Value> {
        self.fetch_json(Method::GET, url)
    }

    fn fetch_json(&self, method: Method, url: &Url) -> Result<Value> {
        let response = self.fetch_api_response(method, url, HeaderMap::new())?;
        mapper::decode(response.body()).map_err(|e| e.at(url.as_str()).into())
    }

    /// Send a write request; only an error envelope in the answer matters.
    fn write(&self, method: Method, url: &Url) -> Result<()> {
        let response = self.fetch_api_response(method, url, HeaderMap::new())?;
        if response.body().iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        mapper::decode(response.body())
            .and_then(|json| mapper::check_response(&json))
            .map_err(|e| e.at(url.as_str()).into())
    }

    fn posts_at(&self, url: &Url) -> Result<Vec<Post>> {
        let json = self.get_json(url)?;
        let weak = self.downgrade();
        let posts = mapper::parse_posts(&json).map_err(|e| Error::from(e.at(url.as_str())))?;
        debug!(url = %url, count = posts.len(), "fetched posts");
        Ok(posts.into_iter().map(|post| post.attach(&weak)).collect())
    }

    /// The profile of `user_id` (`"@me"` for the authenticated user).
    pub fn user<'a, I>(&self, user_id: I) -> Result<Person>
    where
        I: Into<Identifier<'a>>,
    {
        if self.access_token().is_none() {
            return Err(ConfigurationError::MissingAccessToken.into());
        }
        let user_id = user_id.into();
        let url = endpoint(&["people", user_id.as_str(), "@self"], &[])?;
        let json = self.get_json(&url)?;
        let person = mapper::parse_person(&json).map_err(|e| Error::from(e.at(url.as_str())))?;
        Ok(person.attach(&self.downgrade()))
    }

    /// The authenticated user's profile.
    pub fn me(&self) -> Result<Person> {
        self.user(ME)
    }

    /// Search public posts by keywords and/or a `(latitude, longitude)` pair.
    pub fn search(&self, query: Option<&str>, geocode: Option<(&str, &str)>) -> Result<Vec<Post>> {
        let geocode = geocode.map(|(lat, lon)| format!("{},{}", lat, lon));
        let mut params = Vec::new();
        if let Some(query) = query {
            params.push(("q", query));
        }
        if let Some(ref geocode) = geocode {
            params.push(("geocode", geocode.as_str()));
        }
        let url = endpoint(&["activities", "search"], &params)?;
        self.posts_at(&url)
    }

    /// The `feed` collection of `user_id`.
    pub fn posts<'a, I>(&self, feed: Feed, user_id: I) -> Result<Vec<Post>>
    where
        I: Into<Identifier<'a>>,
    {
        let user_id = user_id.into();
        let url = endpoint(&["activities", user_id.as_str(), feed.as_str()], &[])?;
        self.posts_at(&url)
    }

    pub fn muted_posts(&self) -> Result<Vec<Post>> {
        self.posts(Feed::Muted, ME)
    }

    pub fn liked_posts<'a, I>(&self, user_id: I) -> Result<Vec<Post>>
    where
        I: Into<Identifier<'a>>,
    {
        self.posts(Feed::Liked, user_id)
    }

    pub fn comments<'a, A, P>(&self, actor_id: A, post_id: P) -> Result<Vec<Comment>>
    where
        A: Into<Identifier<'a>>,
        P: Into<Identifier<'a>>,
    {
        let (actor_id, post_id) = (actor_id.into(), post_id.into());
        let url = endpoint(
            &["activities", actor_id.as_str(), "@self", post_id.as_str(), "@comments"],
            &[],
        )?;
        let json = self.get_json(&url)?;
        let weak = self.downgrade();
        let comments =
            mapper::parse_comments(&json).map_err(|e| Error::from(e.at(url.as_str())))?;
        Ok(comments.into_iter().map(|c| c.attach(&weak)).collect())
    }

    pub fn likers<'a, A, P>(&self, actor_id: A, post_id: P) -> Result<Vec<Person>>
    where
        A: Into<Identifier<'a>>,
        P: Into<Identifier<'a>>,
    {
        let (actor_id, post_id) = (actor_id.into(), post_id.into());
        let url = endpoint(
            &["activities", actor_id.as_str(), "@self", post_id.as_str(), "@likers"],
            &[],
        )?;
        let json = self.get_json(&url)?;
        let weak = self.downgrade();
        let people = mapper::parse_people(&json).map_err(|e| Error::from(e.at(url.as_str())))?;
        Ok(people.into_iter().map(|p| p.attach(&weak)).collect())
    }

    fn mark<'a, A, P>(&self, method: Method, feed: Feed, actor_id: A, post_id: P) -> Result<()>
    where
        A: Into<Identifier<'a>>,
        P: Into<Identifier<'a>>,
    {
        let (actor_id, post_id) = (actor_id.into(), post_id.into());
        let url = endpoint(
            &["activities", actor_id.as_str(), feed.as_str(), post_id.as_str()],
            &[],
        )?;
        debug!(method = %method, url = %url, "updating post");
        self.write(method, &url)
    }

    pub fn like_post<'a, A, P>(&self, actor_id: A, post_id: P) -> Result<()>
    where
        A: Into<Identifier<'a>>,
        P: Into<Identifier<'a>>,
    {
        self.mark(Method::PUT, Feed::Liked, actor_id, post_id)
    }

    pub fn unlike_post<'a, A, P>(&self, actor_id: A, post_id: P) -> Result<()>
    where
        A: Into<Identifier<'a>>,
        P: Into<Identifier<'a>>,
    {
        self.mark(Method::DELETE, Feed::Liked, actor_id, post_id)
    }

    pub fn mute_post<'a, A, P>(&self, actor_id: A, post_id: P) -> Result<()>
    where
        A: Into<Identifier<'a>>,
        P: Into<Identifier<'a>>,
    {
        self.mark(Method::PUT, Feed::Muted, actor_id, post_id)
    }

    pub fn unmute_post<'a, A, P>(&self, actor_id: A, post_id: P) -> Result<()>
    where
        A: Into<Identifier<'a>>,
        P: Into<Identifier<'a>>,
    {
        self.mark(Method::DELETE, Feed::Muted, actor_id, post_id)
    }

    /// Raw description of the held access token, as reported by the
    /// authorization server.
    pub fn oauth_token_info(&self) -> Result<String> {
        if self.access_token().is_none() {
            return Err(ConfigurationError::MissingAccessToken.into());
        }
        let url = parse_endpoint(OAUTH_TOKEN_INFO_URI)?;
        let response = self.fetch_oauth_api_response(Method::GET, &url)?;
        Ok(String::from_utf8_lossy(response.body()).into_owned())
    }
}
