use chrono::{DateTime, Utc};
use url::Url;

use crate::decode::{
    optional, optional_date, required, required_date, required_items, required_object,
    required_url, DecodeError, FromJson, JsonObject,
};

/// One page of a search response: the server-side total plus the items
/// carried by this page. `items.len()` is at most one page's worth and
/// may be far smaller than `total_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<T> {
    pub total_count: u64,
    pub incomplete_results: bool,
    pub items: Vec<T>,
}

impl<T: FromJson> FromJson for SearchResult<T> {
    fn from_json(json: &JsonObject) -> Result<Self, DecodeError> {
        Ok(SearchResult {
            total_count: required(json, "total_count")?,
            incomplete_results: required(json, "incomplete_results")?,
            items: required_items(json, "items")?,
        })
    }
}

/// A repository as returned by the GitHub search API.
/// Field names follow GitHub's wire spelling; `is_private` and
/// `owner.kind` rename the reserved words `private` and `type`.
#[derive(Debug, Clone, PartialEq)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub is_private: bool,
    pub html_url: Url,
    pub description: Option<String>,
    pub fork: bool,
    pub url: Url,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub homepage: Option<String>,
    pub size: u64,
    pub stargazers_count: u64,
    pub watchers_count: u64,
    pub language: Option<String>,
    pub forks_count: u64,
    pub open_issues_count: u64,
    pub master_branch: Option<String>,
    pub default_branch: String,
    pub score: f64,
    pub owner: Owner,
}

impl FromJson for Repository {
    fn from_json(json: &JsonObject) -> Result<Self, DecodeError> {
        Ok(Repository {
            id: required(json, "id")?,
            name: required(json, "name")?,
            full_name: required(json, "full_name")?,
            is_private: required(json, "private")?,
            html_url: required_url(json, "html_url")?,
            description: optional(json, "description")?,
            fork: required(json, "fork")?,
            url: required_url(json, "url")?,
            created_at: required_date(json, "created_at")?,
            updated_at: required_date(json, "updated_at")?,
            pushed_at: optional_date(json, "pushed_at")?,
            homepage: optional(json, "homepage")?,
            size: required(json, "size")?,
            stargazers_count: required(json, "stargazers_count")?,
            watchers_count: required(json, "watchers_count")?,
            language: optional(json, "language")?,
            forks_count: required(json, "forks_count")?,
            open_issues_count: required(json, "open_issues_count")?,
            master_branch: optional(json, "master_branch")?,
            default_branch: required(json, "default_branch")?,
            score: required(json, "score")?,
            owner: Owner::from_json(required_object(json, "owner")?)?,
        })
    }
}

/// The user or organization that owns a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub login: String,
    pub id: u64,
    pub avatar_url: Url,
    pub gravatar_id: String,
    pub url: Url,
    pub received_events_url: Url,
    /// "User" or "Organization" (the wire key is `type`).
    pub kind: String,
}

impl FromJson for Owner {
    fn from_json(json: &JsonObject) -> Result<Self, DecodeError> {
        Ok(Owner {
            login: required(json, "login")?,
            id: required(json, "id")?,
            avatar_url: required_url(json, "avatar_url")?,
            gravatar_id: required(json, "gravatar_id")?,
            url: required_url(json, "url")?,
            received_events_url: required_url(json, "received_events_url")?,
            kind: required(json, "type")?,
        })
    }
}
