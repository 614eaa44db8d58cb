use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

/// One entry of the backend's `meta.links` array: page numbers, ellipsis
/// separators and the previous/next arrows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaLink {
    #[serde(default)]
    pub url: Option<String>,
    pub label: String,
    #[serde(default)]
    pub active: bool,
}

impl MetaLink {
    pub fn new(url: Option<&str>, label: impl Into<String>, active: bool) -> Self {
        Self {
            url: url.map(str::to_string),
            label: label.into(),
            active,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    #[serde(default)]
    pub links: Vec<MetaLink>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub to: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
    #[serde(default)]
    pub links: PageLinks,
}

/// Response of `POST /mobile/acquire-token`. The body is either
/// `"<active token count>;<token>"` or the bare token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredToken {
    pub token: String,
    pub active_tokens: Option<u32>,
}

impl AcquiredToken {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().trim_matches('"');
        match raw.split_once(';') {
            Some((count, token)) => Self {
                token: token.to_string(),
                active_tokens: count.trim().parse().ok(),
            },
            None => Self {
                token: raw.to_string(),
                active_tokens: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAcquireRequest {
    pub email: String,
    pub password: String,
    pub device_name: String,
    pub wipe_tokens: bool,
}
