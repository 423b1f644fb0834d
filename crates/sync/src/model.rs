/// Identity and session types shared by the collection sync engine
use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters the document store reserves in path segments
const RESERVED_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// True when `key` can be used as one store path segment
fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
        && !key.contains(RESERVED_KEY_CHARS)
        && !key.chars().any(char::is_control)
}

/// Opaque movie identifier
///
/// Only equality matters. Numeric ids are the common case; text ids are kept
/// for providers that hand out string keys.
///
/// Two ids name the same movie exactly when their store keys are equal. Text
/// spelling a canonical integer is folded into `Number` by `from_key` and the
/// `From` conversions; `canonical` does the same for an id built directly
/// from a variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MovieId {
    Number(i64),
    Text(String),
}

impl MovieId {
    /// Interpret a document key (always a string on the wire) as a movie id
    ///
    /// Only the canonical spelling of an integer becomes `Number`; `"007"`
    /// and `"+7"` stay text, since they are different keys than `"7"`.
    pub fn from_key(key: &str) -> Self {
        match key.parse::<i64>() {
            Ok(n) if n.to_string() == key => MovieId::Number(n),
            _ => MovieId::Text(key.to_string()),
        }
    }

    /// Same id in canonical form
    pub fn canonical(&self) -> MovieId {
        match self {
            MovieId::Number(n) => MovieId::Number(*n),
            MovieId::Text(text) => MovieId::from_key(text),
        }
    }

    /// Store path segment for this id
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// True when the id can be used as a store path segment
    pub fn is_well_formed(&self) -> bool {
        match self {
            MovieId::Number(_) => true,
            MovieId::Text(text) => is_valid_key(text),
        }
    }
}

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovieId::Number(n) => write!(f, "{}", n),
            MovieId::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for MovieId {
    fn from(n: i64) -> Self {
        MovieId::Number(n)
    }
}

impl From<&str> for MovieId {
    fn from(text: &str) -> Self {
        MovieId::from_key(text)
    }
}

impl From<String> for MovieId {
    fn from(text: String) -> Self {
        MovieId::from_key(&text)
    }
}

/// Authenticated user identifier issued by the authentication provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a user id, rejecting ids that cannot be a store path segment
    pub fn parse(id: impl Into<String>) -> Result<Self, SyncError> {
        let user_id = Self::new(id);
        if user_id.is_well_formed() {
            Ok(user_id)
        } else {
            Err(SyncError::InvalidUserId(user_id.0))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id names exactly one user subtree in the store
    pub fn is_well_formed(&self) -> bool {
        is_valid_key(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Current authentication state as pushed by the session signal
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(UserId),
}

impl Session {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Session::Authenticated(UserId::new(user_id))
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated(user_id) => Some(user_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }
}

/// One of the three per-user collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollectionKind {
    Favorites,
    MustWatch,
    Reviews,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [
        CollectionKind::Favorites,
        CollectionKind::MustWatch,
        CollectionKind::Reviews,
    ];

    /// Path segment under `users/{user_id}/`
    pub fn segment(&self) -> &'static str {
        match self {
            CollectionKind::Favorites => "favorites",
            CollectionKind::MustWatch => "mustWatch",
            CollectionKind::Reviews => "reviews",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}
