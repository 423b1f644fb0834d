//! JSON shapes of the stored collections
//!
//! Set-valued collections are stored as arrays of ids. A document store may
//! hand a sparse array back as an object keyed by index, and a review object
//! keyed by small integers back as an array; both are accepted on read.

use crate::error::StoreError;
use crate::model::{CollectionKind, MovieId};
use crate::state::{OrderedIds, ReviewMap};
use crate::store::StorePath;
use serde_json::{Map, Value};
use tracing::warn;

/// Decoded value of one collection
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionValue {
    Ids(OrderedIds),
    Reviews(ReviewMap),
}

/// Decode whatever the store returned for `kind`; a miss is an empty collection
pub fn decode_collection(
    kind: CollectionKind,
    path: &StorePath,
    value: Option<Value>,
) -> Result<CollectionValue, StoreError> {
    match kind {
        CollectionKind::Favorites | CollectionKind::MustWatch => match value {
            None => Ok(CollectionValue::Ids(OrderedIds::new())),
            Some(value) => decode_ids(path, value).map(CollectionValue::Ids),
        },
        CollectionKind::Reviews => match value {
            None => Ok(CollectionValue::Reviews(ReviewMap::new())),
            Some(value) => decode_reviews(path, value).map(CollectionValue::Reviews),
        },
    }
}

pub fn decode_ids(path: &StorePath, value: Value) -> Result<OrderedIds, StoreError> {
    let entries = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        Value::Object(map) => sparse_array_values(map),
        other => return Err(decode_error(path, "an array of movie ids", &other)),
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Null => None,
            Value::Number(n) => match n.as_i64() {
                Some(id) => Some(MovieId::Number(id)),
                None => {
                    warn!(path = %path, value = %n, "Skipping non-integer movie id");
                    None
                }
            },
            Value::String(text) => {
                let id = MovieId::from(text);
                if id.is_well_formed() {
                    Some(id)
                } else {
                    warn!(path = %path, "Skipping malformed movie id");
                    None
                }
            }
            other => {
                warn!(path = %path, value = %other, "Skipping unexpected collection entry");
                None
            }
        })
        .collect())
}

pub fn decode_reviews(path: &StorePath, value: Value) -> Result<ReviewMap, StoreError> {
    let entries: Vec<(MovieId, Value)> = match value {
        Value::Null => Vec::new(),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, review)| (MovieId::from_key(&key), review))
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, review)| (MovieId::Number(index as i64), review))
            .collect(),
        other => return Err(decode_error(path, "an object of reviews", &other)),
    };

    let mut reviews = ReviewMap::new();
    for (movie_id, review) in entries {
        match review {
            Value::Null => {}
            Value::String(text) => {
                reviews.insert(movie_id, text);
            }
            other => {
                warn!(path = %path, movie_id = %movie_id, value = %other, "Skipping non-text review");
            }
        }
    }
    Ok(reviews)
}

pub fn encode_ids(ids: &OrderedIds) -> Value {
    Value::Array(ids.iter().map(encode_id).collect())
}

pub fn encode_review(review: &str) -> Value {
    Value::String(review.to_string())
}

fn encode_id(id: &MovieId) -> Value {
    match id {
        MovieId::Number(n) => Value::from(*n),
        MovieId::Text(text) => Value::String(text.clone()),
    }
}

/// Values of an index-keyed object in index order
fn sparse_array_values(map: Map<String, Value>) -> Vec<Value> {
    let mut indexed: Vec<(Option<usize>, String, Value)> = map
        .into_iter()
        .map(|(key, value)| (key.parse::<usize>().ok(), key, value))
        .collect();
    // numeric keys first, in numeric order, then any stray keys lexically
    indexed.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });
    indexed.into_iter().map(|(_, _, value)| value).collect()
}

fn decode_error(path: &StorePath, expected: &str, found: &Value) -> StoreError {
    let kind = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    StoreError::Decode {
        path: path.to_string(),
        message: format!("expected {}, found {}", expected, kind),
    }
}
