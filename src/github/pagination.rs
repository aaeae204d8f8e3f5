//! Cursor pagination over GitHub GraphQL connections.
//!
//! A [`PagedQuery`] describes one organization-level connection: the query
//! document, where the connection lives in the response, and how a single
//! edge is validated into an item. The fetch loop itself lives on
//! [`GithubClient::fetch_all`](super::GithubClient::fetch_all).

use crate::error::{AuditError, Result};
use crate::model::{Member, Members};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// One page of a connection. Edges stay raw so each can be validated on its own.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub total_count: u64,
    #[serde(default)]
    pub edges: Option<Vec<Value>>,
    pub page_info: PageInfo,
}

impl Connection {
    /// Pulls `organization.<field>` out of a GraphQL `data` object.
    pub fn extract(data: Value, organization: &str, field: &str) -> Result<Self> {
        let Value::Object(mut data) = data else {
            return Err(AuditError::GitHub("response data is not an object".into()));
        };
        let org = match data.remove("organization") {
            Some(Value::Object(org)) => org,
            Some(Value::Null) => return Err(AuditError::OrgNotFound(organization.to_string())),
            _ => {
                return Err(AuditError::GitHub(
                    "response is missing the organization field".into(),
                ))
            }
        };
        let connection = org.get(field).cloned().ok_or_else(|| {
            AuditError::GitHub(format!("response is missing organization.{field}"))
        })?;
        Ok(serde_json::from_value(connection)?)
    }
}

/// Result of validating a single page entry.
#[derive(Debug, PartialEq)]
pub enum EntryOutcome<T> {
    Accept(T),
    Skip(String),
}

pub trait PagedQuery {
    type Item;

    /// Label used in logs and consistency errors.
    const COLLECTION: &'static str;
    /// GraphQL document taking `$organization`, `$pageSize` and `$after`.
    const QUERY: &'static str;
    /// Connection field under `organization`.
    const CONNECTION: &'static str;

    fn validate(edge: Value) -> EntryOutcome<Self::Item>;
}

/// Destination for validated items. `accumulated` counts distinct items.
pub trait Accumulate<T> {
    fn accumulate(&mut self, item: T);
    fn accumulated(&self) -> usize;
}

impl<T> Accumulate<T> for Vec<T> {
    fn accumulate(&mut self, item: T) {
        self.push(item);
    }

    fn accumulated(&self) -> usize {
        self.len()
    }
}

impl Accumulate<Member> for Members {
    fn accumulate(&mut self, item: Member) {
        self.insert(item);
    }

    fn accumulated(&self) -> usize {
        self.len()
    }
}

pub fn ensure_complete(collection: &'static str, accumulated: usize, total: u64) -> Result<()> {
    if accumulated as u64 == total {
        Ok(())
    } else {
        Err(AuditError::Consistency {
            collection,
            accumulated,
            total,
        })
    }
}
