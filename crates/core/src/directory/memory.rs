//! In-memory [`DirectoryClient`] for tests and local development.
//!
//! Entries are matched against the lookup filter by `samAccountName` only,
//! which is all [`PersonLookup`](super::PersonLookup) ever asks for.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::client::{DirectoryClient, DirectoryConnection, DirectoryEntry};
use super::person::ACCOUNT_NAME_ATTR;
use crate::errors::DirectoryError;

/// A recorded search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSearch {
    pub base_dn: String,
    pub filter: String,
    pub attributes: Vec<String>,
}

#[derive(Debug, Default)]
struct Shared {
    entries: Vec<DirectoryEntry>,
    searches: Mutex<Vec<RecordedSearch>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_connect: bool,
    fail_search: bool,
}

/// Directory double holding a fixed set of entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    shared: Arc<Shared>,
}

impl InMemoryDirectory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries,
                ..Shared::default()
            }),
        }
    }

    /// A directory whose `connect` always fails.
    pub fn unreachable() -> Self {
        Self {
            shared: Arc::new(Shared {
                fail_connect: true,
                ..Shared::default()
            }),
        }
    }

    /// A directory that accepts connections but fails every search.
    pub fn failing_search() -> Self {
        Self {
            shared: Arc::new(Shared {
                fail_search: true,
                ..Shared::default()
            }),
        }
    }

    /// Number of connections opened so far.
    pub fn connections_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed so far.
    pub fn connections_closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Every search issued, in order.
    pub fn searches(&self) -> Vec<RecordedSearch> {
        self.shared
            .searches
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        if self.shared.fail_connect {
            return Err(DirectoryError::Connect {
                url: "memory://".into(),
                detail: "connection refused".into(),
            });
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConnection {
            shared: self.shared.clone(),
            closed: false,
        }))
    }
}

struct InMemoryConnection {
    shared: Arc<Shared>,
    closed: bool,
}

#[async_trait]
impl DirectoryConnection for InMemoryConnection {
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        if let Ok(mut searches) = self.shared.searches.lock() {
            searches.push(RecordedSearch {
                base_dn: base_dn.to_string(),
                filter: filter.to_string(),
                attributes: attributes.iter().map(|a| a.to_string()).collect(),
            });
        }

        if self.shared.fail_search {
            return Err(DirectoryError::Search {
                base_dn: base_dn.to_string(),
                detail: "operations error".into(),
            });
        }

        let wanted = match account_name_from_filter(filter) {
            Some(name) => name,
            None => return Ok(Vec::new()),
        };

        Ok(self
            .shared
            .entries
            .iter()
            .filter(|e| e.attribute(ACCOUNT_NAME_ATTR) == Some(wanted.as_str()))
            .cloned()
            .collect())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.shared.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Pull the (unescaped) account name out of `(samAccountName=...)`.
fn account_name_from_filter(filter: &str) -> Option<String> {
    let marker = format!("({}=", ACCOUNT_NAME_ATTR);
    let start = filter.find(&marker)? + marker.len();
    let rest = &filter[start..];
    let end = rest.find(')')?;
    Some(unescape_filter_value(&rest[..end]))
}

fn unescape_filter_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(b) = value
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
