//! Directory client abstraction and its `ldap3` implementation.
//!
//! A [`DirectoryClient`] opens one [`DirectoryConnection`] per lookup. There
//! is no pooling: the connection performs a single search and is closed by
//! the caller, or torn down on drop if the caller bails out early.

use std::collections::HashMap;

use async_trait::async_trait;
use ldap3::{DerefAliases, LdapConnAsync, Scope, SearchEntry, SearchOptions};
use tracing::{debug, warn};

use crate::config::DirectoryConfig;
use crate::errors::DirectoryError;

/// A single entry returned by a directory search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute name -> values, as reported by the server.
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Create an entry from a DN and `(attribute, value)` pairs.
    pub fn new<I, K, V>(dn: impl Into<String>, attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in attrs {
            map.entry(k.into()).or_default().push(v.into());
        }
        Self {
            dn: dn.into(),
            attrs: map,
        }
    }

    /// First value of `name`, matched case-insensitively.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    /// First value of `name`, or the empty string when absent.
    pub fn attribute_or_empty(&self, name: &str) -> &str {
        self.attribute(name).unwrap_or("")
    }
}

/// An open, bound directory connection.
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Search the subtree under `base_dn` for entries matching `filter`.
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Release the connection. Must be safe to call after a failed search.
    async fn close(&mut self);
}

/// Opens directory connections.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Dial the server and bind with the service credentials.
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError>;
}

// ---------------------------------------------------------------------------
// ldap3 implementation
// ---------------------------------------------------------------------------

/// [`DirectoryClient`] backed by an LDAP server.
#[derive(Debug, Clone)]
pub struct LdapDirectoryClient {
    url: String,
    bind_dn: String,
    bind_password: String,
}

impl LdapDirectoryClient {
    pub fn new(
        url: impl Into<String>,
        bind_dn: impl Into<String>,
        bind_password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            bind_dn: bind_dn.into(),
            bind_password: bind_password.into(),
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(
            config.url.clone(),
            config.bind_dn.clone(),
            config.password.clone().unwrap_or_default(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectoryClient {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        debug!(url = %self.url, "dialing directory server");
        let (conn, mut ldap) =
            LdapConnAsync::new(&self.url)
                .await
                .map_err(|e| DirectoryError::Connect {
                    url: self.url.clone(),
                    detail: e.to_string(),
                })?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "directory connection terminated with error");
            }
        });

        let bind = ldap
            .simple_bind(&self.bind_dn, &self.bind_password)
            .await
            .and_then(|res| res.success());
        if let Err(e) = bind {
            // Tear the socket down before reporting.
            let _ = ldap.unbind().await;
            return Err(DirectoryError::Bind {
                bind_dn: self.bind_dn.clone(),
                detail: e.to_string(),
            });
        }

        Ok(Box::new(LdapConnection {
            ldap,
            closed: false,
        }))
    }
}

struct LdapConnection {
    ldap: ldap3::Ldap,
    closed: bool,
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let search_err = |e: ldap3::LdapError| DirectoryError::Search {
            base_dn: base_dn.to_string(),
            detail: e.to_string(),
        };

        let (entries, _result) = self
            .ldap
            .with_search_options(
                SearchOptions::new()
                    .deref(DerefAliases::Never)
                    .sizelimit(0)
                    .timelimit(0)
                    .typesonly(false),
            )
            .search(base_dn, Scope::Subtree, filter, attributes.to_vec())
            .await
            .and_then(|res| res.success())
            .map_err(search_err)?;

        Ok(entries
            .into_iter()
            .map(|raw| {
                let entry = SearchEntry::construct(raw);
                DirectoryEntry {
                    dn: entry.dn,
                    attrs: entry.attrs,
                }
            })
            .collect())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.ldap.unbind().await {
            warn!(error = %e, "directory unbind failed");
        }
    }
}
