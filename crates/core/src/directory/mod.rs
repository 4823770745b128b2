//! Directory (LDAP) access.
//!
//! Each lookup opens its own connection through a [`DirectoryClient`],
//! searches once, and closes it again. [`PersonLookup`] turns the first
//! matching entry into a [`PersonRecord`].

pub mod client;
pub mod memory;
pub mod person;
pub mod timestamp;

pub use client::{DirectoryClient, DirectoryConnection, DirectoryEntry, LdapDirectoryClient};
pub use memory::InMemoryDirectory;
pub use person::{LookupQuery, PersonLookup, PersonRecord};
pub use timestamp::parse_directory_timestamp;
