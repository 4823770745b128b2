//! Person lookup: query construction, multi-result policy and attribute
//! mapping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use super::client::{DirectoryClient, DirectoryEntry};
use super::timestamp::parse_directory_timestamp;
use crate::errors::{LookupError, TimestampError};

/// Attribute the username is matched against.
pub const ACCOUNT_NAME_ATTR: &str = "samAccountName";

/// Object class every person entry carries.
pub const PERSON_OBJECT_CLASS: &str = "organizationalPerson";

const ATTR_DISPLAY_NAME: &str = "displayName";
const ATTR_MAIL: &str = "mail";
const ATTR_TELEPHONE: &str = "telephoneNumber";
const ATTR_DESCRIPTION: &str = "description";
const ATTR_OTHER_TELEPHONE: &str = "otherTelephone";
const ATTR_WHEN_CHANGED: &str = "whenChanged";

/// Attributes requested from the directory for every lookup.
pub const PERSON_ATTRIBUTES: [&str; 7] = [
    "dn",
    ATTR_DISPLAY_NAME,
    ATTR_MAIL,
    ATTR_TELEPHONE,
    ATTR_DESCRIPTION,
    ATTR_OTHER_TELEPHONE,
    ATTR_WHEN_CHANGED,
];

/// A person as rendered into templates.
///
/// Only ever built from an entry with a non-empty display name and a
/// parseable `whenChanged`. Templates see the PascalCase field names,
/// e.g. `{{.DisplayName}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersonRecord {
    pub display_name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub telephone_number: Option<String>,
    pub mobile_phone_number: Option<String>,
    pub last_changed: DateTime<Utc>,
}

impl PersonRecord {
    /// Map a directory entry into a record.
    ///
    /// The timestamp is parsed first: a malformed timestamp is an error even
    /// when the entry would otherwise be rejected for lacking a display name.
    pub fn from_entry(entry: &DirectoryEntry) -> Result<Self, LookupError> {
        let when_changed = entry
            .attribute(ATTR_WHEN_CHANGED)
            .ok_or_else(|| TimestampError::Missing(ATTR_WHEN_CHANGED.to_string()))?;
        let last_changed = parse_directory_timestamp(when_changed)?;

        let display_name = entry.attribute_or_empty(ATTR_DISPLAY_NAME);
        if display_name.is_empty() {
            return Err(LookupError::NotFound);
        }

        let optional = |name: &str| {
            entry
                .attribute(name)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            display_name: display_name.to_string(),
            description: optional(ATTR_DESCRIPTION),
            email: optional(ATTR_MAIL),
            telephone_number: optional(ATTR_TELEPHONE),
            mobile_phone_number: optional(ATTR_OTHER_TELEPHONE),
            last_changed,
        })
    }
}

/// A subtree search for one account name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub base_dn: String,
    pub filter: String,
    pub attributes: Vec<&'static str>,
}

impl LookupQuery {
    /// Build the query for `username`, escaping filter metacharacters.
    pub fn for_username(base_dn: &str, username: &str) -> Self {
        Self {
            base_dn: base_dn.to_string(),
            filter: format!(
                "(&(objectClass={})({}={}))",
                PERSON_OBJECT_CLASS,
                ACCOUNT_NAME_ATTR,
                ldap3::ldap_escape(username)
            ),
            attributes: PERSON_ATTRIBUTES.to_vec(),
        }
    }
}

/// Looks people up by account name.
#[derive(Clone)]
pub struct PersonLookup {
    client: Arc<dyn DirectoryClient>,
    search_base_dn: String,
}

impl PersonLookup {
    pub fn new(client: Arc<dyn DirectoryClient>, search_base_dn: impl Into<String>) -> Self {
        Self {
            client,
            search_base_dn: search_base_dn.into(),
        }
    }

    /// Find the person whose account name is `username`.
    ///
    /// Zero matches is [`LookupError::NotFound`]. Several matches log a
    /// warning and the first entry returned by the server wins.
    pub async fn find_person(&self, username: &str) -> Result<PersonRecord, LookupError> {
        let query = LookupQuery::for_username(&self.search_base_dn, username);
        debug!(action = "lookup-person", username, filter = %query.filter, "searching directory");

        let mut conn = self.client.connect().await?;
        let searched = conn
            .search(&query.base_dn, &query.filter, &query.attributes)
            .await;
        conn.close().await;
        let entries = searched?;

        let entry = match entries.len() {
            0 => {
                warn!(action = "lookup-person", username, "no person found for the given username");
                return Err(LookupError::NotFound);
            }
            1 => &entries[0],
            count => {
                warn!(
                    action = "lookup-person",
                    username,
                    count,
                    "directory search returned several results, using the first"
                );
                &entries[0]
            }
        };

        match PersonRecord::from_entry(entry) {
            Ok(person) => Ok(person),
            Err(LookupError::NotFound) => {
                warn!(action = "lookup-person", username, dn = %entry.dn, "person has no display name");
                Err(LookupError::NotFound)
            }
            Err(LookupError::Timestamp(e)) => {
                error!(action = "lookup-person", username, dn = %entry.dn, error = %e, "failed to parse last-modified timestamp");
                Err(LookupError::Timestamp(e))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::InMemoryDirectory;
    use crate::errors::DirectoryError;
    use chrono::TimeZone;
    use tracing_test::traced_test;

    const BASE_DN: &str = "cn=Users,dc=example,dc=com";

    fn jane() -> DirectoryEntry {
        DirectoryEntry::new(
            "cn=Jane Doe,cn=Users,dc=example,dc=com",
            [
                ("samAccountName", "jdoe"),
                ("displayName", "Jane Doe"),
                ("mail", "jdoe@example.com"),
                ("telephoneNumber", "+49 30 1234"),
                ("description", "Head of Accounting"),
                ("otherTelephone", "+49 171 5678"),
                ("whenChanged", "20230115093000.0Z"),
            ],
        )
    }

    fn lookup(dir: &InMemoryDirectory) -> PersonLookup {
        PersonLookup::new(Arc::new(dir.clone()), BASE_DN)
    }

    #[test]
    fn test_query_for_username() {
        let query = LookupQuery::for_username(BASE_DN, "jdoe");
        assert_eq!(query.base_dn, BASE_DN);
        assert_eq!(
            query.filter,
            "(&(objectClass=organizationalPerson)(samAccountName=jdoe))"
        );
        assert!(query.attributes.contains(&"dn"));
        assert!(query.attributes.contains(&"whenChanged"));
        assert!(query.attributes.contains(&"otherTelephone"));
    }

    #[test]
    fn test_query_escapes_metacharacters() {
        let query = LookupQuery::for_username(BASE_DN, "*)(objectClass=*");
        let filter = query.filter.to_ascii_lowercase();
        assert!(filter.ends_with(r"(samaccountname=\2a\29\28objectclass=\2a))"));
        // Only the outer conjunction's parentheses remain unescaped.
        assert_eq!(query.filter.matches('(').count(), 3);
    }

    #[tokio::test]
    async fn test_find_single_person() {
        let dir = InMemoryDirectory::new(vec![jane()]);
        let person = lookup(&dir).find_person("jdoe").await.unwrap();

        assert_eq!(
            person,
            PersonRecord {
                display_name: "Jane Doe".into(),
                description: Some("Head of Accounting".into()),
                email: Some("jdoe@example.com".into()),
                telephone_number: Some("+49 30 1234".into()),
                mobile_phone_number: Some("+49 171 5678".into()),
                last_changed: Utc.with_ymd_and_hms(2023, 1, 15, 9, 30, 0).unwrap(),
            }
        );

        let searches = dir.searches();
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].base_dn, BASE_DN);
        assert_eq!(dir.connections_opened(), 1);
        assert_eq!(dir.connections_closed(), 1);
    }

    #[tokio::test]
    async fn test_optional_attributes_absent() {
        let entry = DirectoryEntry::new(
            "cn=Max,dc=example,dc=com",
            [
                ("samAccountName", "max"),
                ("displayName", "Max Mustermann"),
                ("mail", ""),
                ("whenChanged", "20200101000000Z"),
            ],
        );
        let dir = InMemoryDirectory::new(vec![entry]);
        let person = lookup(&dir).find_person("max").await.unwrap();

        assert_eq!(person.display_name, "Max Mustermann");
        assert_eq!(person.email, None);
        assert_eq!(person.description, None);
        assert_eq!(person.telephone_number, None);
        assert_eq!(person.mobile_phone_number, None);
    }

    #[tokio::test]
    async fn test_no_match_is_not_found() {
        let dir = InMemoryDirectory::new(vec![jane()]);
        let err = lookup(&dir).find_person("nobody").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound));
        assert_eq!(dir.connections_closed(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_multiple_matches_first_wins() {
        let mut second = jane();
        second.dn = "cn=Jane Doe (old),cn=Users,dc=example,dc=com".into();
        second
            .attrs
            .insert("displayName".into(), vec!["Jane Doe (old)".into()]);

        let dir = InMemoryDirectory::new(vec![jane(), second]);
        let person = lookup(&dir).find_person("jdoe").await.unwrap();
        assert_eq!(person.display_name, "Jane Doe");
        assert!(logs_contain("several results"));
        assert!(logs_contain("count=2"));
    }

    #[tokio::test]
    async fn test_empty_display_name_is_not_found() {
        let mut entry = jane();
        entry.attrs.insert("displayName".into(), vec![String::new()]);
        let dir = InMemoryDirectory::new(vec![entry]);

        let err = lookup(&dir).find_person("jdoe").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound));
    }

    #[tokio::test]
    async fn test_missing_display_name_is_not_found() {
        let mut entry = jane();
        entry.attrs.remove("displayName");
        let dir = InMemoryDirectory::new(vec![entry]);

        let err = lookup(&dir).find_person("jdoe").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound));
    }

    #[tokio::test]
    async fn test_malformed_timestamp_is_error() {
        let mut entry = jane();
        entry
            .attrs
            .insert("whenChanged".into(), vec!["last tuesday".into()]);
        let dir = InMemoryDirectory::new(vec![entry]);

        let err = lookup(&dir).find_person("jdoe").await.unwrap_err();
        assert!(matches!(
            err,
            LookupError::Timestamp(TimestampError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_timestamp_is_error() {
        let mut entry = jane();
        entry.attrs.remove("whenChanged");
        let dir = InMemoryDirectory::new(vec![entry]);

        let err = lookup(&dir).find_person("jdoe").await.unwrap_err();
        assert!(matches!(
            err,
            LookupError::Timestamp(TimestampError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_is_directory_error() {
        let dir = InMemoryDirectory::unreachable();
        let err = lookup(&dir).find_person("jdoe").await.unwrap_err();
        assert!(matches!(
            err,
            LookupError::Directory(DirectoryError::Connect { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_failure_still_closes_connection() {
        let dir = InMemoryDirectory::failing_search();
        let err = lookup(&dir).find_person("jdoe").await.unwrap_err();
        assert!(matches!(
            err,
            LookupError::Directory(DirectoryError::Search { .. })
        ));
        assert_eq!(dir.connections_opened(), 1);
        assert_eq!(dir.connections_closed(), 1);
    }

    #[test]
    fn test_record_serializes_pascal_case() {
        let entry = jane();
        let person = PersonRecord::from_entry(&entry).unwrap();
        let value = serde_json::to_value(&person).unwrap();

        assert_eq!(value["DisplayName"], "Jane Doe");
        assert_eq!(value["Email"], "jdoe@example.com");
        assert_eq!(value["MobilePhoneNumber"], "+49 171 5678");
        assert_eq!(value["LastChanged"], "2023-01-15T09:30:00Z");
    }
}
