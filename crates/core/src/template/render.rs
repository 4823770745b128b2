//! Go `text/template` rendering via `gtmpl`.
//!
//! Templates address the person with a leading dot, e.g.
//! `Hello {{.DisplayName}}`. Values are substituted verbatim in both
//! formats. The field names of the first release (`Mail`,
//! `MobilephoneNumber`, `TimeChanged`) are bound too, so existing
//! templates keep working.

use std::collections::HashMap;

use chrono::SecondsFormat;
use gtmpl::Value;

use crate::directory::PersonRecord;
use crate::errors::TemplateError;

/// Build the value bound as `.` when rendering `person`.
///
/// Absent optional attributes are bound as empty strings, so `{{if .Email}}`
/// is false for them and `{{.Email}}` prints nothing.
pub fn person_context(person: &PersonRecord) -> Value {
    let text = |v: &Option<String>| Value::String(v.clone().unwrap_or_default());

    let mut fields: HashMap<String, Value> = HashMap::new();
    fields.insert("DisplayName".into(), Value::String(person.display_name.clone()));
    fields.insert("Description".into(), text(&person.description));
    fields.insert("Email".into(), text(&person.email));
    fields.insert("Mail".into(), text(&person.email));
    fields.insert("TelephoneNumber".into(), text(&person.telephone_number));
    fields.insert("MobilePhoneNumber".into(), text(&person.mobile_phone_number));
    fields.insert("MobilephoneNumber".into(), text(&person.mobile_phone_number));
    fields.insert(
        "LastChanged".into(),
        Value::String(
            person
                .last_changed
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
    );
    fields.insert(
        "TimeChanged".into(),
        Value::String(
            person
                .last_changed
                .format("%Y-%m-%d %H:%M:%S%.f +0000 UTC")
                .to_string(),
        ),
    );
    Value::Object(fields)
}

/// Render `source` with `person` bound as the root context.
pub fn render(source: &str, person: &PersonRecord) -> Result<String, TemplateError> {
    gtmpl::template(source, person_context(person)).map_err(|e| TemplateError::Render(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn jane() -> PersonRecord {
        PersonRecord {
            display_name: "Jane <Doe>".into(),
            description: None,
            email: Some("jdoe@example.com".into()),
            telephone_number: Some("+49 30 1234".into()),
            mobile_phone_number: None,
            last_changed: Utc.with_ymd_and_hms(2023, 1, 15, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_dot_field_access() {
        let out = render("Hello {{.DisplayName}}", &jane()).unwrap();
        assert_eq!(out, "Hello Jane <Doe>");
    }

    #[test]
    fn test_first_release_field_names() {
        let out = render("{{.Mail}}|{{.MobilephoneNumber}}|{{.TimeChanged}}", &jane()).unwrap();
        assert_eq!(out, "jdoe@example.com||2023-01-15 09:30:00 +0000 UTC");
    }

    #[test]
    fn test_last_changed_is_rfc3339() {
        let out = render("{{.LastChanged}}", &jane()).unwrap();
        assert_eq!(out, "2023-01-15T09:30:00Z");
    }

    #[test]
    fn test_absent_field_is_empty_and_false() {
        let out = render(
            "[{{.Description}}]{{if .Description}}set{{else}}unset{{end}}",
            &jane(),
        )
        .unwrap();
        assert_eq!(out, "[]unset");
    }

    #[test]
    fn test_syntax_error_fails() {
        let err = render("{{if .DisplayName}}never closed", &jane()).unwrap_err();
        assert!(matches!(err, TemplateError::Render(_)));
    }
}
