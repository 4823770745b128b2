//! `GET /v1/:template?username=...` -- render a person through a template.
//!
//! Steps, each of which can end the request with an error response:
//! validate the template name, require a username, look the person up,
//! pick text or HTML from `Accept`, then resolve and render the template.
//! Nothing is retried.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{debug, error, warn};

use ldap_template_core::errors::{LookupError, TemplateError};
use ldap_template_core::TemplateFormat;

use crate::api::status::AppError;
use crate::AppState;

/// Name of the query parameter carrying the account name.
const USERNAME_PARAM: &str = "username";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/v1/:template", get(template_gen))
}

async fn template_gen(
    State(state): State<Arc<AppState>>,
    Path(template): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if !state.templates.is_valid_name(&template) {
        warn!(handler = "template_gen", template = %template, "rejecting request: malformed template name");
        return Err(AppError::BadRequest(
            "malformed template name: only numbers, chars and dashes are allowed".into(),
        ));
    }

    // A repeated key is not an error: the first value is used.
    let username = match params.iter().find(|(key, _)| key == USERNAME_PARAM) {
        Some((_, u)) if !u.is_empty() => u.as_str(),
        _ => {
            warn!(handler = "template_gen", template = %template, "rejecting request: query parameter 'username' is missing");
            return Err(AppError::BadRequest(
                "query parameter 'username' missing".into(),
            ));
        }
    };

    let person = state.lookup.find_person(username).await.map_err(|e| match e {
        LookupError::NotFound => AppError::NotFound("person not found".into()),
        LookupError::Timestamp(e) => {
            error!(handler = "template_gen", template = %template, username, error = %e, "person lookup failed: bad directory timestamp");
            AppError::internal()
        }
        LookupError::Directory(e) => {
            error!(handler = "template_gen", template = %template, username, error = %e, "person lookup failed");
            AppError::internal()
        }
    })?;

    let accept = headers.get(header::ACCEPT).map(|v| v.as_bytes());
    let format = TemplateFormat::from_accept(accept);
    debug!(handler = "template_gen", template = %template, username, format = %format, "rendering template");

    let body = state
        .templates
        .render(&template, format, &person)
        .await
        .map_err(|e| match e {
            TemplateError::InvalidName(_) => AppError::BadRequest(
                "malformed template name: only numbers, chars and dashes are allowed".into(),
            ),
            other => {
                error!(handler = "template_gen", template = %template, username, format = %format, error = %other, "template rendering failed");
                AppError::internal()
            }
        })?;

    Ok((
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::CONTENT_TYPE, format.content_type()),
        ],
        body,
    )
        .into_response())
}
