//! Form body extractor used by the review and admin endpoints.
//!
//! Browser clients post `FormData` (multipart), scripts tend to post urlencoded
//! forms or JSON. [`FormData`] accepts all three and deserializes into the same
//! struct. Multipart text fields are re-encoded as a urlencoded body so every
//! path goes through the same `serde` rules; empty fields are dropped so that
//! optional enums may be left blank.

use axum::{
    Form, Json,
    body::Body,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;

use crate::errors::{Error, Result};

const URLENCODED: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone)]
pub struct FormData<T>(pub T);

fn bad_form(message: impl std::fmt::Display) -> Error {
    Error::BadRequest {
        message: format!("Invalid form data: {message}"),
    }
}

fn urlencoded_request(body: String) -> Result<Request> {
    Request::builder()
        .method("POST")
        .header(CONTENT_TYPE, URLENCODED)
        .body(Body::from(body))
        .map_err(bad_form)
}

async fn from_urlencoded<T: DeserializeOwned, S: Send + Sync>(body: String, state: &S) -> Result<T> {
    let request = urlencoded_request(body)?;
    let Form(value) = Form::<T>::from_request(request, state).await.map_err(|e| bad_form(e.body_text()))?;
    Ok(value)
}

impl<T, S> FromRequest<S> for FormData<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        match content_type.as_deref() {
            Some(ct) if ct.starts_with("multipart/form-data") => {
                let mut multipart = Multipart::from_request(req, state).await.map_err(|e| bad_form(e.body_text()))?;
                let mut pairs = Vec::new();
                while let Some(field) = multipart.next_field().await.map_err(|e| bad_form(e.body_text()))? {
                    let Some(name) = field.name().map(str::to_string) else {
                        continue;
                    };
                    let value = field.text().await.map_err(|e| bad_form(e.body_text()))?;
                    if !value.is_empty() {
                        pairs.push((name, value));
                    }
                }
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&pairs)
                    .finish();
                from_urlencoded(encoded, state).await.map(Self)
            }
            Some(ct) if ct.starts_with("application/json") => {
                let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| bad_form(e.body_text()))?;
                Ok(Self(value))
            }
            Some(_) => {
                let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| bad_form(e.body_text()))?;
                Ok(Self(value))
            }
            // Bodiless PUT/POST: every field takes its default
            None => from_urlencoded(String::new(), state).await.map(Self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Notes {
        status: Option<String>,
        notes: Option<String>,
    }

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<Notes> {
        let mut builder = Request::builder().method("PUT").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let request = builder.body(Body::from(body)).unwrap();
        FormData::<Notes>::from_request(request, &()).await.map(|f| f.0)
    }

    #[tokio::test]
    async fn test_urlencoded_and_json() {
        let form = extract(Some(URLENCODED), "status=approved&notes=looks+good").await.unwrap();
        assert_eq!(form.status.as_deref(), Some("approved"));
        assert_eq!(form.notes.as_deref(), Some("looks good"));

        let json = extract(Some("application/json"), r#"{"status":"rejected"}"#).await.unwrap();
        assert_eq!(json.status.as_deref(), Some("rejected"));
        assert!(json.notes.is_none());
    }

    #[tokio::test]
    async fn test_multipart_skips_empty_fields() {
        let body = "--XYZ\r\nContent-Disposition: form-data; name=\"status\"\r\n\r\napproved\r\n\
                    --XYZ\r\nContent-Disposition: form-data; name=\"notes\"\r\n\r\n\r\n--XYZ--\r\n";
        let form = extract(Some("multipart/form-data; boundary=XYZ"), body).await.unwrap();
        assert_eq!(form.status.as_deref(), Some("approved"));
        assert!(form.notes.is_none());
    }

    #[tokio::test]
    async fn test_multipart_values_are_reencoded() {
        let body = "--XYZ\r\nContent-Disposition: form-data; name=\"status\"\r\n\r\napproved\r\n\
                    --XYZ\r\nContent-Disposition: form-data; name=\"notes\"\r\n\r\nfees & docs = ok\r\n--XYZ--\r\n";
        let form = extract(Some("multipart/form-data; boundary=XYZ"), body).await.unwrap();
        assert_eq!(form.notes.as_deref(), Some("fees & docs = ok"));
    }

    #[tokio::test]
    async fn test_missing_body_uses_defaults() {
        let form = extract(None, "").await.unwrap();
        assert_eq!(form, Notes { status: None, notes: None });
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let err = extract(Some("application/json"), "{not json").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }
}
