//! Multipart upload extractor.
//!
//! Collects the `file` part and every text field of a multipart form so
//! handlers for import and bulk upsert see one typed value.

use std::collections::HashMap;

use axum::{
    async_trait,
    body::Bytes,
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::StatusCode,
};

use crate::error::{ApiError, ErrorCode};

/// Name of the multipart part holding the uploaded file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Clone)]
pub struct UploadForm {
    pub file_name: String,
    pub bytes: Bytes,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Boolean form field; absent means false.
    pub fn flag(&self, name: &str) -> Result<bool, ApiError> {
        match self.field(name) {
            None => Ok(false),
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
            Some(v) => Err(ApiError::invalid_input(format!(
                "Field '{}' must be true or false, got '{}'",
                name, v
            ))),
        }
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(ErrorCode::PayloadTooLarge, err.body_text())
    } else {
        ApiError::invalid_input(format!("Malformed multipart body: {}", err.body_text()))
    }
}

#[async_trait]
impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::invalid_input(rejection.body_text()))?;

        let mut file: Option<(String, Bytes)> = None;
        let mut fields = HashMap::new();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILE_FIELD {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::invalid_input("Uploaded file has no filename"))?;
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, bytes));
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                fields.insert(name, value);
            }
        }

        let (file_name, bytes) = file.ok_or_else(|| ApiError::missing_field(FILE_FIELD))?;
        Ok(Self {
            file_name,
            bytes,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> UploadForm {
        UploadForm {
            file_name: "dump.sql".to_string(),
            bytes: Bytes::from_static(b"SELECT 1;"),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_flag_parsing() {
        assert!(!form(&[]).flag("truncate").unwrap());
        assert!(form(&[("truncate", "TRUE")]).flag("truncate").unwrap());
        assert!(form(&[("truncate", "1")]).flag("truncate").unwrap());
        assert!(!form(&[("truncate", "false")]).flag("truncate").unwrap());
        assert!(form(&[("truncate", "yes please")]).flag("truncate").is_err());
    }

    #[test]
    fn test_blank_field_is_absent() {
        assert_eq!(form(&[("upsertKey", "  ")]).field("upsertKey"), None);
        assert_eq!(form(&[("upsertKey", " slug ")]).field("upsertKey"), Some("slug"));
    }
}
