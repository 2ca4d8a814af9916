//! Custom Axum extractors.

mod upload;

pub use upload::{UploadForm, FILE_FIELD};
