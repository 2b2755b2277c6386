use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use crate::error::ApiError;
use crate::validate::non_blank;

/// A file part of a multipart upload, held in memory until it is stored.
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A fully-read multipart body: text fields and file parts by field name.
/// Empty file parts (a browser's "no file chosen") are dropped.
#[derive(Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn parse(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if field.file_name().is_some() {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    continue;
                }
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        content_type,
                        bytes,
                    },
                );
            } else {
                let text = field.text().await?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// Raw text of a field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Trimmed text of a field; blank counts as missing.
    pub fn field(&self, name: &str) -> Option<String> {
        non_blank(self.text(name)).map(str::to_owned)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}
