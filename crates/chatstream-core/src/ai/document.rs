//! Document uploads
//!
//! Uploaded documents feed context-attached or retrieval-augmented exchanges.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use super::client::AssistantClient;
use super::error::ApiError;
use super::request::RequestMode;

/// Document formats the service can extract text from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Xlsx,
    Xls,
}

impl DocumentKind {
    /// Detect the kind from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Xls => "application/vnd.ms-excel",
        }
    }
}

/// What the service extracted from an uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub file_name: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub success: bool,
}

impl DocumentInfo {
    /// Attach the extracted text to each message
    pub fn as_context(&self) -> RequestMode {
        RequestMode::ContextAttached(self.extracted_text.clone())
    }

    /// Answer from retrieval restricted to this document
    pub fn as_source(&self) -> RequestMode {
        RequestMode::RetrievalAugmented(Some(self.file_name.clone()))
    }
}

impl AssistantClient {
    /// Upload a PDF or spreadsheet for text extraction and indexing
    pub async fn upload_document(&self, path: &Path) -> Result<DocumentInfo, ApiError> {
        let Some(kind) = DocumentKind::from_path(path) else {
            warn!(path = %path.display(), "Rejected document with unsupported extension");
            return Err(ApiError::UnsupportedDocument(path.display().to_string()));
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let data = tokio::fs::read(path).await?;
        info!("Uploading document {} ({} bytes, {:?})", file_name, data.len(), kind);

        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(kind.mime_type())?;
        let form = Form::new().part("file", part);

        let response = self
            .build_request("/document/upload")
            .multipart(form)
            .send()
            .await?;
        let response = self.handle_error_response(response).await?;

        let document = response.json::<DocumentInfo>().await?;
        info!(
            "Document {} processed: {} pages, {} chars extracted",
            document.file_name,
            document.total_pages,
            document.extracted_text.len()
        );
        Ok(document)
    }
}
