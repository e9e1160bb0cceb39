use std::path::PathBuf;

use crate::error::{CardError, CardResult};
use crate::path::{PathKind, ResourcePath};

/// Bytes fetched for a resource reference, plus whatever naming hints the
/// transport offered.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

/// Reads resources referenced by card definitions: local files directly,
/// HTTP(S) through a shared client. FTP references are recognized but
/// deliberately unsupported.
#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    client: reqwest::Client,
}

impl FileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch(&self, path: &ResourcePath) -> CardResult<FetchedFile> {
        match path.kind() {
            PathKind::Http => self.fetch_http(path).await,
            PathKind::Ftp => Err(CardError::ResolverNotSupported {
                scheme: "ftp".to_string(),
            }),
            PathKind::LocalAbsolute | PathKind::LocalRelative => self.fetch_local(path).await,
            PathKind::Unknown => Err(CardError::ResourceNotFound {
                path: PathBuf::from(path.as_str()),
            }),
        }
    }

    async fn fetch_http(&self, path: &ResourcePath) -> CardResult<FetchedFile> {
        let response = self
            .client
            .get(path.as_str())
            .send()
            .await?
            .error_for_status()?;

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(FetchedFile {
            file_name: path.file_name(),
            mime_type,
            bytes: response.bytes().await?.to_vec(),
        })
    }

    async fn fetch_local(&self, path: &ResourcePath) -> CardResult<FetchedFile> {
        let fs_path = path.absolute(None);
        let bytes = match tokio::fs::read(&fs_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CardError::ResourceNotFound { path: fs_path });
            }
            Err(err) => return Err(err.into()),
        };

        Ok(FetchedFile {
            file_name: fs_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            mime_type: None,
            bytes,
        })
    }
}
