use std::path::{Path, PathBuf};

/// What kind of location a resource string points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    LocalAbsolute,
    LocalRelative,
    Http,
    Ftp,
    Unknown,
}

impl PathKind {
    pub fn is_local(&self) -> bool {
        matches!(self, PathKind::LocalAbsolute | PathKind::LocalRelative)
    }
}

/// A file or URI reference as written in a card definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    value: String,
}

impl ResourcePath {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> PathKind {
        let value = self.value.trim();
        if value.is_empty() {
            return PathKind::Unknown;
        }

        if let Some((scheme, _)) = value.split_once("://") {
            return match scheme.to_ascii_lowercase().as_str() {
                "http" | "https" => PathKind::Http,
                "ftp" | "ftps" => PathKind::Ftp,
                "file" => PathKind::LocalAbsolute,
                _ => PathKind::Unknown,
            };
        }

        if Path::new(value).is_absolute() {
            PathKind::LocalAbsolute
        } else {
            PathKind::LocalRelative
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind().is_local()
    }

    /// The local filesystem path, anchored at `base` when relative.
    /// Remote paths come back unchanged.
    pub fn absolute(&self, base: Option<&Path>) -> PathBuf {
        let value = self.value.trim_start_matches("file://");
        match (self.kind(), base) {
            (PathKind::LocalRelative, Some(base)) => base.join(value),
            _ => PathBuf::from(value),
        }
    }

    /// Last path segment of the reference, when it looks like a file name.
    pub fn file_name(&self) -> Option<String> {
        let trimmed = self.value.trim_end_matches('/');
        let without_query = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
        let segment = without_query.rsplit('/').next()?;
        if segment.contains('.') && !segment.is_empty() {
            Some(segment.to_string())
        } else {
            None
        }
    }
}

/// File extension for a MIME type, mirroring what the loader persists.
/// Unknown types default to an archive, the most common remote payload.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "application/json" | "text/json" => "json",
        "application/zip" | "application/x-zip-compressed" => "zip",
        "text/plain" => "txt",
        "text/html" => "html",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        _ => "zip",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_schemes_and_local_paths() {
        assert_eq!(ResourcePath::new("https://example.com/a.zip").kind(), PathKind::Http);
        assert_eq!(ResourcePath::new("ftp://example.com/a.zip").kind(), PathKind::Ftp);
        assert_eq!(ResourcePath::new("/tmp/cards").kind(), PathKind::LocalAbsolute);
        assert_eq!(ResourcePath::new("./cards/back.ctml").kind(), PathKind::LocalRelative);
        assert_eq!(ResourcePath::new("cards/back.ctml").kind(), PathKind::LocalRelative);
        assert_eq!(ResourcePath::new("").kind(), PathKind::Unknown);
    }

    #[test]
    fn anchors_relative_paths() {
        let path = ResourcePath::new("faces/front.ctml");
        assert_eq!(
            path.absolute(Some(Path::new("/work"))),
            PathBuf::from("/work/faces/front.ctml")
        );
    }

    #[test]
    fn extracts_remote_file_names() {
        assert_eq!(
            ResourcePath::new("https://example.com/sets/demo.zip?v=2").file_name(),
            Some("demo.zip".to_string())
        );
        assert_eq!(ResourcePath::new("https://example.com/sets/").file_name(), None);
    }

    #[test]
    fn maps_mime_types_to_extensions() {
        assert_eq!(extension_for_mime("application/json; charset=utf-8"), "json");
        assert_eq!(extension_for_mime("application/zip"), "zip");
        assert_eq!(extension_for_mime("application/octet-stream"), "zip");
    }
}
