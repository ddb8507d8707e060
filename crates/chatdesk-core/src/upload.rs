use std::path::Path;

use anyhow::{anyhow, Result};

/// The two kinds of file the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Csv,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Csv => "csv",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "image" | "img" => Some(UploadKind::Image),
            "csv" => Some(UploadKind::Csv),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            UploadKind::Image => "Image",
            UploadKind::Csv => "CSV file",
        }
    }

    /// Backend route, relative to the base URL
    pub fn endpoint(&self) -> &'static str {
        match self {
            UploadKind::Image => "/upload",
            UploadKind::Csv => "/upload-csv",
        }
    }

    /// Shown when the upload never got a usable reply
    pub fn failure_message(&self) -> &'static str {
        match self {
            UploadKind::Image => {
                "Sorry, something went wrong with the image upload. Please try again."
            }
            UploadKind::Csv => "Sorry, something went wrong with the CSV upload. Please try again.",
        }
    }

    /// Text of the user entry appended when the upload starts
    pub fn announcement(&self, filename: &str) -> String {
        match self {
            UploadKind::Image => "Uploading image for analysis...".to_string(),
            UploadKind::Csv => format!("Uploading CSV file: {}", filename),
        }
    }

    /// Whether the backend's allow-list takes this file name. Only used for
    /// hints; the server has the final word.
    pub fn accepts(&self, filename: &str) -> bool {
        let ext = match filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => return false,
        };
        match self {
            UploadKind::Image => matches!(ext.as_str(), "png" | "jpg" | "jpeg"),
            UploadKind::Csv => ext == "csv",
        }
    }
}

/// A file the user picked, already read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { name, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_accepts_matches_backend_allow_lists() {
        assert!(UploadKind::Image.accepts("photo.PNG"));
        assert!(UploadKind::Image.accepts("scan.jpeg"));
        assert!(!UploadKind::Image.accepts("notes.gif"));
        assert!(!UploadKind::Image.accepts("noextension"));
        assert!(UploadKind::Csv.accepts("data.csv"));
        assert!(!UploadKind::Csv.accepts("data.xlsx"));
    }

    #[test]
    fn test_announcement_text() {
        assert_eq!(
            UploadKind::Csv.announcement("data.csv"),
            "Uploading CSV file: data.csv"
        );
        assert_eq!(
            UploadKind::Image.announcement("cat.png"),
            "Uploading image for analysis..."
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!(UploadKind::from_str("IMAGE"), Some(UploadKind::Image));
        assert_eq!(UploadKind::from_str("csv"), Some(UploadKind::Csv));
        assert_eq!(UploadKind::from_str("pdf"), None);
    }

    #[tokio::test]
    async fn test_read_selected_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loans.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"id,title\n1,Dune\n").unwrap();

        let selected = SelectedFile::read(&path).await.unwrap();
        assert_eq!(selected.name, "loans.csv");
        assert_eq!(selected.bytes, b"id,title\n1,Dune\n");
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SelectedFile::read(dir.path().join("missing.png")).await.is_err());
    }
}
