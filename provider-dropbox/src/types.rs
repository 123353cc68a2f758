//! Dropbox API v2 request and response types
//!
//! Field names follow the wire format (snake_case). Optional request fields
//! are omitted from the JSON when unset.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a metadata entry, carried in the `.tag` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataTag {
    File,
    Folder,
    Deleted,
}

/// A file, folder or deleted entry.
///
/// See: https://www.dropbox.com/developers/documentation/http/documentation#files-get_metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = ".tag")]
    pub tag: MetadataTag,

    /// Empty for deleted entries, which carry no id
    #[serde(default)]
    pub id: String,

    pub name: String,

    pub path_display: String,

    pub path_lower: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_modified: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_modified: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_downloadable: Option<bool>,

    /// File revision (files only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// File size in bytes (files only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Dropbox content hash (files only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl Metadata {
    pub fn is_file(&self) -> bool {
        self.tag == MetadataTag::File
    }

    pub fn is_folder(&self) -> bool {
        self.tag == MetadataTag::Folder
    }

    pub fn is_deleted(&self) -> bool {
        self.tag == MetadataTag::Deleted
    }
}

/// Metadata returned by an upload. Unlike [`Metadata`] every core field is
/// present.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub path_display: String,
    pub path_lower: String,
    pub client_modified: DateTime<Utc>,
    pub server_modified: DateTime<Utc>,
    pub is_downloadable: bool,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// `files/list_folder` arguments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ListFolderParams {
    /// Folder path; `""` is the root
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_deleted: Option<bool>,

    /// Page size hint (Dropbox accepts 1..=2000)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ListFolderParams {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = Some(recursive);
        self
    }

    pub fn include_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = Some(include_deleted);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

/// One page of a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListFolderResult {
    /// Pass to `list_folder_continue` for the next page
    pub cursor: String,
    pub entries: Vec<Metadata>,
    pub has_more: bool,
}

/// `files/download` arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadFileParams {
    pub path: String,
}

impl DownloadFileParams {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Conflict behaviour for uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    Add,
    Overwrite,
}

/// `files/upload` arguments plus the file contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFileParams {
    pub path: String,
    pub data: Bytes,
    pub mode: Option<UploadMode>,
    pub autorename: Option<bool>,
}

impl UploadFileParams {
    pub fn new(path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            mode: None,
            autorename: None,
        }
    }

    pub fn mode(mut self, mode: UploadMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn autorename(mut self, autorename: bool) -> Self {
        self.autorename = Some(autorename);
        self
    }

    pub(crate) fn arg(&self) -> UploadArg<'_> {
        UploadArg {
            path: &self.path,
            mode: self.mode,
            autorename: self.autorename,
        }
    }
}

/// The part of an upload that travels in `Dropbox-API-Arg`
#[derive(Debug, Serialize)]
pub(crate) struct UploadArg<'a> {
    pub path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<UploadMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autorename: Option<bool>,
}

/// `files/delete_v2` arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFileParams {
    pub path: String,
}

impl DeleteFileParams {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteResult {
    pub metadata: Metadata,
}

/// `files/get_metadata` arguments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GetMetadataParams {
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_media_info: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_deleted: Option<bool>,
}

impl GetMetadataParams {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn include_media_info(mut self, include: bool) -> Self {
        self.include_media_info = Some(include);
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = Some(include);
        self
    }
}
