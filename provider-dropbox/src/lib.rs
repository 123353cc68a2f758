//! # Dropbox Provider
//!
//! File operations against the Dropbox API v2.
//!
//! ## Overview
//!
//! This module provides:
//! - Folder listing with cursor continuation
//! - Downloads and uploads through the content host
//! - Deletion and metadata lookup through the RPC host
//!
//! Every call refreshes an expired access token first and fails with
//! [`DropboxError::NotAuthorized`] before touching the network when no
//! credentials are stored.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::DropboxConnector;
pub use error::{DropboxError, Result};
pub use types::{
    DeleteFileParams, DeleteResult, DownloadFileParams, FileMetadata, GetMetadataParams,
    ListFolderParams, ListFolderResult, Metadata, MetadataTag, UploadFileParams, UploadMode,
};
