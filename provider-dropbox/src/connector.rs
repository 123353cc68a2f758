//! Dropbox API connector implementation
//!
//! RPC routes (`files/list_folder`, `files/delete_v2`, `files/get_metadata`)
//! take a JSON body on the API host. Content routes (`files/download`,
//! `files/upload`) carry their arguments in the `Dropbox-API-Arg` header on
//! the content host.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_auth::{CredentialProvider, Credentials};
use core_runtime::config::Endpoints;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{DropboxError, Result};
use crate::types::{
    DeleteFileParams, DeleteResult, DownloadFileParams, FileMetadata, GetMetadataParams,
    ListFolderContinueArg, ListFolderParams, ListFolderResult, Metadata, UploadFileParams,
};

/// Header carrying arguments for content routes
pub const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Dropbox API connector
///
/// # Features
///
/// - Refreshes an expired access token before each call
/// - Fails with `NotAuthorized` without network access when signed out
/// - Passes non-2xx bodies through unchanged
/// - Single attempt per call; callers decide whether to retry
///
/// # Example
///
/// ```ignore
/// use provider_dropbox::{DropboxConnector, ListFolderParams};
///
/// let connector = DropboxConnector::new(http_client, endpoints, auth_manager);
/// let page = connector.list_folder(ListFolderParams::new("")).await?;
/// ```
pub struct DropboxConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    endpoints: Endpoints,

    /// Source of the access token
    auth: Arc<dyn CredentialProvider>,
}

impl DropboxConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        endpoints: Endpoints,
        auth: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http_client,
            endpoints,
            auth,
        }
    }

    /// List the entries of a folder (first page).
    #[instrument(skip(self, params), fields(path = %params.path))]
    pub async fn list_folder(&self, params: ListFolderParams) -> Result<ListFolderResult> {
        let result: ListFolderResult = self.rpc("files/list_folder", &params).await?;
        info!(
            entries = result.entries.len(),
            has_more = result.has_more,
            "Listed folder"
        );
        Ok(result)
    }

    /// Fetch the next page of a listing.
    #[instrument(skip(self, cursor))]
    pub async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderResult> {
        let result: ListFolderResult = self
            .rpc("files/list_folder/continue", &ListFolderContinueArg { cursor })
            .await?;
        info!(
            entries = result.entries.len(),
            has_more = result.has_more,
            "Listed next folder page"
        );
        Ok(result)
    }

    /// Download a file's contents.
    #[instrument(skip(self, params), fields(path = %params.path))]
    pub async fn download_file(&self, params: DownloadFileParams) -> Result<Bytes> {
        let credentials = self.authorize().await?;

        let request = HttpRequest::new(HttpMethod::Post, self.endpoints.content("files/download"))
            .authorization(&credentials.token_type, &credentials.access_token)
            .header(API_ARG_HEADER, api_arg(&params)?);

        let response = self.send(request).await?;
        info!(bytes = response.body.len(), "Downloaded file");
        Ok(response.body)
    }

    /// Upload a file in a single request.
    #[instrument(skip(self, params), fields(path = %params.path, bytes = params.data.len()))]
    pub async fn upload_file(&self, params: UploadFileParams) -> Result<FileMetadata> {
        let credentials = self.authorize().await?;

        let request = HttpRequest::new(HttpMethod::Post, self.endpoints.content("files/upload"))
            .authorization(&credentials.token_type, &credentials.access_token)
            .header(API_ARG_HEADER, api_arg(&params.arg())?)
            .header("Content-Type", "application/octet-stream")
            .body(params.data.clone());

        let response = self.send(request).await?;
        let metadata: FileMetadata = decode(&response, "files/upload")?;
        info!(id = %metadata.id, "Uploaded file");
        Ok(metadata)
    }

    /// Delete a file or folder.
    #[instrument(skip(self, params), fields(path = %params.path))]
    pub async fn delete_file(&self, params: DeleteFileParams) -> Result<DeleteResult> {
        let result: DeleteResult = self.rpc("files/delete_v2", &params).await?;
        info!(name = %result.metadata.name, "Deleted entry");
        Ok(result)
    }

    /// Look up metadata for a path.
    #[instrument(skip(self, params), fields(path = %params.path))]
    pub async fn get_metadata(&self, params: GetMetadataParams) -> Result<Metadata> {
        self.rpc("files/get_metadata", &params).await
    }

    /// Refresh if needed, then load credentials.
    async fn authorize(&self) -> Result<Credentials> {
        self.auth.refresh_token().await?;
        self.auth.credentials().await?.ok_or_else(|| {
            debug!("No stored credentials");
            DropboxError::NotAuthorized
        })
    }

    async fn rpc<P, T>(&self, route: &str, params: &P) -> Result<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let credentials = self.authorize().await?;

        let request = HttpRequest::new(HttpMethod::Post, self.endpoints.api(route))
            .authorization(&credentials.token_type, &credentials.access_token)
            .json(params)
            .map_err(|e| DropboxError::Encode(e.to_string()))?;

        let response = self.send(request).await?;
        decode(&response, route)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            warn!(
                status = response.status,
                body_len = response.body.len(),
                "Dropbox API returned an error"
            );
            return Err(DropboxError::Response {
                status: response.status,
                body: response.body,
            });
        }

        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse, route: &str) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        DropboxError::ParseError(format!("Failed to parse {} response: {}", route, e))
    })
}

/// JSON for the `Dropbox-API-Arg` header.
///
/// Header values must be ASCII, so every non-ASCII character is written as a
/// `\uXXXX` escape (UTF-16 surrogate pairs above the BMP).
fn api_arg<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value).map_err(|e| DropboxError::Encode(e.to_string()))?;

    let mut escaped = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() {
            escaped.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                let _ = write!(escaped, "\\u{:04x}", unit);
            }
        }
    }
    Ok(escaped)
}
