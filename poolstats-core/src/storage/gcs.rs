//! Google Cloud Storage over its JSON API.
//!
//! Listing works anonymously against public buckets. Uploads need an OAuth
//! bearer token (e.g. from `gcloud auth print-access-token`); the client
//! never mints one itself.

use super::{BlobObject, BlobStore, ObjectAcl, StorageError};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const GCS_API_BASE: &str = "https://storage.googleapis.com/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    name: String,
    // the JSON API encodes uint64 fields as strings
    #[serde(deserialize_with = "u64_from_string")]
    size: u64,
    media_link: String,
}

fn u64_from_string<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    let raw = String::deserialize(de)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// One bucket reached through the JSON API.
pub struct GcsBucket {
    client: reqwest::blocking::Client,
    api_base: Url,
    bucket: String,
    token: Option<String>,
}

impl GcsBucket {
    /// Read-only handle with no credentials.
    pub fn anonymous(bucket: impl Into<String>, timeout: Option<Duration>) -> Result<Self, StorageError> {
        Self::with_api_base(GCS_API_BASE, bucket, None, timeout)
    }

    /// Handle that sends `token` as a bearer credential.
    pub fn authenticated(
        bucket: impl Into<String>,
        token: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, StorageError> {
        Self::with_api_base(GCS_API_BASE, bucket, Some(token.into()), timeout)
    }

    /// Handle against a non-default endpoint (emulators, proxies).
    pub fn with_api_base(
        api_base: &str,
        bucket: impl Into<String>,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, StorageError> {
        let api_base = Url::parse(api_base)
            .map_err(|e| StorageError::Transport(format!("invalid API base '{api_base}': {e}")))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base,
            bucket: bucket.into(),
            token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        self.api_base
            .join(path)
            .map_err(|e| StorageError::Transport(format!("invalid object URL: {e}")))
    }

    fn authorize(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn list_page(
        &self,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ListResponse, StorageError> {
        let mut url = self.endpoint(&format!("storage/v1/b/{}/o", self.bucket))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prefix", prefix);
            query.append_pair("fields", "items(name,size,mediaLink),nextPageToken");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let resp = self
            .authorize(self.client.get(url.clone()))
            .send()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        resp.json()
            .map_err(|e| StorageError::Decode(format!("object listing: {e}")))
    }
}

impl BlobStore for GcsBucket {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list(&self, prefix: &str) -> Result<Vec<BlobObject>, StorageError> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_page(prefix, page_token.as_deref())?;
            objects.extend(page.items.into_iter().map(|o| BlobObject {
                name: o.name,
                size: o.size,
                media_link: o.media_link,
            }));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        debug!(bucket = %self.bucket, prefix, count = objects.len(), "listed objects");
        Ok(objects)
    }

    fn upload(
        &self,
        name: &str,
        body: Vec<u8>,
        content_type: &str,
        acl: ObjectAcl,
    ) -> Result<(), StorageError> {
        if self.token.is_none() {
            return Err(StorageError::MissingCredentials {
                bucket: self.bucket.clone(),
            });
        }

        let mut url = self.endpoint(&format!("upload/storage/v1/b/{}/o", self.bucket))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("uploadType", "media");
            query.append_pair("name", name);
            if acl == ObjectAcl::PublicRead {
                query.append_pair("predefinedAcl", "publicRead");
            }
        }

        let resp = self
            .authorize(self.client.post(url.clone()))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        debug!(bucket = %self.bucket, name, "uploaded object");
        Ok(())
    }
}
