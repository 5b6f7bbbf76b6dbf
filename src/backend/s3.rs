//! S3-compatible network object-store backend.
//!
//! The namespace is flat: "folders" are key prefixes, there is no rename
//! primitive, and a move is copy + delete per object. `exists`/`stat`
//! use a metadata-only HEAD request so presence checks never download
//! bodies. Encryption flags ride along as S3 user metadata.
//!
//! When the signing endpoint is internal-only (e.g. a MinIO address on a
//! private network), presigned URLs are rewritten to the configured
//! public base URL before they leave this layer.

use std::time::Duration;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::debug;
use url::Url;

use super::{ObjectMetadata, StorageBackend, StoredObject};
use crate::body::ObjectBody;
use crate::error::{Result, StorageError};

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpoint used to sign and send requests. `None` for AWS proper.
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Externally reachable base URL, when it differs from `endpoint`.
    pub public_base_url: Option<String>,
    /// Path-style addressing; required for MinIO and most gateways.
    pub force_path_style: bool,
}

/// Storage backend over the S3 API.
pub struct S3Backend {
    client: S3Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    public_base_url: Option<String>,
    force_path_style: bool,
}

fn transport_err<E>(e: E) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::Unavailable(format!("{}", DisplayErrorContext(&e)))
}

impl S3Backend {
    /// Build a backend with a long-lived client. The client is created
    /// once and reused across all requests.
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "objvault",
        );

        let mut builder = S3ConfigBuilder::new()
            .behavior_version_latest()
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            public_base_url: config.public_base_url.clone(),
            force_path_style: config.force_path_style,
        }
    }

    /// Rewrite scheme/host/port of a signed URL to the public base URL,
    /// so internal endpoints never leak to external clients.
    fn rewrite_to_public(&self, signed: &str) -> Result<String> {
        let Some(public_base) = &self.public_base_url else {
            return Ok(signed.to_string());
        };

        let mut url = Url::parse(signed)
            .map_err(|e| StorageError::Unavailable(format!("unparsable signed URL: {e}")))?;
        let public = Url::parse(public_base).map_err(|e| {
            StorageError::Configuration(format!("invalid public base URL `{public_base}`: {e}"))
        })?;

        let _ = url.set_scheme(public.scheme());
        url.set_host(public.host_str())
            .map_err(|e| StorageError::Configuration(format!("invalid public host: {e}")))?;
        let _ = url.set_port(public.port());
        Ok(url.to_string())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<()> {
        let user = metadata.to_user_metadata();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .content_type(content_type)
            .content_length(data.len() as i64)
            .set_metadata(if user.is_empty() { None } else { Some(user) })
            .send()
            .await
            .map_err(transport_err)?;

        debug!(key, bytes = data.len(), "Stored object in S3 bucket");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::NotFound(key.to_string())
                } else {
                    transport_err(service_err)
                }
            })?;

        let size = resp.content_length().unwrap_or_default().max(0) as u64;
        let metadata = ObjectMetadata::from_user_metadata(resp.metadata(), resp.content_type(), size);

        Ok(StoredObject {
            body: ObjectBody::from(resp.body),
            metadata,
        })
    }

    async fn stat(&self, key: &str) -> Result<ObjectMetadata> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    StorageError::NotFound(key.to_string())
                } else {
                    transport_err(service_err)
                }
            })?;

        let size = resp.content_length().unwrap_or_default().max(0) as u64;
        Ok(ObjectMetadata::from_user_metadata(
            resp.metadata(),
            resp.content_type(),
            size,
        ))
    }

    /// Delete is idempotent: S3 reports success for absent keys.
    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(transport_err(service_err))
                }
            }
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let resp = request.send().await.map_err(transport_err)?;

            if let Some(contents) = resp.contents {
                for obj in contents {
                    if let Some(key) = obj.key {
                        keys.push(key);
                    }
                }
            }

            match resp.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>> {
        // Delimiter-aware listing restricted to one level: common
        // prefixes below `prefix` are the "subfolders".
        let base = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };

        let mut names = Vec::new();
        let mut continuation_token: Option<String> = None;

        // Common prefixes count against the page size too, so this has
        // to page like `list` does.
        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&base)
                .delimiter("/");

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let resp = request.send().await.map_err(transport_err)?;

            if let Some(prefixes) = resp.common_prefixes {
                for cp in prefixes {
                    if let Some(p) = cp.prefix {
                        let trimmed = p.trim_end_matches('/');
                        let name = trimmed.strip_prefix(base.as_str()).unwrap_or(trimmed);
                        if !name.is_empty() {
                            names.push(name.to_string());
                        }
                    }
                }
            }

            match resp.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(names)
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, src_key))
            .key(dst_key)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("{}", DisplayErrorContext(&e));
                // CopyObject reports a missing source as NoSuchKey.
                if msg.contains("NoSuchKey") {
                    StorageError::NotFound(src_key.to_string())
                } else {
                    StorageError::Unavailable(msg)
                }
            })?;
        Ok(())
    }

    /// Flat namespaces have no folders to create; the "folder" appears
    /// with the first object written under its prefix.
    async fn create_dir(&self, prefix: &str) -> Result<()> {
        debug!(prefix, "create_dir is a no-op on the s3 backend");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        // Path-style URLs need an absolute base; prefer the public base
        // URL, then the signing endpoint. With neither configured the
        // virtual-hosted AWS form is the only absolute URL we can build.
        if self.force_path_style {
            if let Some(base) = self
                .public_base_url
                .as_deref()
                .or(self.endpoint.as_deref())
            {
                return format!("{}/{}/{key}", base.trim_end_matches('/'), self.bucket);
            }
        }
        format!("https://{}.s3.{}.amazonaws.com/{key}", self.bucket, self.region)
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String> {
        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Configuration(format!("invalid presign TTL: {e}")))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(transport_err)?;

        let public = self.rewrite_to_public(presigned.uri())?;
        debug!(key, "Issued signed URL");
        Ok(public)
    }
}
