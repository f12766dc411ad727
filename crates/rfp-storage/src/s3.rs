//! S3-compatible object storage.

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;

use crate::{BackendKind, DurableStorage, StorageError, StorageKey};

/// Objects stored in an S3 bucket under an optional prefix.
#[derive(Debug, Clone)]
pub struct S3Storage {
    bucket: String,
    prefix: String,
    client: aws_sdk_s3::Client,
}

impl S3Storage {
    /// Connect using the default credential chain.
    pub async fn connect(bucket: &str, prefix: &str, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let aws_config = loader.load().await;

        Self::with_client(bucket, prefix, aws_sdk_s3::Client::new(&aws_config))
    }

    /// Wrap an existing client.
    pub fn with_client(bucket: &str, prefix: &str, client: aws_sdk_s3::Client) -> Self {
        Self {
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
            client,
        }
    }

    fn object_key(&self, key: &StorageKey) -> String {
        key.with_prefix(&self.prefix)
    }
}

fn classify<E>(op: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: std::error::Error + 'static,
{
    let message = format!("{op}: {}", DisplayErrorContext(&err));
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            StorageError::Unreachable(message)
        }
        SdkError::ServiceError(service) => match service.raw().status().as_u16() {
            401 | 403 => StorageError::Denied(message),
            _ => StorageError::Operation(message),
        },
        _ => StorageError::Operation(message),
    }
}

#[async_trait]
impl DurableStorage for S3Storage {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn location(&self, key: &StorageKey) -> String {
        format!("s3://{}/{}", self.bucket, self.object_key(key))
    }

    async fn probe(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| match classify("head_bucket", e) {
                // A bucket we cannot see is as good as unreachable.
                StorageError::Operation(msg) => StorageError::Unreachable(msg),
                other => other,
            })
    }

    async fn put(&self, key: &StorageKey, data: &[u8]) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify("put_object", e))
    }

    async fn get(&self, key: &StorageKey) -> Result<Option<Vec<u8>>, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => {
                return Ok(None)
            }
            Err(e) => return Err(classify("get_object", e)),
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Operation(format!("get_object body: {e}")))?;
        Ok(Some(bytes.into_bytes().to_vec()))
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(classify("head_object", e)),
        }
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify("delete_object", e))
    }
}
