use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum ImageUploadError {
    #[error("GCS upload error: {0}")]
    Gcs(String),
    #[error("Invalid image format: {0}")]
    InvalidImageFormat(String),
}

impl From<ImageUploadError> for AppError {
    fn from(err: ImageUploadError) -> Self {
        AppError::Storage(err.to_string())
    }
}

pub struct ImageService {
    client: Client,
    bucket_name: String,
}

impl ImageService {
    pub async fn new(bucket_name: &str) -> Result<Self, ImageUploadError> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| ImageUploadError::Gcs(format!("Failed to create GCS client: {}", e)))?;

        Ok(Self {
            client: Client::new(config),
            bucket_name: bucket_name.to_string(),
        })
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Lists one object to prove the bucket is reachable.
    pub async fn check(&self) -> Result<(), ImageUploadError> {
        let list_request = ListObjectsRequest {
            bucket: self.bucket_name.clone(),
            max_results: Some(1),
            ..Default::default()
        };
        self.client
            .list_objects(&list_request)
            .await
            .map(|_| ())
            .map_err(|e| ImageUploadError::Gcs(format!("Failed to access bucket: {}", e)))
    }

    /// Uploads under `prefix/` and returns the object's public URL.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        prefix: &str,
    ) -> Result<String, ImageUploadError> {
        let extension = file_extension(mime_type)?;
        let timestamp = chrono::Utc::now().timestamp();
        let object_name = format!("{}/{}-{}.{}", prefix, timestamp, Uuid::new_v4(), extension);

        let mut media = Media::new(object_name.clone());
        media.content_type = mime_type.to_string().into();
        let upload_type = UploadType::Simple(media);
        let upload_request = UploadObjectRequest {
            bucket: self.bucket_name.clone(),
            ..Default::default()
        };

        self.client
            .upload_object(&upload_request, bytes, &upload_type)
            .await
            .map_err(|e| ImageUploadError::Gcs(format!("Failed to upload to GCS: {}", e)))?;

        log::info!("Uploaded image {} to bucket {}", object_name, self.bucket_name);
        Ok(public_url(&self.bucket_name, &object_name))
    }
}

pub fn public_url(bucket: &str, object_name: &str) -> String {
    format!("https://storage.googleapis.com/{}/{}", bucket, object_name)
}

fn file_extension(mime_type: &str) -> Result<&'static str, ImageUploadError> {
    match mime_type {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        other => Err(ImageUploadError::InvalidImageFormat(format!(
            "Unsupported file type: {}",
            other
        ))),
    }
}
