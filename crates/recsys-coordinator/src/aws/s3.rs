//! S3 bucket and object management for training data

use crate::aws::context::AwsContext;
use crate::aws::error::from_sdk_error;
use anyhow::{Context, Result};
use aws_sdk_s3::{Client, primitives::ByteStream};
use std::path::Path;
use tracing::{debug, info};

/// Service principal that reads the training data
pub const PERSONALIZE_PRINCIPAL: &str = "personalize.amazonaws.com";

/// S3 client for the training data bucket
pub struct S3Client {
    client: Client,
    region: String,
}

/// Bucket policy granting the recommendation service access to the bucket
pub fn training_bucket_policy(bucket_name: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Id": "PersonalizeS3BucketAccessPolicy",
        "Statement": [
            {
                "Sid": "PersonalizeS3BucketAccessPolicy",
                "Effect": "Allow",
                "Principal": { "Service": PERSONALIZE_PRINCIPAL },
                "Action": ["s3:*Object", "s3:ListBucket"],
                "Resource": [
                    format!("arn:aws:s3:::{}", bucket_name),
                    format!("arn:aws:s3:::{}/*", bucket_name)
                ]
            }
        ]
    })
    .to_string()
}

impl S3Client {
    /// Create an S3 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
            region: ctx.region().to_string(),
        }
    }

    /// Create the training data bucket.
    ///
    /// A bucket this account already owns is reused.
    pub async fn create_bucket(&self, bucket_name: &str) -> Result<()> {
        info!(bucket = %bucket_name, region = %self.region, "Creating S3 bucket");

        let mut request = self.client.create_bucket().bucket(bucket_name);

        // us-east-1 rejects an explicit location constraint
        if self.region != "us-east-1" {
            let location_constraint =
                aws_sdk_s3::types::BucketLocationConstraint::from(self.region.as_str());
            let create_config = aws_sdk_s3::types::CreateBucketConfiguration::builder()
                .location_constraint(location_constraint)
                .build();
            request = request.create_bucket_configuration(create_config);
        }

        match request.send().await.map_err(from_sdk_error) {
            Ok(_) => Ok(()),
            Err(e) if e.is_already_exists() => {
                debug!(bucket = %bucket_name, "Bucket already owned by this account");
                Ok(())
            }
            Err(e) => Err(e).context("Failed to create bucket"),
        }
    }

    /// Upload a file to S3, returning its `s3://` URI
    pub async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<String> {
        debug!(bucket = %bucket, key = %key, path = %path.display(), "Uploading file");

        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type("text/csv")
            .send()
            .await
            .map_err(from_sdk_error)
            .context("Failed to upload file")?;

        Ok(format!("s3://{}/{}", bucket, key))
    }

    /// Grant the recommendation service read access to the bucket
    pub async fn put_bucket_policy(&self, bucket: &str) -> Result<()> {
        info!(bucket = %bucket, "Configuring bucket policy");

        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(training_bucket_policy(bucket))
            .send()
            .await
            .map_err(from_sdk_error)
            .context("Failed to put bucket policy")?;

        Ok(())
    }

    /// Remove the bucket policy
    pub async fn delete_bucket_policy(&self, bucket: &str) -> Result<()> {
        debug!(bucket = %bucket, "Deleting bucket policy");

        self.client
            .delete_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk_error)
            .context("Failed to delete bucket policy")?;

        Ok(())
    }

    /// Delete a bucket and all its objects
    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        info!(bucket = %bucket, "Deleting bucket and contents");

        // List and delete all objects
        let mut continuation_token = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(from_sdk_error)
                .context("Failed to list objects")?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    debug!(key = %key, "Deleting object");
                    self.client
                        .delete_object()
                        .bucket(bucket)
                        .key(key)
                        .send()
                        .await
                        .map_err(from_sdk_error)
                        .context("Failed to delete object")?;
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        // Delete the bucket itself
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk_error)
            .context("Failed to delete bucket")?;

        Ok(())
    }
}
