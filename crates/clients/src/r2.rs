use std::env;

use anyhow::{anyhow, Result};
use sadam_common::{define_module_client, ModuleClient};
use uuid::Uuid;

use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Credentials, Region},
    Client as S3Client,
};

define_module_client! {
    (struct R2Client, "r2")
    client_type: S3Client,
    env: ["R2_ACCOUNT_ID", "R2_ACCESS_KEY_ID", "R2_SECRET_ACCESS_KEY", "R2_BUCKET_NAME"],
    setup: async {
        let account_id = env::var("R2_ACCOUNT_ID").expect("R2_ACCOUNT_ID is not set");
        let access_key_id = env::var("R2_ACCESS_KEY_ID").expect("R2_ACCESS_KEY_ID is not set");
        let secret_access_key = env::var("R2_SECRET_ACCESS_KEY").expect("R2_SECRET_ACCESS_KEY is not set");

        let endpoint_url = format!("https://{}.r2.cloudflarestorage.com", account_id);

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "r2-client"
        );

        let s3_config = S3ConfigBuilder::new()
            .endpoint_url(endpoint_url)
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .behavior_version_latest()
            .build();

        S3Client::from_conf(s3_config)
    }
}

impl R2Client {
    pub fn bucket_name(&self) -> String {
        env::var("R2_BUCKET_NAME").expect("R2_BUCKET_NAME is not set")
    }

    pub fn public_domain(&self) -> String {
        env::var("R2_PUBLIC_DOMAIN").unwrap_or_else(|_| format!("{}.r2.dev", self.bucket_name()))
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("https://{}/{}/{}", self.public_domain(), self.bucket_name(), key)
    }

    pub fn portrait_key(file_extension: &str) -> String {
        format!("portraits/{}.{}", Uuid::new_v4(), file_extension)
    }

    /// Write bytes under `key` and return the public URL. The preceding
    /// delete is best-effort collision avoidance and never fails the write;
    /// none of this is transactional with the relational store.
    pub async fn upload_bytes(&self, key: &str, file_extension: &str, data: &[u8]) -> Result<String> {
        let delete = self.get_client()
            .delete_object()
            .bucket(self.bucket_name())
            .key(key)
            .send()
            .await;
        if let Err(e) = delete {
            tracing::warn!("[R2Client::upload_bytes] delete before write failed for {}: {}", key, e);
        }

        self.get_client()
            .put_object()
            .bucket(self.bucket_name())
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(data.to_vec()))
            .content_type(format!("image/{}", file_extension))
            .send()
            .await
            .map_err(|e| anyhow!("failed to upload to R2: {}", e))?;

        Ok(self.public_url(key))
    }
}
