use anyhow::Context;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::export::{Block, DocumentBuilder};
use crate::models::Article;

/// Children per append request accepted by the document service.
pub const BATCH_SIZE: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status} with undecodable body: {body}")]
    Status { status: u16, body: String },
    #[error("document service error {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("document service response is missing {0}")]
    MissingField(&'static str),
    #[error("a volume id is required before publishing")]
    MissingVolume,
}

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
}

#[derive(Deserialize)]
struct CreatedDocument {
    document: DocumentMeta,
}

#[derive(Deserialize)]
struct DocumentMeta {
    document_id: String,
}

#[derive(Deserialize)]
struct RootBlock {
    block: BlockMeta,
}

#[derive(Deserialize)]
struct BlockMeta {
    block_id: String,
}

#[derive(Serialize)]
struct AppendChildren<'a> {
    children: &'a [Block],
    index: usize,
}

/// Client for the collaborative document service used to publish each
/// weekly report.
pub struct DocsPublisher {
    client: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    doc_url_base: String,
    folder_token: Option<String>,
    token: Mutex<Option<String>>,
}

impl DocsPublisher {
    pub fn new(
        base_url: &str,
        app_id: &str,
        app_secret: &str,
        doc_url_base: &str,
        folder_token: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            doc_url_base: doc_url_base.trim_end_matches('/').to_string(),
            folder_token,
            token: Mutex::new(None),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let (app_id, app_secret) = config.feishu_credentials()?;
        Self::new(
            &config.feishu_base_url,
            app_id,
            app_secret,
            &config.feishu_doc_url_base,
            config.feishu_folder_token.clone(),
        )
    }

    /// Tenant token, fetched once per client.
    pub async fn tenant_token(&self) -> Result<String, PublishError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .client
            .post(format!("{}/auth/v3/tenant_access_token/internal", self.base_url))
            .json(&json!({"app_id": self.app_id, "app_secret": self.app_secret}))
            .send()
            .await?;
        let parsed: TokenResponse = decode(response).await?;

        if parsed.code != 0 {
            return Err(PublishError::Api {
                code: parsed.code,
                msg: parsed.msg,
            });
        }
        let token = parsed
            .tenant_access_token
            .ok_or(PublishError::MissingField("tenant_access_token"))?;

        *cached = Some(token.clone());
        Ok(token)
    }

    /// Obtains a token to confirm the credentials work.
    pub async fn check_connection(&self) -> Result<(), PublishError> {
        self.tenant_token().await.map(|_| ())
    }

    pub async fn create_document(&self, title: &str) -> Result<String, PublishError> {
        let mut payload = json!({ "title": title });
        if let Some(folder) = &self.folder_token {
            payload["folder_token"] = Value::String(folder.clone());
        }

        let request = self
            .client
            .post(format!("{}/docx/v1/documents", self.base_url))
            .json(&payload);
        let created: CreatedDocument = self.call(request, "data.document").await?;

        debug!(document_id = %created.document.document_id, "created document");
        Ok(created.document.document_id)
    }

    pub async fn root_block(&self, document_id: &str) -> Result<String, PublishError> {
        let request = self.client.get(format!(
            "{}/docx/v1/documents/{}/blocks/{}",
            self.base_url, document_id, document_id
        ));
        let root: RootBlock = self.call(request, "data.block").await?;
        Ok(root.block.block_id)
    }

    /// Appends `blocks` under `parent` starting at `index`, in batches.
    pub async fn append_blocks(
        &self,
        document_id: &str,
        parent: &str,
        blocks: &[Block],
        index: usize,
    ) -> Result<(), PublishError> {
        let url = format!(
            "{}/docx/v1/documents/{}/blocks/{}/children",
            self.base_url, document_id, parent
        );

        let mut position = index;
        for batch in blocks.chunks(BATCH_SIZE) {
            let request = self.client.post(&url).json(&AppendChildren {
                children: batch,
                index: position,
            });
            let _: Value = self.call(request, "data").await?;
            position += batch.len();
        }
        Ok(())
    }

    /// Lets anyone with the link edit the document.
    pub async fn set_public_edit(&self, document_id: &str) -> Result<(), PublishError> {
        let request = self
            .client
            .patch(format!(
                "{}/drive/v1/permissions/{}/public?type=docx",
                self.base_url, document_id
            ))
            .json(&json!({
                "external_access_entity": "open",
                "security_entity": "anyone_can_edit",
                "comment_entity": "anyone_can_view",
                "share_entity": "anyone",
                "link_share_entity": "anyone_editable"
            }));
        let _: Value = self.call(request, "data").await?;
        Ok(())
    }

    /// Creates the volume's document and fills it with the articles.
    /// Returns the document id and its shareable URL.
    pub async fn publish_report(
        &self,
        volume: &str,
        title: &str,
        articles: &[Article],
    ) -> Result<(String, String), PublishError> {
        if volume.trim().is_empty() {
            return Err(PublishError::MissingVolume);
        }

        let document_id = self.create_document(title).await?;

        // A private document is still usable, so this only warns
        if let Err(e) = self.set_public_edit(&document_id).await {
            warn!(error = %e, "could not open document permissions");
        }

        let blocks = DocumentBuilder::build(articles);
        let root = self.root_block(&document_id).await?;
        self.append_blocks(&document_id, &root, &blocks, 0).await?;

        let url = format!("{}/{}", self.doc_url_base, document_id);
        info!(volume, blocks = blocks.len(), %url, "published report");
        Ok((document_id, url))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        field: &'static str,
    ) -> Result<T, PublishError> {
        let token = self.tenant_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let envelope: Envelope<T> = decode(response).await?;

        if envelope.code != 0 {
            return Err(PublishError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        envelope.data.ok_or(PublishError::MissingField(field))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PublishError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|_| PublishError::Status { status, body })
}
