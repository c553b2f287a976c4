//! Reqwest-backed [`ServiceApi`] implementation.
//!
//! All connection details come from [`ServiceConfig`]; filenames are pushed
//! as percent-encoded path segments so names with spaces or `#` survive.

use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::client::{ApiError, ServiceApi};
use crate::api::types::{
    ContentResponse, FileList, HealthResponse, JobStatus, ProcessRequest, TaskId, TaskResponse,
    UploadResponse,
};
use crate::artifacts::Preview;
use crate::asset::AssetRef;
use crate::config::{Engine, ServiceConfig};

/// Job-creation body as sent on the wire.
#[derive(Serialize)]
struct ProcessBody<'a> {
    #[serde(flatten)]
    request: &'a ProcessRequest,
    engine: &'a str,
}

// ---------------------------------------------------------------------------
// HttpServiceClient
// ---------------------------------------------------------------------------

pub struct HttpServiceClient {
    client: reqwest::Client,
    base_url: Url,
    engine: Engine,
}

impl HttpServiceClient {
    /// Build a client from config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidUrl`] when `base_url` does not parse or cannot
    /// take path segments (e.g. `mailto:`).
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            engine: config.engine,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `segments` to the base URL path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, url: Url) -> Result<T, ApiError> {
        let response = self.client.get(url).send().await?;
        read_json(endpoint, ensure_success(endpoint, response)?).await
    }
}

fn ensure_success(endpoint: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

async fn read_json<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Parse {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }
        }
    })
}

#[async_trait]
impl ServiceApi for HttpServiceClient {
    async fn health(&self) -> Result<(), ApiError> {
        let body: HealthResponse = self.get_json("health", self.endpoint(&["health"])?).await?;
        log::debug!("service health: {}", body.status);
        Ok(())
    }

    async fn upload(&self, asset: &AssetRef) -> Result<String, ApiError> {
        let url = self.endpoint(&["api", "upload"])?;
        let part = reqwest::multipart::Part::bytes(asset.bytes().to_vec())
            .file_name(asset.name().to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self.client.post(url).multipart(form).send().await?;
        let body: UploadResponse = read_json("upload", ensure_success("upload", response)?).await?;
        Ok(body.filename)
    }

    async fn create_job(&self, request: &ProcessRequest) -> Result<TaskId, ApiError> {
        let url = self.endpoint(&["api", "process"])?;
        let body = ProcessBody {
            request,
            engine: self.engine.as_str(),
        };

        let response = self.client.post(url).json(&body).send().await?;
        let body: TaskResponse = read_json("process", ensure_success("process", response)?).await?;
        Ok(body.task_id)
    }

    async fn job_status(&self, task_id: &TaskId) -> Result<JobStatus, ApiError> {
        let url = self.endpoint(&["api", "status", task_id.as_str()])?;
        self.get_json("status", url).await
    }

    async fn list_outputs(&self) -> Result<Vec<String>, ApiError> {
        let body: FileList = self.get_json("outputs", self.endpoint(&["api", "outputs"])?).await?;
        Ok(body.files)
    }

    async fn list_uploads(&self) -> Result<Vec<String>, ApiError> {
        let body: FileList = self.get_json("files", self.endpoint(&["api", "files"])?).await?;
        Ok(body.files)
    }

    async fn fetch_preview(&self, filename: &str) -> Result<Preview, ApiError> {
        let url = self.endpoint(&["api", "content", filename])?;
        let body: ContentResponse = self.get_json("content", url).await?;
        Ok(body.content)
    }

    fn download_url(&self, filename: &str) -> String {
        match self.endpoint(&["api", "download", filename]) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}/api/download/{filename}", self.base_url),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
