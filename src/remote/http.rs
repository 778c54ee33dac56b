//! HTTP 后端：通过 reqwest 调用 Megaverse REST 接口
//!
//! - 变更：`POST/DELETE {base}/{polyanets|soloons|comeths}`，JSON body 为 `{row, column, candidateId[, color|direction]}`
//! - 读取：`GET {base}/map/{candidateId}/goal` 与 `GET {base}/map/{candidateId}`
//!
//! 非 2xx 映射为 [`RemoteError::Status`]；网络层故障按 source 链分类，供重试处理器判断。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::astral::{Color, Direction, Grid};
use crate::core::{NetworkErrorKind, RemoteError};
use crate::remote::MegaverseApi;

#[derive(Debug, Deserialize)]
struct GoalMapResponse {
    #[serde(default)]
    goal: Grid,
}

#[derive(Debug, Deserialize)]
struct CurrentMapResponse {
    map: CurrentMap,
}

#[derive(Debug, Deserialize)]
struct CurrentMap {
    #[serde(default)]
    content: Grid,
}

/// HTTP 客户端：持有 reqwest Client、base_url 与 candidate id
pub struct HttpMegaverseApi {
    client: Client,
    base_url: String,
    candidate_id: String,
}

impl HttpMegaverseApi {
    pub fn new(base_url: &str, candidate_id: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            candidate_id: candidate_id.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn mutate(
        &self,
        method: Method,
        endpoint: &str,
        row: usize,
        column: usize,
        attribute: Option<(&str, &str)>,
    ) -> Result<(), RemoteError> {
        let mut body = json!({
            "row": row,
            "column": column,
            "candidateId": self.candidate_id,
        });
        if let Some((key, value)) = attribute {
            body[key] = Value::from(value);
        }

        let op = format!("{} /{}", method, endpoint);
        let result = self.send(method, endpoint, &body).await;
        match &result {
            Ok(()) => tracing::debug!(op = %op, row, column, "mutation ok"),
            Err(e) => tracing::warn!(op = %op, row, column, status = ?e.status_code(), error = %e, "mutation failed"),
        }
        result
    }

    async fn send(&self, method: Method, endpoint: &str, body: &Value) -> Result<(), RemoteError> {
        let resp = self
            .client
            .request(method, self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(resp).await.map(|_| ())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let result = self.fetch(path).await;
        if let Err(e) = &result {
            tracing::warn!(path, status = ?e.status_code(), error = %e, "fetch failed");
        }
        result
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let resp = check_status(resp).await?;
        // 读 body 的中断走网络分类，只有解析失败才是 Decode
        let body = resp.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// 非 2xx 时读出 body 作为错误信息
async fn check_status(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::status(status.as_u16(), body))
}

/// 将 reqwest 错误归类为网络故障（超时、连接重置、DNS、拒绝连接）、解码失败或其它
fn map_reqwest_error(err: reqwest::Error) -> RemoteError {
    let message = err.to_string();
    if err.is_timeout() {
        return RemoteError::network(NetworkErrorKind::Timeout, message);
    }

    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            let kind = match io.kind() {
                std::io::ErrorKind::ConnectionReset => Some(NetworkErrorKind::ConnectionReset),
                std::io::ErrorKind::ConnectionRefused => Some(NetworkErrorKind::ConnectionRefused),
                std::io::ErrorKind::TimedOut => Some(NetworkErrorKind::Timeout),
                _ => None,
            };
            if let Some(kind) = kind {
                return RemoteError::network(kind, message);
            }
        }
        let text = cause.to_string().to_lowercase();
        if text.contains("dns") || text.contains("failed to lookup") || text.contains("resolve") {
            return RemoteError::network(NetworkErrorKind::Dns, message);
        }
        if text.contains("connection closed before message completed")
            || text.contains("end of file before message length reached")
        {
            return RemoteError::network(NetworkErrorKind::ConnectionReset, message);
        }
        source = cause.source();
    }

    // body 读取中断也会带 decode 标记，必须在 source 链之后判断
    if err.is_decode() {
        return RemoteError::Decode(message);
    }
    if err.is_connect() {
        return RemoteError::network(NetworkErrorKind::ConnectionRefused, message);
    }
    RemoteError::network(NetworkErrorKind::Other, message)
}

#[async_trait]
impl MegaverseApi for HttpMegaverseApi {
    async fn create_polyanet(&self, row: usize, column: usize) -> Result<(), RemoteError> {
        self.mutate(Method::POST, "polyanets", row, column, None).await
    }

    async fn delete_polyanet(&self, row: usize, column: usize) -> Result<(), RemoteError> {
        self.mutate(Method::DELETE, "polyanets", row, column, None).await
    }

    async fn create_soloon(&self, row: usize, column: usize, color: Color) -> Result<(), RemoteError> {
        self.mutate(Method::POST, "soloons", row, column, Some(("color", color.as_str())))
            .await
    }

    async fn delete_soloon(&self, row: usize, column: usize) -> Result<(), RemoteError> {
        self.mutate(Method::DELETE, "soloons", row, column, None).await
    }

    async fn create_cometh(
        &self,
        row: usize,
        column: usize,
        direction: Direction,
    ) -> Result<(), RemoteError> {
        self.mutate(
            Method::POST,
            "comeths",
            row,
            column,
            Some(("direction", direction.as_str())),
        )
        .await
    }

    async fn delete_cometh(&self, row: usize, column: usize) -> Result<(), RemoteError> {
        self.mutate(Method::DELETE, "comeths", row, column, None).await
    }

    async fn fetch_goal_grid(&self) -> Result<Grid, RemoteError> {
        let path = format!("map/{}/goal", self.candidate_id);
        let resp: GoalMapResponse = self.get_json(&path).await?;
        tracing::info!(size = resp.goal.size(), "fetched goal map");
        Ok(resp.goal)
    }

    async fn fetch_observed_grid(&self) -> Result<Grid, RemoteError> {
        let path = format!("map/{}", self.candidate_id);
        let resp: CurrentMapResponse = self.get_json(&path).await?;
        tracing::info!(size = resp.map.content.size(), "fetched current map");
        Ok(resp.map.content)
    }
}
