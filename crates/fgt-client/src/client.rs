//! FortiOS REST API client implementation

use std::net::Ipv4Addr;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{FgtError, Result};
use crate::types::*;

/// Status and raw body of a completed request
///
/// Non-2xx statuses are not errors at this level; callers decide whether a
/// status is fatal via [`ApiResponse::into_result`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-2xx status into [`FgtError::Api`]
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FgtError::api(self.status.as_u16(), self.body))
        }
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| FgtError::Parse(e.to_string()))
    }
}

/// Client for one FortiGate's REST API
///
/// Every request carries `Authorization: Bearer <token>`. When a VDOM is set
/// with [`FgtClient::in_vdom`], requests are scoped with `?vdom=<name>`.
#[derive(Debug, Clone)]
pub struct FgtClient {
    client: Client,
    base_url: Url,
    vdom: Option<String>,
    config: ClientConfig,
}

impl FgtClient {
    /// Create a client for the device at `address`
    pub fn new(address: Ipv4Addr, token: &str, config: &ClientConfig) -> Result<Self> {
        let base_url = config.device_url(address)?;
        Self::with_base_url(base_url.as_str(), token, config)
    }

    /// Create a client for an explicit API base URL (e.g. `https://fw/api/v2/`)
    pub fn with_base_url(base_url: &str, token: &str, config: &ClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut header_value =
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| FgtError::input(format!("Invalid API token: {}", e)))?;
        header_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, header_value);

        if config.insecure {
            warn!("TLS certificate verification disabled for {}", base_url);
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .default_headers(headers)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        let base_url = Url::parse(base_url)?;

        Ok(Self {
            client,
            base_url,
            vdom: None,
            config: config.clone(),
        })
    }

    /// A copy of this client whose requests are scoped to `vdom`
    pub fn in_vdom(&self, vdom: &str) -> Self {
        Self {
            vdom: Some(vdom.to_string()),
            ..self.clone()
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn vdom(&self) -> Option<&str> {
        self.vdom.as_deref()
    }

    // =========================================================================
    // Raw Requests
    // =========================================================================

    #[instrument(skip(self), fields(vdom = ?self.vdom))]
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(self.request(Method::GET, path)?).await
    }

    #[instrument(skip(self, body), fields(vdom = ?self.vdom))]
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.send(self.request(Method::POST, path)?.json(body)).await
    }

    #[instrument(skip(self, body), fields(vdom = ?self.vdom))]
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.send(self.request(Method::PUT, path)?.json(body)).await
    }

    #[instrument(skip(self), fields(vdom = ?self.vdom))]
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(self.request(Method::DELETE, path)?).await
    }

    // =========================================================================
    // System / VDOM
    // =========================================================================

    /// List configured VDOMs in the order the device returns them
    pub async fn list_vdoms(&self) -> Result<Vec<Vdom>> {
        self.get_results("cmdb/system/vdom").await
    }

    // =========================================================================
    // Firmware
    // =========================================================================

    /// Query the running firmware and the images offered for upgrade
    pub async fn firmware(&self) -> Result<FirmwareInventory> {
        let results: FirmwareResults = self.get_results("monitor/system/firmware").await?;
        Ok(results.into())
    }

    /// Upload a base64-encoded image; returns the file identifier, if the device sent one
    #[instrument(skip(self, file_content), fields(size = file_content.len()))]
    pub async fn upload_firmware(&self, filename: &str, file_content: &str) -> Result<Option<String>> {
        let body = FirmwareUploadRequest {
            source: "upload",
            file_content,
            filename,
        };
        let request = self
            .request(Method::POST, "monitor/system/firmware/upgrade")?
            .timeout(self.config.upload_timeout())
            .json(&body);

        let response = self.send(request).await?.into_result()?;
        let value: serde_json::Value = response.json()?;
        let file_id = value
            .get("file_id")
            .or_else(|| value.pointer("/results/file_id"))
            .and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        Ok(file_id)
    }

    /// Download the global configuration; returns the raw body
    pub async fn backup_config(&self) -> Result<String> {
        let response = self
            .post("monitor/system/config/backup", &ConfigBackupRequest::default())
            .await?
            .into_result()?;
        Ok(response.body)
    }

    // =========================================================================
    // SD-WAN
    // =========================================================================

    /// Create SD-WAN zones
    pub async fn create_sdwan_zones(&self, zones: &[&str]) -> Result<()> {
        let body = SdwanZoneUpdate {
            zone: zones
                .iter()
                .map(|z| NamedRef {
                    name: z.to_string(),
                })
                .collect(),
        };
        self.put("cmdb/system/sdwan", &body).await?.into_result()?;
        Ok(())
    }

    /// Attach interface members to SD-WAN zones
    pub async fn set_sdwan_members(&self, members: Vec<SdwanMember>) -> Result<()> {
        let body = SdwanMemberUpdate { members };
        self.put("cmdb/system/sdwan", &body).await?.into_result()?;
        Ok(())
    }

    // =========================================================================
    // Static Routes
    // =========================================================================

    pub async fn list_static_routes(&self) -> Result<Vec<StaticRoute>> {
        self.get_results("cmdb/router/static").await
    }

    pub async fn create_static_route(&self, route: &NewStaticRoute) -> Result<()> {
        self.post("cmdb/router/static", route).await?.into_result()?;
        Ok(())
    }

    pub async fn delete_static_route(&self, seq_num: u64) -> Result<()> {
        self.delete(&format!("cmdb/router/static/{}", seq_num))
            .await?
            .into_result()?;
        Ok(())
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    fn build_url(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        if let Some(vdom) = &self.vdom {
            url.query_pairs_mut().append_pair("vdom", vdom);
        }
        Ok(url)
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.build_url(path)?;
        debug!("{} {}", method, url);
        Ok(self.client.request(method, url))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!("Request failed with HTTP {}", status);
        }
        Ok(ApiResponse { status, body })
    }

    async fn get_results<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path).await?.into_result()?;
        response.json::<Results<T>>().map(|r| r.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> FgtClient {
        FgtClient::new(Ipv4Addr::new(10, 1, 1, 1), "token", &ClientConfig::default()).unwrap()
    }

    #[test]
    fn test_client_creation() {
        assert_eq!(client().base_url().as_str(), "https://10.1.1.1/api/v2/");
    }

    #[test]
    fn test_invalid_url() {
        let result = FgtClient::with_base_url("not a url", "token", &ClientConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = FgtClient::new(Ipv4Addr::LOCALHOST, "bad\ntoken", &ClientConfig::default());
        assert!(matches!(result, Err(FgtError::InputValidation(_))));
    }

    #[test]
    fn test_vdom_scoped_url() {
        let scoped = client().in_vdom("traffic");
        let url = scoped.build_url("cmdb/router/static/3").unwrap();
        assert_eq!(
            url.as_str(),
            "https://10.1.1.1/api/v2/cmdb/router/static/3?vdom=traffic"
        );
        assert_eq!(client().build_url("/cmdb/system/vdom").unwrap().query(), None);
    }

    #[test]
    fn test_api_response_into_result() {
        let ok = ApiResponse {
            status: StatusCode::OK,
            body: "{}".into(),
        };
        assert!(ok.into_result().is_ok());

        let err = ApiResponse {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".into(),
        }
        .into_result()
        .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }
}
