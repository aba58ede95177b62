use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::errors::ClientError;
use crate::models::{CreateShareRequest, ServerInfo, ShareEntry, UpdateShareRequest};
use crate::ocs_xml_parser::{parse_share_list, parse_single_share};

const SHARES_API: &str = "/ocs/v2.php/apps/files_sharing/api/v1/shares";
const CAPABILITIES_API: &str = "/ocs/v1.php/cloud/capabilities?format=json";

/// Client for the OCS REST endpoints layered over the same server.
#[derive(Clone)]
pub struct OcsService {
    client: Client,
    config: SessionConfig,
}

impl OcsService {
    pub fn new(config: SessionConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    fn shares_url(&self) -> String {
        format!("{}{}", self.config.server_url_trimmed(), SHARES_API)
    }

    fn ensure_success(
        status: reqwest::StatusCode,
        url: &str,
        operation: &str,
    ) -> Result<(), ClientError> {
        if status.is_success() {
            Ok(())
        } else {
            debug!("{} failed with HTTP {} for {}", operation, status, url);
            Err(ClientError::status(status.as_u16(), url))
        }
    }

    /// Query version and product from the capabilities endpoint.
    pub async fn server_info(&self) -> Result<ServerInfo, ClientError> {
        let url = format!("{}{}", self.config.server_url_trimmed(), CAPABILITIES_API);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("OCS-APIRequest", "true")
            .send()
            .await?;

        Self::ensure_success(response.status(), &url, "GET")?;
        let payload: serde_json::Value = response.json().await?;

        let data = &payload["ocs"]["data"];
        let info = ServerInfo {
            version: data["version"]["string"].as_str().map(str::to_string),
            product: data["capabilities"]["theming"]["name"]
                .as_str()
                .map(str::to_string),
        };
        info!(
            "Server reports version {:?}, product {:?}",
            info.version, info.product
        );
        Ok(info)
    }

    /// List shares, optionally limited to one path.
    pub async fn list_shares(&self, path: Option<&str>) -> Result<Vec<ShareEntry>, ClientError> {
        let url = self.shares_url();
        debug!("GET {} (path={:?})", url, path);

        let mut request = self
            .client
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("OCS-APIRequest", "true");
        if let Some(path) = path {
            request = request.query(&[("path", path), ("reshares", "true")]);
        }

        let response = request.send().await?;
        Self::ensure_success(response.status(), &url, "GET")?;
        let body = response.text().await?;
        parse_share_list(&body)
    }

    pub async fn get_share(&self, share_id: i64) -> Result<ShareEntry, ClientError> {
        let url = format!("{}/{}", self.shares_url(), share_id);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("OCS-APIRequest", "true")
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "GET")?;
        let body = response.text().await?;
        parse_single_share(&body)
    }

    pub async fn create_share(
        &self,
        request: &CreateShareRequest,
    ) -> Result<ShareEntry, ClientError> {
        let url = self.shares_url();
        debug!("POST {} (path={})", url, request.path);

        let mut form: Vec<(&str, String)> = vec![
            ("path", request.path.clone()),
            ("shareType", request.share_type.to_string()),
        ];
        if let Some(share_with) = &request.share_with {
            form.push(("shareWith", share_with.clone()));
        }
        if let Some(permissions) = request.permissions {
            form.push(("permissions", permissions.to_string()));
        }
        if let Some(password) = &request.password {
            form.push(("password", password.clone()));
        }
        if let Some(expire_date) = &request.expire_date {
            form.push(("expireDate", expire_date.clone()));
        }
        if let Some(note) = &request.note {
            form.push(("note", note.clone()));
        }
        if let Some(label) = &request.label {
            form.push(("label", label.clone()));
        }
        if let Some(public_upload) = request.public_upload {
            form.push(("publicUpload", public_upload.to_string()));
        }

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("OCS-APIRequest", "true")
            .form(&form)
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "POST")?;
        let body = response.text().await?;
        parse_single_share(&body)
    }

    pub async fn update_share(
        &self,
        share_id: i64,
        request: &UpdateShareRequest,
    ) -> Result<ShareEntry, ClientError> {
        let url = format!("{}/{}", self.shares_url(), share_id);
        debug!("PUT {}", url);

        let mut form: Vec<(&str, String)> = Vec::new();
        if let Some(permissions) = request.permissions {
            form.push(("permissions", permissions.to_string()));
        }
        if let Some(password) = &request.password {
            form.push(("password", password.clone()));
        }
        if let Some(expire_date) = &request.expire_date {
            form.push(("expireDate", expire_date.clone()));
        }
        if let Some(note) = &request.note {
            form.push(("note", note.clone()));
        }
        if let Some(label) = &request.label {
            form.push(("label", label.clone()));
        }

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("OCS-APIRequest", "true")
            .form(&form)
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "PUT")?;
        let body = response.text().await?;
        parse_single_share(&body)
    }

    pub async fn delete_share(&self, share_id: i64) -> Result<(), ClientError> {
        let url = format!("{}/{}", self.shares_url(), share_id);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("OCS-APIRequest", "true")
            .send()
            .await?;
        Self::ensure_success(response.status(), &url, "DELETE")
    }
}
