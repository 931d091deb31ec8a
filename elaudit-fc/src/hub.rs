//! Remote Hub API client
//!
//! All network-facing calls related to module state and technician presence.
//! Push operations surface failures to the caller; the engine decides between
//! a user-visible error and the offline queue. Heartbeat and presence calls
//! are non-critical and their failures are only logged and counted upstream.

use std::time::Duration;

use thiserror::Error;

use elaudit_common::api::{
    AckResponse, AuditFetchResponse, BulkUpdateRequest, BulkUpdateResponse, HeartbeatRequest,
    ModuleUpdateRequest, ProjectSummary, RemoteUpdate, TechnicianInfo, TechniciansResponse,
    UpdatesResponse,
};

const USER_AGENT: &str = concat!("elaudit-fc/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Hub client errors
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Hub error {0}: {1}")]
    Api(u16, String),

    #[error("Hub rejected request: {0}")]
    Rejected(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<HubError> for elaudit_common::Error {
    fn from(e: HubError) -> Self {
        elaudit_common::Error::Network(e.to_string())
    }
}

/// HTTP client for one audit on the remote Hub
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    audit_token: String,
}

impl HubClient {
    pub fn new(base_url: &str, audit_token: &str) -> Result<Self, HubError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HubError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            audit_token: audit_token.to_string(),
        })
    }

    pub fn audit_token(&self) -> &str {
        &self.audit_token
    }

    fn audit_url(&self, path: &str) -> String {
        format!("{}/api/audit/{}{}", self.base_url, self.audit_token, path)
    }

    /// `GET /api/audit/{token}` — full audit snapshot for cold start
    pub async fn fetch_audit(&self) -> Result<AuditFetchResponse, HubError> {
        let response = self
            .http
            .get(self.audit_url(""))
            .send()
            .await
            .map_err(|e| HubError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HubError::Api(status.as_u16(), text));
        }

        response
            .json::<AuditFetchResponse>()
            .await
            .map_err(|e| HubError::Parse(e.to_string()))
    }

    /// `POST /api/audit/{token}/module/{moduleId}` — single module update
    pub async fn push_update(
        &self,
        module_id: &str,
        request: &ModuleUpdateRequest,
    ) -> Result<(), HubError> {
        let url = self.audit_url(&format!("/module/{}", module_id));
        let ack: AckResponse = self.post_json(&url, request).await?;

        if !ack.success {
            return Err(HubError::Rejected(
                ack.error.unwrap_or_else(|| "update refused".to_string()),
            ));
        }

        tracing::debug!(module_id, "Module update pushed");
        Ok(())
    }

    /// `POST /api/audit/{token}/bulk-update`
    ///
    /// Partial success is a normal result: the response reports how many ids
    /// were updated and how many the Hub did not know.
    pub async fn push_bulk(
        &self,
        request: &BulkUpdateRequest,
    ) -> Result<BulkUpdateResponse, HubError> {
        let url = self.audit_url("/bulk-update");
        let response: BulkUpdateResponse = self.post_json(&url, request).await?;

        if !response.success {
            return Err(HubError::Rejected("bulk update refused".to_string()));
        }

        tracing::info!(
            requested = request.modules.len(),
            updated = response.updated,
            not_found = response.not_found,
            "Bulk update pushed"
        );
        Ok(response)
    }

    /// `GET /api/audit/{token}/updates?since={epoch_ms}`
    ///
    /// Incremental fetch; an empty list is a normal, non-error result.
    pub async fn pull_since(&self, watermark_ms: i64) -> Result<Vec<RemoteUpdate>, HubError> {
        let url = self.audit_url(&format!("/updates?since={}", watermark_ms));
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| HubError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HubError::Api(status.as_u16(), text));
        }

        let parsed: UpdatesResponse = response
            .json()
            .await
            .map_err(|e| HubError::Parse(e.to_string()))?;

        if !parsed.success {
            return Err(HubError::Rejected("updates fetch refused".to_string()));
        }

        Ok(parsed.updates)
    }

    /// `POST /api/audit/{token}/heartbeat` — liveness beacon
    pub async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<(), HubError> {
        let url = self.audit_url("/heartbeat");
        let ack: AckResponse = self.post_json(&url, request).await?;
        if !ack.success {
            return Err(HubError::Rejected("heartbeat refused".to_string()));
        }
        Ok(())
    }

    /// `GET /api/audit/{token}/technicians` — active technician list
    pub async fn list_technicians(&self) -> Result<Vec<TechnicianInfo>, HubError> {
        let response = self
            .http
            .get(self.audit_url("/technicians"))
            .send()
            .await
            .map_err(|e| HubError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HubError::Api(status.as_u16(), text));
        }

        let parsed: TechniciansResponse = response
            .json()
            .await
            .map_err(|e| HubError::Parse(e.to_string()))?;

        Ok(parsed.technicians)
    }

    /// `POST /api/projects/sync` — push the audit summary to the Hub registry
    pub async fn push_summary(&self, summary: &ProjectSummary) -> Result<(), HubError> {
        let url = format!("{}/api/projects/sync", self.base_url);
        let ack: AckResponse = self.post_json(&url, summary).await?;
        if !ack.success {
            return Err(HubError::Rejected(
                ack.error.unwrap_or_else(|| "summary refused".to_string()),
            ));
        }
        tracing::info!("Project summary pushed to Hub");
        Ok(())
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, HubError>
    where
        B: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| HubError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HubError::Api(status.as_u16(), text));
        }

        response.json().await.map_err(|e| HubError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HubClient::new("http://hub.local:8080/", "tok-1");
        assert!(client.is_ok());
    }

    #[test]
    fn test_audit_url_strips_trailing_slash() {
        let client = HubClient::new("http://hub.local:8080/", "tok-1").unwrap();
        assert_eq!(
            client.audit_url("/module/M001"),
            "http://hub.local:8080/api/audit/tok-1/module/M001"
        );
        assert_eq!(client.audit_url(""), "http://hub.local:8080/api/audit/tok-1");
    }
}
