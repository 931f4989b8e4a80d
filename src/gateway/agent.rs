use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ClaimDraftGateway, ExtractionGateway, GatewayError};
use crate::claim::ClaimRequest;
use crate::config::AgentConfig;
use crate::models::{ClaimDraft, ExtractedInvoiceDetails};
use crate::pipeline::intake::InvoiceDocument;

const INVOICE_PROMPT: &str = "Extract invoice details from the uploaded file";

/// HTTP client for the remote agent service.
///
/// - `POST {base}/assets` stores a document, answering `{success, asset_ids, error}`
/// - `POST {base}/agents/{id}/invoke` runs an agent, answering
///   `{success, error, response: {status, result}}`
pub struct AgentClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
    invoice_agent_id: String,
    claim_agent_id: String,
}

impl AgentClient {
    pub fn new(config: &AgentConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: config.timeout.as_secs(),
            invoice_agent_id: config.invoice_agent_id.clone(),
            claim_agent_id: config.claim_agent_id.clone(),
        })
    }

    /// Client configured from `WARRANTY_AGENT_*` environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(&AgentConfig::from_env())
    }

    fn map_send_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_connect() {
            GatewayError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            GatewayError::Timeout(self.timeout_secs)
        } else {
            GatewayError::HttpClient(e.to_string())
        }
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        agent_id: &str,
        message: &str,
        assets: &[String],
    ) -> Result<T, GatewayError> {
        let url = format!("{}/agents/{}/invoke", self.base_url, agent_id);
        let body = InvokeRequest { message, assets };

        tracing::debug!(agent_id, assets = assets.len(), "Invoking agent");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let envelope: AgentEnvelope = Self::read_json(response).await?;
        unwrap_agent_result(envelope)
    }
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    message: &'a str,
    assets: &'a [String],
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    success: bool,
    #[serde(default)]
    asset_ids: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentEnvelope {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    response: Option<AgentResponse>,
}

#[derive(Debug, Deserialize)]
struct AgentResponse {
    status: String,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    message: Option<String>,
}

fn unwrap_upload(envelope: UploadEnvelope) -> Result<Vec<String>, GatewayError> {
    if !envelope.success {
        return Err(GatewayError::Rejected(
            envelope.error.unwrap_or_else(|| "Upload failed".to_string()),
        ));
    }
    if envelope.asset_ids.is_empty() {
        return Err(GatewayError::MalformedResponse(
            "upload succeeded without asset ids".to_string(),
        ));
    }
    Ok(envelope.asset_ids)
}

/// A call only counts as successful when both the transport envelope and
/// the agent's own status say so.
fn unwrap_agent_result<T: DeserializeOwned>(envelope: AgentEnvelope) -> Result<T, GatewayError> {
    if !envelope.success {
        return Err(GatewayError::Rejected(
            envelope.error.unwrap_or_else(|| "Agent call failed".to_string()),
        ));
    }
    let response = envelope
        .response
        .ok_or_else(|| GatewayError::MalformedResponse("missing response".to_string()))?;

    if response.status != "success" {
        return Err(GatewayError::Rejected(response.message.unwrap_or_else(|| {
            format!("agent reported status '{}'", response.status)
        })));
    }

    serde_json::from_value(response.result)
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl ExtractionGateway for AgentClient {
    async fn upload(&self, document: &InvoiceDocument) -> Result<Vec<String>, GatewayError> {
        let url = format!("{}/assets", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, document.media_type.as_str())
            .body(document.bytes.clone());
        if let Some(name) = &document.file_name {
            request = request.header("X-File-Name", name.as_str());
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        let envelope: UploadEnvelope = Self::read_json(response).await?;
        unwrap_upload(envelope)
    }

    async fn extract(&self, asset_ids: &[String]) -> Result<ExtractedInvoiceDetails, GatewayError> {
        self.invoke(&self.invoice_agent_id, INVOICE_PROMPT, asset_ids)
            .await
    }
}

#[async_trait]
impl ClaimDraftGateway for AgentClient {
    async fn draft(&self, request: &ClaimRequest) -> Result<ClaimDraft, GatewayError> {
        self.invoke(&self.claim_agent_id, &request.to_prompt(), &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Confidence;

    fn envelope(json: &str) -> AgentEnvelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn successful_invoice_result_decodes() {
        let env = envelope(
            r#"{"success": true, "response": {"status": "success", "result": {
                "brand": "Bosch", "product_name": "Series 6 Dishwasher",
                "purchase_date": "2023-05-04", "invoice_id": "88-1020",
                "retailer": "Currys", "warranty_period": "2 years",
                "confidence_scores": {"brand": "HIGH", "product_name": "HIGH",
                    "purchase_date": "HIGH", "invoice_id": "MEDIUM",
                    "retailer": "HIGH", "warranty_period": "LOW"}
            }}}"#,
        );
        let details: ExtractedInvoiceDetails = unwrap_agent_result(env).unwrap();
        assert_eq!(details.brand, "Bosch");
        assert_eq!(details.confidence_scores.warranty_period, Confidence::Low);
    }

    #[test]
    fn transport_failure_is_rejected() {
        let env = envelope(r#"{"success": false, "error": "quota exceeded"}"#);
        let err = unwrap_agent_result::<ExtractedInvoiceDetails>(env).unwrap_err();
        assert_eq!(err, GatewayError::Rejected("quota exceeded".into()));
    }

    #[test]
    fn non_success_agent_status_is_rejected() {
        let env = envelope(r#"{"success": true, "response": {"status": "error", "result": null}}"#);
        let err = unwrap_agent_result::<ExtractedInvoiceDetails>(env).unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(msg) if msg.contains("error")));
    }

    #[test]
    fn missing_response_is_malformed() {
        let env = envelope(r#"{"success": true}"#);
        let err = unwrap_agent_result::<ClaimDraft>(env).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[test]
    fn wrong_result_shape_is_malformed() {
        let env = envelope(r#"{"success": true, "response": {"status": "success", "result": [1, 2]}}"#);
        let err = unwrap_agent_result::<ClaimDraft>(env).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[test]
    fn upload_envelope_handling() {
        let ok: UploadEnvelope =
            serde_json::from_str(r#"{"success": true, "asset_ids": ["a-1"]}"#).unwrap();
        assert_eq!(unwrap_upload(ok).unwrap(), vec!["a-1".to_string()]);

        let failed: UploadEnvelope = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert_eq!(
            unwrap_upload(failed).unwrap_err(),
            GatewayError::Rejected("Upload failed".into())
        );

        let empty: UploadEnvelope = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(matches!(unwrap_upload(empty), Err(GatewayError::MalformedResponse(_))));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let config = AgentConfig {
            base_url: "http://localhost:8787/".into(),
            ..AgentConfig::default()
        };
        let client = AgentClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8787");
        assert_eq!(client.timeout_secs, 120);
    }

    #[tokio::test]
    async fn unreachable_service_maps_to_connection_error() {
        let config = AgentConfig {
            // Port 9 (discard) is closed on test machines
            base_url: "http://127.0.0.1:9".into(),
            ..AgentConfig::default()
        };
        let client = AgentClient::new(&config).unwrap();
        let err = client.extract(&["a-1".to_string()]).await.unwrap_err();
        assert!(
            matches!(err, GatewayError::Connection(_) | GatewayError::HttpClient(_)),
            "unexpected error: {err:?}"
        );
    }
}
