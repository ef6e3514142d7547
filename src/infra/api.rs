//! DigitalOcean REST client, implementing the `CloudProvisioner` port.
//!
//! Three calls: create droplet, get droplet, delete droplet. JSON bodies,
//! bearer-token auth. Response parsing is factored into pure helpers so it
//! can be tested without a server.

use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;

use crate::application::ports::CloudProvisioner;
use crate::domain::error::ProvisionError;
use crate::domain::session::{NodeId, ProvisionRequest};

/// Public API base; overridable through `DROPLET_PROXY_API`.
pub const DEFAULT_API_BASE: &str = "https://api.digitalocean.com/v2";

pub struct DigitalOceanClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl DigitalOceanClient {
    #[must_use]
    pub fn new(token: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }
}

impl CloudProvisioner for DigitalOceanClient {
    async fn create_node(&self, request: &ProvisionRequest) -> Result<NodeId> {
        let response = self
            .http
            .post(format!("{}/droplets", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .context("sending the droplet create request")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("reading the droplet create response")?;
        if !status.is_success() {
            return Err(ProvisionError::Api {
                status: status.as_u16(),
                detail: api_detail(&text),
            }
            .into());
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|_| ProvisionError::MalformedResponse("create response is not JSON".into()))?;
        Ok(parse_created_id(&body)?)
    }

    async fn node_address(&self, id: &NodeId) -> Result<Option<Ipv4Addr>> {
        let response = self
            .http
            .get(format!("{}/droplets/{id}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("querying droplet status")?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProvisionError::NodeGone(id.clone()).into());
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Api {
                status: status.as_u16(),
                detail: api_detail(&text),
            }
            .into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|_| ProvisionError::MalformedResponse("droplet response is not JSON".into()))?;
        Ok(extract_public_ipv4(&body))
    }

    async fn destroy_node(&self, id: &NodeId) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/droplets/{id}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("sending the droplet delete request")?;

        let status = response.status();
        if delete_settled(status) {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(ProvisionError::Api {
            status: status.as_u16(),
            detail: api_detail(&text),
        }
        .into())
    }
}

/// Extract `droplet.id` from the create response.
fn parse_created_id(body: &Value) -> Result<NodeId, ProvisionError> {
    body.get("droplet")
        .and_then(|d| d.get("id"))
        .and_then(Value::as_u64)
        .map(NodeId)
        .ok_or_else(|| {
            ProvisionError::MalformedResponse("droplet.id missing from create response".into())
        })
}

/// Pick the droplet's public IPv4 address, or `None` while networking is
/// still being assigned. Droplets can list a private address first, so
/// entries tagged `"type": "public"` win; otherwise fall back to the first
/// v4 entry.
fn extract_public_ipv4(body: &Value) -> Option<Ipv4Addr> {
    let v4 = body
        .get("droplet")?
        .get("networks")?
        .get("v4")?
        .as_array()?;
    let entry = v4
        .iter()
        .find(|e| e.get("type").and_then(Value::as_str) == Some("public"))
        .or_else(|| v4.first())?;
    entry.get("ip_address")?.as_str()?.parse().ok()
}

/// Delete outcomes that count as "the droplet is gone": success, or it was
/// already absent.
fn delete_settled(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_FOUND
}

/// Best human-readable detail from an API error body.
fn api_detail(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| text.trim().to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_created_id_reads_droplet_id() {
        let body = json!({"droplet": {"id": 4242, "name": "proxy-US"}});
        assert_eq!(parse_created_id(&body).expect("id"), NodeId(4242));
    }

    #[test]
    fn parse_created_id_rejects_missing_identifier() {
        let body = json!({"droplet": {"name": "proxy-US"}});
        let err = parse_created_id(&body).expect_err("expected Err");
        assert!(matches!(err, ProvisionError::MalformedResponse(_)));
    }

    #[test]
    fn extract_public_ipv4_prefers_the_public_entry() {
        let body = json!({"droplet": {"networks": {"v4": [
            {"ip_address": "10.10.0.7", "type": "private"},
            {"ip_address": "203.0.113.5", "type": "public"},
        ]}}});
        assert_eq!(
            extract_public_ipv4(&body),
            Some(Ipv4Addr::new(203, 0, 113, 5))
        );
    }

    #[test]
    fn extract_public_ipv4_falls_back_to_the_first_entry() {
        let body = json!({"droplet": {"networks": {"v4": [
            {"ip_address": "203.0.113.9"},
        ]}}});
        assert_eq!(
            extract_public_ipv4(&body),
            Some(Ipv4Addr::new(203, 0, 113, 9))
        );
    }

    #[test]
    fn extract_public_ipv4_is_none_while_networking_is_pending() {
        let body = json!({"droplet": {"networks": {"v4": []}}});
        assert_eq!(extract_public_ipv4(&body), None);
    }

    #[test]
    fn delete_of_an_absent_droplet_is_settled() {
        assert!(delete_settled(StatusCode::NO_CONTENT));
        assert!(delete_settled(StatusCode::NOT_FOUND));
        assert!(!delete_settled(StatusCode::UNAUTHORIZED));
        assert!(!delete_settled(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn api_detail_prefers_the_message_field() {
        assert_eq!(
            api_detail(r#"{"id": "unauthorized", "message": "Unable to authenticate you"}"#),
            "Unable to authenticate you"
        );
        assert_eq!(api_detail("plain text error\n"), "plain text error");
    }
}
