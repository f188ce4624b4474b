//! Host instance identity, resolved once at startup.
//!
//! The agent asks the EC2 instance metadata service (IMDS) who it is, posts
//! the assembled instance record to the collector, and uses the instance id
//! to namespace every event it emits afterwards. Failure here is fatal; the
//! agent cannot attribute samples without an identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AgentError;

const TOKEN_TTL_SECONDS: &str = "21600";

/// Instance record registered with the collector at startup.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub hostname: String,
    /// Instance lifecycle ("on-demand" or "spot").
    pub kind: String,
    pub instance_type: String,
    pub private_ip: String,
    pub region: String,
    pub az: String,
    pub image_id: String,
    pub launch_time: DateTime<Utc>,
    pub architecture: String,
}

/// EC2 instance identity document, as served by
/// `/latest/dynamic/instance-identity/document`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDocument {
    instance_id: String,
    instance_type: String,
    private_ip: String,
    image_id: String,
    pending_time: DateTime<Utc>,
    region: String,
    availability_zone: String,
    architecture: String,
}

/// Resolve the host identity from IMDS and register it with the collector.
/// Returns the instance id used to address all subsequent usage events.
pub async fn resolve_and_register(
    client: &reqwest::Client,
    imds_url: &str,
    sink_url: &str,
) -> Result<String, AgentError> {
    let token = fetch_token(client, imds_url).await;
    if token.is_none() {
        debug!("IMDSv2 token unavailable, falling back to IMDSv1");
    }

    let document = fetch_identity_document(client, imds_url, token.as_deref()).await?;
    let hostname = fetch_metadata(client, imds_url, token.as_deref(), "hostname")
        .await
        .unwrap_or_default();
    let kind = fetch_metadata(client, imds_url, token.as_deref(), "instance-life-cycle")
        .await
        .unwrap_or_default();

    let record = InstanceRecord {
        instance_id: document.instance_id.clone(),
        hostname,
        kind,
        instance_type: document.instance_type,
        private_ip: document.private_ip,
        region: document.region,
        az: document.availability_zone,
        image_id: document.image_id,
        launch_time: document.pending_time,
        architecture: document.architecture,
    };

    register(client, sink_url, &record).await?;
    info!(
        instance_id = %record.instance_id,
        instance_type = %record.instance_type,
        "instance registered with collector"
    );

    Ok(record.instance_id)
}

/// Fetch an IMDSv2 session token. `None` means the host only speaks IMDSv1.
async fn fetch_token(client: &reqwest::Client, imds_url: &str) -> Option<String> {
    let url = format!("{}/latest/api/token", imds_url);
    let response = client
        .put(url)
        .header("X-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECONDS)
        .send()
        .await
        .ok()?
        .error_for_status()
        .ok()?;
    response.text().await.ok()
}

async fn fetch_identity_document(
    client: &reqwest::Client,
    imds_url: &str,
    token: Option<&str>,
) -> Result<IdentityDocument, AgentError> {
    let url = format!("{}/latest/dynamic/instance-identity/document", imds_url);
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.header("X-aws-ec2-metadata-token", token);
    }

    let response = request
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| AgentError::Startup(format!("could not reach instance metadata: {}", e)))?;

    response
        .json::<IdentityDocument>()
        .await
        .map_err(|e| AgentError::Startup(format!("malformed instance identity document: {}", e)))
}

/// Fetch a plain-text metadata path. Missing paths are tolerated; the
/// corresponding record field stays empty.
async fn fetch_metadata(
    client: &reqwest::Client,
    imds_url: &str,
    token: Option<&str>,
    path: &str,
) -> Option<String> {
    let url = format!("{}/latest/meta-data/{}", imds_url, path);
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.header("X-aws-ec2-metadata-token", token);
    }
    match request.send().await.and_then(|r| r.error_for_status()) {
        Ok(response) => response.text().await.ok(),
        Err(e) => {
            warn!("could not read instance metadata path {}: {}", path, e);
            None
        }
    }
}

async fn register(
    client: &reqwest::Client,
    sink_url: &str,
    record: &InstanceRecord,
) -> Result<(), AgentError> {
    let url = format!("{}/instance", sink_url.trim_end_matches('/'));
    client
        .post(url)
        .json(record)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| AgentError::Startup(format!("could not register instance: {}", e)))?;
    Ok(())
}
