//! Outbound collaborator implementations: DNS-over-HTTPS TXT lookups,
//! the recorded-authority directory, and profile publication.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use mth_claims::{
    AuthorityDirectory, Claim, EvaluatorError, ProfilePublisher, PublishError, TxtResolver,
};
use mth_core::{ChainId, TokenAddress, TokenKey};

/// TXT resolver over a DNS-over-HTTPS JSON endpoint (RFC 8484 JSON
/// flavor, as served by Cloudflare and Google).
pub struct DohTxtResolver {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

/// DNS record type number for TXT.
const TXT_TYPE: u16 = 16;

#[derive(Debug, Deserialize)]
struct DnsJsonResponse {
    #[serde(rename = "Status")]
    status: i32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DnsJsonAnswer>,
}

#[derive(Debug, Deserialize)]
struct DnsJsonAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

impl DohTxtResolver {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }
}

#[async_trait]
impl TxtResolver for DohTxtResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, EvaluatorError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", name), ("type", "TXT")])
            .header("accept", "application/dns-json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let response = response
            .error_for_status()
            .map_err(|e| EvaluatorError::Unavailable(e.to_string()))?;

        let body: DnsJsonResponse = response
            .json()
            .await
            .map_err(|e| EvaluatorError::Unavailable(format!("malformed DoH response: {}", e)))?;

        // Status 0 = NOERROR; anything else is an authoritative negative.
        if body.status != 0 {
            return Err(EvaluatorError::Lookup(format!(
                "DNS status {} for {}",
                body.status, name
            )));
        }

        Ok(body
            .answer
            .iter()
            .filter(|a| a.record_type == TXT_TYPE)
            .map(|a| a.data.trim_matches('"').to_string())
            .collect())
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> EvaluatorError {
    if err.is_timeout() {
        EvaluatorError::Timeout
    } else {
        EvaluatorError::Unavailable(err.to_string())
    }
}

/// Authority directory backed by the config's authority table. The
/// on-chain directory itself is an external collaborator; deployments
/// point this at their indexer's export.
pub struct StaticAuthorityDirectory {
    entries: HashMap<TokenKey, String>,
}

impl StaticAuthorityDirectory {
    pub fn new(entries: impl IntoIterator<Item = (TokenKey, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

#[async_trait]
impl AuthorityDirectory for StaticAuthorityDirectory {
    async fn token_authority(
        &self,
        chain: &ChainId,
        token: &TokenAddress,
    ) -> Result<Option<String>, EvaluatorError> {
        let key = TokenKey::new(chain.clone(), token.clone());
        Ok(self.entries.get(&key).cloned())
    }
}

/// Hands approved claims to the public token-profile read path.
pub struct HttpProfilePublisher {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct ProfilePayload<'a> {
    claim_id: String,
    chain: &'a str,
    token_address: &'a str,
    profile: &'a mth_claims::ProfileFields,
    media: &'a mth_claims::MediaRefs,
    approved_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl HttpProfilePublisher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ProfilePublisher for HttpProfilePublisher {
    async fn publish(&self, claim: &Claim) -> Result<(), PublishError> {
        let payload = ProfilePayload {
            claim_id: claim.id.to_string(),
            chain: claim.chain.as_str(),
            token_address: claim.token.as_str(),
            profile: &claim.profile,
            media: &claim.media,
            approved_at: claim.decided_at,
        };
        self.client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError(e.to_string()))?
            .error_for_status()
            .map_err(|e| PublishError(e.to_string()))?;
        Ok(())
    }
}
