//! ClinVar lookup via NCBI E-utilities.
//!
//! Endpoint: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!
//! Searches the `clinvar` database by chromosome and GRCh37 position.
//! Any hit counts as "found in ClinVar"; an empty id list is a valid
//! "not in ClinVar" answer rather than a failure.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};
use varprio_common::sandbox::SandboxClient as Client;
use varprio_common::ProviderConfig;

use super::{blocked, read_json, send_checked, AnnotationSource, RetryPolicy};
use crate::annotation::{Annotation, ClinVarHit, ProviderFailure, SourceKind};
use crate::models::VariantRecord;

pub const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Condition label used when ClinVar has a record; the esearch endpoint
/// does not return condition names.
const FOUND_CONDITION: &str = "see_clinvar";

pub struct ClinVarClient {
    client: Client,
    url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ClinVarClient {
    pub fn new(client: Client) -> Self {
        Self::from_config(client, &ProviderConfig::default(), RetryPolicy::default())
    }

    pub fn from_config(client: Client, cfg: &ProviderConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            url: cfg.base_url_or(ESEARCH_URL).to_string(),
            timeout: cfg.timeout_or(DEFAULT_TIMEOUT_SECS),
            retry,
        }
    }

    async fn esearch(&self, term: &str) -> Result<ClinVarHit, ProviderFailure> {
        let params = [("db", "clinvar"), ("term", term), ("retmode", "json")];
        let request = self
            .client
            .get(&self.url)
            .map_err(blocked)?
            .query(&params)
            .timeout(self.timeout);

        let resp = send_checked(request).await?;
        let body = read_json(resp).await?;
        parse_esearch(&body)
    }
}

/// `{chrom}[chr] AND {pos}[chrpos37]`
pub fn search_term(variant: &VariantRecord) -> String {
    format!("{}[chr] AND {}[chrpos37]", variant.bare_chrom(), variant.pos())
}

/// Interpret an esearch JSON body.
pub fn parse_esearch(body: &serde_json::Value) -> Result<ClinVarHit, ProviderFailure> {
    let result = body
        .get("esearchresult")
        .ok_or_else(|| ProviderFailure::malformed("missing esearchresult"))?;

    if let Some(err) = result.get("ERROR").and_then(|e| e.as_str()) {
        return Err(ProviderFailure::malformed(format!("esearch error: {err}")));
    }

    let ids = result
        .get("idlist")
        .and_then(|ids| ids.as_array())
        .ok_or_else(|| ProviderFailure::malformed("missing esearchresult.idlist"))?;

    if ids.is_empty() {
        Ok(ClinVarHit::NotFound)
    } else {
        Ok(ClinVarHit::Found { condition: FOUND_CONDITION.to_string() })
    }
}

#[async_trait]
impl AnnotationSource for ClinVarClient {
    fn kind(&self) -> SourceKind {
        SourceKind::ClinVar
    }

    #[instrument(skip(self, variant), fields(variant_id = %variant.variant_id()))]
    async fn lookup(&self, variant: &VariantRecord) -> Result<Annotation, ProviderFailure> {
        let term = search_term(variant);
        let hit = self.retry.run(SourceKind::ClinVar, || self.esearch(&term)).await?;
        debug!(?hit, "ClinVar lookup complete");
        Ok(Annotation::ClinVar(hit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::FailureKind;
    use serde_json::json;

    #[test]
    fn test_search_term_strips_chr_prefix() {
        let v = VariantRecord::new("chr13", 32_914_438, "T", "TG", ".", "PASS").unwrap();
        assert_eq!(search_term(&v), "13[chr] AND 32914438[chrpos37]");
    }

    #[test]
    fn test_parse_esearch_found() {
        let body = json!({"esearchresult": {"count": "2", "idlist": ["12345", "67890"]}});
        assert_eq!(
            parse_esearch(&body).unwrap(),
            ClinVarHit::Found { condition: "see_clinvar".to_string() }
        );
    }

    #[test]
    fn test_parse_esearch_empty_is_not_found_answer() {
        let body = json!({"esearchresult": {"count": "0", "idlist": []}});
        assert_eq!(parse_esearch(&body).unwrap(), ClinVarHit::NotFound);
    }

    #[test]
    fn test_parse_esearch_malformed() {
        let err = parse_esearch(&json!({"header": {}})).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);

        let err = parse_esearch(&json!({"esearchresult": {"ERROR": "Invalid db name"}})).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
    }

    #[test]
    fn test_from_config_overrides() {
        let cfg = ProviderConfig {
            enabled: true,
            base_url: Some("http://localhost:9000/esearch".to_string()),
            timeout_secs: Some(3),
        };
        let client = ClinVarClient::from_config(Client::new().unwrap(), &cfg, RetryPolicy::none());
        assert_eq!(client.url, "http://localhost:9000/esearch");
        assert_eq!(client.timeout, Duration::from_secs(3));
    }
}
