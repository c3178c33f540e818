//! Ensembl VEP consequence and gene lookup.
//!
//! Endpoint: https://rest.ensembl.org/vep/{species}/region/{chrom}:{pos}:{pos}/{alt}
//!
//! Takes the first transcript consequence. Intergenic variants carry no
//! transcript consequences; for those the top-level
//! `most_severe_consequence` is used with an `unknown` gene.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};
use varprio_common::sandbox::SandboxClient as Client;
use varprio_common::ProviderConfig;

use super::{blocked, read_json, send_checked, AnnotationSource, RetryPolicy};
use crate::annotation::{Annotation, ConsequenceCall, ProviderFailure, SourceKind};
use crate::models::VariantRecord;

pub const ENSEMBL_REST_URL: &str = "https://rest.ensembl.org";
pub const DEFAULT_SPECIES: &str = "human";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const UNKNOWN: &str = "unknown";

pub struct VepClient {
    client: Client,
    base_url: String,
    species: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl VepClient {
    pub fn new(client: Client) -> Self {
        Self::from_config(client, &ProviderConfig::default(), DEFAULT_SPECIES, RetryPolicy::default())
    }

    pub fn from_config(client: Client, cfg: &ProviderConfig, species: &str, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: cfg.base_url_or(ENSEMBL_REST_URL).trim_end_matches('/').to_string(),
            species: species.to_string(),
            timeout: cfg.timeout_or(DEFAULT_TIMEOUT_SECS),
            retry,
        }
    }

    pub fn region_url(&self, variant: &VariantRecord) -> String {
        let chrom = variant.bare_chrom();
        let pos = variant.pos();
        format!(
            "{}/vep/{}/region/{chrom}:{pos}:{pos}/{}",
            self.base_url,
            self.species,
            variant.alternate()
        )
    }

    async fn fetch_consequence(&self, url: &str) -> Result<ConsequenceCall, ProviderFailure> {
        let request = self
            .client
            .get(url)
            .map_err(blocked)?
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .timeout(self.timeout);

        let resp = send_checked(request).await?;
        let body = read_json(resp).await?;
        parse_consequence(&body)
    }
}

/// Interpret a VEP region response (a JSON array, one entry per input).
pub fn parse_consequence(body: &serde_json::Value) -> Result<ConsequenceCall, ProviderFailure> {
    let entries = body
        .as_array()
        .ok_or_else(|| ProviderFailure::malformed("VEP response is not an array"))?;
    let first = entries
        .first()
        .ok_or_else(|| ProviderFailure::not_found("VEP returned no results"))?;

    let transcript = first
        .get("transcript_consequences")
        .and_then(|t| t.as_array())
        .and_then(|t| t.first());

    match transcript {
        Some(tc) => {
            let term = tc
                .get("consequence_terms")
                .and_then(|terms| terms.as_array())
                .and_then(|terms| terms.first())
                .and_then(|t| t.as_str())
                .unwrap_or(UNKNOWN);
            let gene = tc.get("gene_symbol").and_then(|g| g.as_str()).unwrap_or(UNKNOWN);
            Ok(ConsequenceCall { term: term.to_string(), gene_symbol: gene.to_string() })
        }
        None => match first.get("most_severe_consequence").and_then(|c| c.as_str()) {
            Some(term) => Ok(ConsequenceCall { term: term.to_string(), gene_symbol: UNKNOWN.to_string() }),
            None => Err(ProviderFailure::not_found("no consequence predicted")),
        },
    }
}

#[async_trait]
impl AnnotationSource for VepClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Vep
    }

    #[instrument(skip(self, variant), fields(variant_id = %variant.variant_id()))]
    async fn lookup(&self, variant: &VariantRecord) -> Result<Annotation, ProviderFailure> {
        let url = self.region_url(variant);
        let call = self.retry.run(SourceKind::Vep, || self.fetch_consequence(&url)).await?;
        debug!(term = %call.term, gene = %call.gene_symbol, "VEP lookup complete");
        Ok(Annotation::Consequence(call))
    }
}
