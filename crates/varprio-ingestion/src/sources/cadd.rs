//! CADD pathogenicity scores.
//!
//! Endpoint: https://cadd.gs.washington.edu/api/v1.0/{chrom}:{pos}_{ref}_{alt}
//!
//! The response is tab-separated text: a header line followed by one row
//! per scored allele, PHRED score in the last column.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};
use varprio_common::sandbox::SandboxClient as Client;
use varprio_common::ProviderConfig;

use super::{blocked, classify_reqwest_error, send_checked, AnnotationSource, RetryPolicy};
use crate::annotation::{Annotation, ProviderFailure, SourceKind};
use crate::models::VariantRecord;

pub const CADD_API_URL: &str = "https://cadd.gs.washington.edu/api/v1.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

pub struct CaddClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl CaddClient {
    pub fn new(client: Client) -> Self {
        Self::from_config(client, &ProviderConfig::default(), RetryPolicy::default())
    }

    pub fn from_config(client: Client, cfg: &ProviderConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: cfg.base_url_or(CADD_API_URL).trim_end_matches('/').to_string(),
            timeout: cfg.timeout_or(DEFAULT_TIMEOUT_SECS),
            retry,
        }
    }

    pub fn variant_url(&self, variant: &VariantRecord) -> String {
        format!(
            "{}/{}:{}_{}_{}",
            self.base_url,
            variant.bare_chrom(),
            variant.pos(),
            variant.reference(),
            variant.alternate()
        )
    }

    async fn fetch_score(&self, url: &str) -> Result<f64, ProviderFailure> {
        let request = self.client.get(url).map_err(blocked)?.timeout(self.timeout);
        let resp = send_checked(request).await?;
        let body = resp.text().await.map_err(|e| classify_reqwest_error(&e))?;
        parse_phred(&body)
    }
}

/// PHRED score from the first data row, last column.
pub fn parse_phred(body: &str) -> Result<f64, ProviderFailure> {
    let mut lines = body.trim().lines().filter(|l| !l.trim().is_empty());
    let _header = lines.next();
    let row = lines
        .next()
        .ok_or_else(|| ProviderFailure::not_found("CADD returned no scored rows"))?;

    let last = row
        .split('\t')
        .last()
        .map(str::trim)
        .unwrap_or_default();
    let score: f64 = last
        .parse()
        .map_err(|_| ProviderFailure::malformed(format!("non-numeric PHRED value {last:?}")))?;

    if !score.is_finite() || score < 0.0 {
        return Err(ProviderFailure::malformed(format!("PHRED value {score} out of range")));
    }
    Ok(score)
}

#[async_trait]
impl AnnotationSource for CaddClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Cadd
    }

    #[instrument(skip(self, variant), fields(variant_id = %variant.variant_id()))]
    async fn lookup(&self, variant: &VariantRecord) -> Result<Annotation, ProviderFailure> {
        let url = self.variant_url(variant);
        let score = self.retry.run(SourceKind::Cadd, || self.fetch_score(&url)).await?;
        debug!(score, "CADD lookup complete");
        Ok(Annotation::Pathogenicity(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::FailureKind;

    #[test]
    fn test_variant_url() {
        let client = CaddClient::new(Client::new().unwrap());
        let v = VariantRecord::new("chr2", 47_641_560, "A", "T", ".", ".").unwrap();
        assert_eq!(
            client.variant_url(&v),
            "https://cadd.gs.washington.edu/api/v1.0/2:47641560_A_T"
        );
    }

    #[test]
    fn test_parse_phred_last_column() {
        let body = "#Chrom\tPos\tRef\tAlt\tRawScore\tPHRED\n2\t47641560\tA\tT\t5.12\t34.0\n";
        assert_eq!(parse_phred(body).unwrap(), 34.0);
    }

    #[test]
    fn test_header_only_is_not_found() {
        let err = parse_phred("#Chrom\tPos\tRef\tAlt\tRawScore\tPHRED\n").unwrap_err();
        assert_eq!(err.kind, FailureKind::NotFound);
        assert_eq!(parse_phred("").unwrap_err().kind, FailureKind::NotFound);
    }

    #[test]
    fn test_bad_score_is_malformed() {
        let err = parse_phred("h\n2\t1\tA\tT\tNA\n").unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
        let err = parse_phred("h\n2\t1\tA\tT\tNaN\n").unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
    }
}
