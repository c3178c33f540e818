//! gnomAD population allele frequency via the public GraphQL API.
//!
//! Endpoint: https://gnomad.broadinstitute.org/api
//!
//! A variant that gnomAD has never observed, or that has no genome-level
//! data, is answered with frequency 0, which is a real answer. Only a
//! transport or decoding problem is a failure.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument};
use varprio_common::sandbox::SandboxClient as Client;
use varprio_common::ProviderConfig;

use super::{blocked, read_json, send_checked, AnnotationSource, RetryPolicy};
use crate::annotation::{Annotation, ProviderFailure, SourceKind};
use crate::models::{make_variant_id, VariantRecord};

pub const GNOMAD_API_URL: &str = "https://gnomad.broadinstitute.org/api";
pub const DEFAULT_DATASET: &str = "gnomad_r2_1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct GnomadClient {
    client: Client,
    url: String,
    dataset: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GnomadClient {
    pub fn new(client: Client) -> Self {
        Self::from_config(client, &ProviderConfig::default(), DEFAULT_DATASET, RetryPolicy::default())
    }

    pub fn from_config(client: Client, cfg: &ProviderConfig, dataset: &str, retry: RetryPolicy) -> Self {
        Self {
            client,
            url: cfg.base_url_or(GNOMAD_API_URL).to_string(),
            dataset: dataset.to_string(),
            timeout: cfg.timeout_or(DEFAULT_TIMEOUT_SECS),
            retry,
        }
    }

    async fn query_frequency(&self, gnomad_id: &str) -> Result<f64, ProviderFailure> {
        let payload = json!({
            "query": build_query(&self.dataset),
            "variables": { "variantId": gnomad_id },
        });
        let request = self
            .client
            .post(&self.url)
            .map_err(blocked)?
            .json(&payload)
            .timeout(self.timeout);

        let resp = send_checked(request).await?;
        let body = read_json(resp).await?;
        parse_frequency(&body)
    }
}

/// GraphQL document; the dataset is an enum literal, not a variable.
pub fn build_query(dataset: &str) -> String {
    format!(
        "query($variantId: String!) {{\n  \
           variant(variantId: $variantId, dataset: {dataset}) {{\n    \
             genome {{ ac an af }}\n  \
           }}\n\
         }}"
    )
}

/// gnomAD expects `chrom-pos-ref-alt` without a `chr` prefix.
pub fn gnomad_variant_id(variant: &VariantRecord) -> String {
    make_variant_id(variant.bare_chrom(), variant.pos(), variant.reference(), variant.alternate())
}

/// Interpret a GraphQL response body.
pub fn parse_frequency(body: &serde_json::Value) -> Result<f64, ProviderFailure> {
    let variant = body.get("data").and_then(|d| d.get("variant"));

    match variant {
        Some(v) if !v.is_null() => {
            let af = v.get("genome").and_then(|g| g.get("af"));
            match af {
                None => Ok(0.0),
                Some(af) if af.is_null() => Ok(0.0),
                Some(af) => {
                    let af = af
                        .as_f64()
                        .ok_or_else(|| ProviderFailure::malformed(format!("non-numeric af: {af}")))?;
                    if !(0.0..=1.0).contains(&af) {
                        return Err(ProviderFailure::malformed(format!("af {af} outside [0, 1]")));
                    }
                    Ok(af)
                }
            }
        }
        _ => {
            // gnomAD reports unknown variants as a GraphQL error with null data
            match body.get("errors").and_then(|e| e.as_array()) {
                Some(errors) if !errors.is_empty() => {
                    let not_found = errors.iter().all(|e| {
                        e.get("message")
                            .and_then(|m| m.as_str())
                            .map(|m| m.to_lowercase().contains("not found"))
                            .unwrap_or(false)
                    });
                    if not_found {
                        Ok(0.0)
                    } else {
                        Err(ProviderFailure::malformed(format!("GraphQL errors: {}", serde_json::Value::Array(errors.clone()))))
                    }
                }
                _ if body.get("data").is_some() => Ok(0.0),
                _ => Err(ProviderFailure::malformed("response has neither data nor errors")),
            }
        }
    }
}

#[async_trait]
impl AnnotationSource for GnomadClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Gnomad
    }

    #[instrument(skip(self, variant), fields(variant_id = %variant.variant_id()))]
    async fn lookup(&self, variant: &VariantRecord) -> Result<Annotation, ProviderFailure> {
        let gnomad_id = gnomad_variant_id(variant);
        let af = self.retry.run(SourceKind::Gnomad, || self.query_frequency(&gnomad_id)).await?;
        debug!(af, "gnomAD lookup complete");
        Ok(Annotation::AlleleFrequency(af))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::FailureKind;

    #[test]
    fn test_query_embeds_dataset() {
        let q = build_query("gnomad_r4");
        assert!(q.contains("dataset: gnomad_r4"));
        assert!(q.contains("$variantId: String!"));
    }

    #[test]
    fn test_gnomad_variant_id() {
        let v = VariantRecord::new("chr1", 55_516_888, "G", "GA", ".", ".").unwrap();
        assert_eq!(gnomad_variant_id(&v), "1-55516888-G-GA");
    }

    #[test]
    fn test_parse_observed_frequency() {
        let body = json!({"data": {"variant": {"genome": {"ac": 3, "an": 30000, "af": 0.0001}}}});
        assert_eq!(parse_frequency(&body).unwrap(), 0.0001);
    }

    #[test]
    fn test_absent_data_is_zero_frequency() {
        assert_eq!(parse_frequency(&json!({"data": {"variant": null}})).unwrap(), 0.0);
        assert_eq!(parse_frequency(&json!({"data": {"variant": {"genome": null}}})).unwrap(), 0.0);
        assert_eq!(parse_frequency(&json!({"data": {"variant": {"genome": {"af": null}}}})).unwrap(), 0.0);
        let not_found = json!({"data": {"variant": null}, "errors": [{"message": "Variant not found"}]});
        assert_eq!(parse_frequency(&not_found).unwrap(), 0.0);
    }

    #[test]
    fn test_other_errors_are_failures_not_zero() {
        let body = json!({"data": null, "errors": [{"message": "Unknown dataset"}]});
        assert_eq!(parse_frequency(&body).unwrap_err().kind, FailureKind::MalformedResponse);

        let body = json!({"data": {"variant": {"genome": {"af": 1.5}}}});
        assert_eq!(parse_frequency(&body).unwrap_err().kind, FailureKind::MalformedResponse);

        let body = json!({"data": {"variant": {"genome": {"af": "high"}}}});
        assert_eq!(parse_frequency(&body).unwrap_err().kind, FailureKind::MalformedResponse);

        assert_eq!(parse_frequency(&json!({})).unwrap_err().kind, FailureKind::MalformedResponse);
    }
}
