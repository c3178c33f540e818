//! Annotation source clients.

pub mod retry;
pub mod clinvar;
pub mod gnomad;
pub mod cadd;
pub mod vep;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use varprio_common::sandbox::SandboxClient;
use varprio_common::{Config, VarprioError};

use crate::annotation::{Annotation, FailureKind, ProviderFailure, SourceKind};
use crate::models::VariantRecord;

pub use cadd::CaddClient;
pub use clinvar::ClinVarClient;
pub use gnomad::GnomadClient;
pub use mock::MockSource;
pub use retry::RetryPolicy;
pub use vep::VepClient;

/// Common interface for all annotation providers.
///
/// A lookup either answers for one variant or fails with a tagged reason.
/// Implementations own their retry policy; callers never retry.
#[async_trait]
pub trait AnnotationSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn lookup(&self, variant: &VariantRecord) -> Result<Annotation, ProviderFailure>;
}

/// Build every enabled provider from configuration, sharing one HTTP client.
pub fn build_sources(config: &Config) -> Result<Vec<Arc<dyn AnnotationSource>>, VarprioError> {
    let mut client = SandboxClient::from_network_config(&config.network)?;
    for url in config.providers.custom_base_urls() {
        client.allow_url_host(url)?;
    }

    let retry = RetryPolicy::from_config(&config.retry);
    let providers = &config.providers;
    let mut sources: Vec<Arc<dyn AnnotationSource>> = Vec::new();

    if providers.clinvar.enabled {
        sources.push(Arc::new(ClinVarClient::from_config(client.clone(), &providers.clinvar, retry.clone())));
    }
    if providers.gnomad.enabled {
        sources.push(Arc::new(GnomadClient::from_config(
            client.clone(),
            &providers.gnomad,
            &providers.gnomad_dataset,
            retry.clone(),
        )));
    }
    if providers.cadd.enabled {
        sources.push(Arc::new(CaddClient::from_config(client.clone(), &providers.cadd, retry.clone())));
    }
    if providers.vep.enabled {
        sources.push(Arc::new(VepClient::from_config(
            client.clone(),
            &providers.vep,
            &providers.vep_species,
            retry.clone(),
        )));
    }

    info!(
        sources = ?sources.iter().map(|s| s.kind()).collect::<Vec<_>>(),
        "Annotation sources ready"
    );
    Ok(sources)
}

// ── HTTP helpers shared by the REST clients ──────────────────────────────────

pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> ProviderFailure {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if let Some(status) = err.status() {
        FailureKind::HttpError(status.as_u16())
    } else if err.is_decode() {
        FailureKind::MalformedResponse
    } else {
        FailureKind::Transport
    };
    ProviderFailure::new(kind, err.to_string())
}

/// A request the allowlist refused never leaves the process.
pub(crate) fn blocked(err: VarprioError) -> ProviderFailure {
    ProviderFailure::new(FailureKind::Unavailable, err.to_string())
}

/// Send a request and turn transport errors and non-2xx statuses into
/// provider failures.
pub(crate) async fn send_checked(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderFailure> {
    let resp = request.send().await.map_err(|e| classify_reqwest_error(&e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ProviderFailure::new(
            FailureKind::HttpError(status.as_u16()),
            format!("HTTP {status}"),
        ));
    }
    Ok(resp)
}

pub(crate) async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, ProviderFailure> {
    let body = resp.text().await.map_err(|e| classify_reqwest_error(&e))?;
    serde_json::from_str(&body).map_err(|e| ProviderFailure::malformed(format!("invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sources_respects_enabled_flags() {
        let mut config = Config::default();
        config.providers.cadd.enabled = false;
        let sources = build_sources(&config).unwrap();
        let kinds: Vec<SourceKind> = sources.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![SourceKind::ClinVar, SourceKind::Gnomad, SourceKind::Vep]);
    }

    #[test]
    fn test_build_sources_rejects_bad_base_url() {
        let mut config = Config::default();
        config.providers.vep.base_url = Some("not a url".to_string());
        assert!(build_sources(&config).is_err());
    }
}
