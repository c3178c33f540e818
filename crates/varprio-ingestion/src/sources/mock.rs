//! In-process provider with scripted answers, for tests and offline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::AnnotationSource;
use crate::annotation::{Annotation, FailureKind, ProviderFailure, SourceKind};
use crate::models::VariantRecord;

/// Mock provider keyed by `variant_id`.
pub struct MockSource {
    kind: SourceKind,
    responses: HashMap<String, Result<Annotation, ProviderFailure>>,
    fallback: Result<Annotation, ProviderFailure>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Unscripted variants fail with `not_found`.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            responses: HashMap::new(),
            fallback: Err(ProviderFailure::not_found("no scripted response")),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer `annotation` for one variant.
    pub fn with(mut self, variant_id: &str, annotation: Annotation) -> Self {
        self.responses.insert(variant_id.to_string(), Ok(annotation));
        self
    }

    /// Fail one variant with `kind`.
    pub fn with_failure(mut self, variant_id: &str, kind: FailureKind) -> Self {
        self.responses
            .insert(variant_id.to_string(), Err(ProviderFailure::new(kind, "scripted failure")));
        self
    }

    /// Answer for every unscripted variant.
    pub fn with_default(mut self, annotation: Annotation) -> Self {
        self.fallback = Ok(annotation);
        self
    }

    /// Fail every unscripted variant with `kind`.
    pub fn failing(mut self, kind: FailureKind) -> Self {
        self.fallback = Err(ProviderFailure::new(kind, "scripted failure"));
        self
    }

    /// Sleep before answering, to exercise timeouts and cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnnotationSource for MockSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn lookup(&self, variant: &VariantRecord) -> Result<Annotation, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .get(variant.variant_id())
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source() {
        let source = MockSource::new(SourceKind::Cadd)
            .with("1-10-A-T", Annotation::Pathogenicity(25.0))
            .with_failure("1-20-A-T", FailureKind::HttpError(500));

        let hit = VariantRecord::new("1", 10, "A", "T", ".", ".").unwrap();
        let fail = VariantRecord::new("1", 20, "A", "T", ".", ".").unwrap();
        let other = VariantRecord::new("1", 30, "A", "T", ".", ".").unwrap();

        assert_eq!(source.lookup(&hit).await.unwrap(), Annotation::Pathogenicity(25.0));
        assert_eq!(source.lookup(&fail).await.unwrap_err().kind, FailureKind::HttpError(500));
        assert_eq!(source.lookup(&other).await.unwrap_err().kind, FailureKind::NotFound);
        assert_eq!(source.calls(), 3);
    }
}
