use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::config::NetworkConfig;
use crate::error::VarprioError;

/// Annotation endpoints the pipeline talks to by default.
pub const DEFAULT_ALLOWED_DOMAINS: &[&str] = &[
    "eutils.ncbi.nlm.nih.gov",      // ClinVar via E-utilities
    "gnomad.broadinstitute.org",    // gnomAD GraphQL
    "cadd.gs.washington.edu",       // CADD
    "rest.ensembl.org",             // Ensembl VEP
];

/// HTTP client that only allows requests to approved domains.
///
/// Per-request timeouts are set by callers; the client-level timeout is only
/// an upper bound.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Client with the default provider allowlist.
    pub fn new() -> Result<Self, VarprioError> {
        Self::from_network_config(&NetworkConfig::default())
    }

    pub fn from_network_config(network: &NetworkConfig) -> Result<Self, VarprioError> {
        let mut allowlist: HashSet<String> =
            DEFAULT_ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect();
        allowlist.extend(network.extra_allowed_domains.iter().cloned());

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(120))
            .user_agent(network.user_agent.clone())
            .build()?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Allow the host of a configured base URL.
    pub fn allow_url_host(&mut self, url: &str) -> Result<(), VarprioError> {
        let parsed = Url::parse(url)
            .map_err(|e| VarprioError::Config(format!("Invalid base URL {url}: {e}")))?;
        match parsed.host_str() {
            Some(host) => {
                self.allow_domain(host);
                Ok(())
            }
            None => Err(VarprioError::Config(format!("Base URL has no host: {url}"))),
        }
    }

    /// Validates if a URL is permitted under the current policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // exact match or subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, VarprioError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, VarprioError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }

    fn check(&self, url: &str) -> Result<(), VarprioError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(VarprioError::SecurityError(format!(
                "Domain not in allowlist for URL {}",
                url
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allowlist() {
        let client = SandboxClient::new().unwrap();
        assert!(client.is_allowed("https://rest.ensembl.org/vep/human/region/1:1:1/A"));
        assert!(client.is_allowed("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi"));
        assert!(!client.is_allowed("https://example.com/"));
        assert!(!client.is_allowed("not a url"));
    }

    #[test]
    fn test_subdomain_allowed_but_not_suffix_trick() {
        let client = SandboxClient::new().unwrap();
        assert!(client.is_allowed("https://grch37.rest.ensembl.org/vep"));
        assert!(!client.is_allowed("https://evilrest.ensembl.org.attacker.io/"));
    }

    #[test]
    fn test_allow_url_host() {
        let mut client = SandboxClient::new().unwrap();
        assert!(!client.is_allowed("http://localhost:8080/api"));
        client.allow_url_host("http://localhost:8080").unwrap();
        assert!(client.is_allowed("http://localhost:8080/api"));
        assert!(client.allow_url_host("::nope").is_err());
    }

    #[test]
    fn test_blocked_request_is_security_error() {
        let client = SandboxClient::new().unwrap();
        let err = client.get("https://example.com/").unwrap_err();
        assert!(matches!(err, VarprioError::SecurityError(_)));
    }

    #[test]
    fn test_unbuildable_client_is_http_error() {
        let network = NetworkConfig { user_agent: "varprio\nbroken".into(), ..NetworkConfig::default() };
        let err = SandboxClient::from_network_config(&network).unwrap_err();
        assert!(matches!(err, VarprioError::Http(_)));
    }
}
