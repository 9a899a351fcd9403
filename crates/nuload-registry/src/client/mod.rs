//! NuGet v3 HTTP client with connection pooling and retry logic

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use nuload_core::error::NuloadError;
use nuload_core::types::normalize_id;
use nuload_core::{ContentDescriptor, PackageIdentity, SourceOrigin, TargetFramework, Version};

use crate::api::{FlatContainerIndex, RegistrationIndex, RegistrationPage, ServiceIndex};
use crate::cache::MetadataCache;
use crate::source::{DependencyInfo, PackageSource};
use crate::RegistryResult;

const PACKAGE_BASE_ADDRESS: &[&str] = &["PackageBaseAddress/3.0.0"];

const REGISTRATIONS_BASE_URL: &[&str] = &[
    "RegistrationsBaseUrl/3.6.0",
    "RegistrationsBaseUrl/3.4.0",
    "RegistrationsBaseUrl/3.0.0-rc",
    "RegistrationsBaseUrl/3.0.0-beta",
    "RegistrationsBaseUrl",
];

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Authentication configuration for feed access
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Bearer token for authentication
    pub token: Option<String>,
    /// Basic auth username
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
}

/// Resource URLs advertised by the service index
#[derive(Debug, Clone)]
struct ServiceEndpoints {
    package_base_address: String,
    registrations_base_url: String,
}

/// Client for one NuGet v3 feed
#[derive(Debug)]
pub struct NugetClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    /// Retry configuration
    retry_config: RetryConfig,
    /// Feed name and service index URL
    origin: SourceOrigin,
    /// Resolved lazily from the service index
    endpoints: OnceCell<ServiceEndpoints>,
    /// Registration indexes with pages inlined
    metadata: MetadataCache,
}

impl NugetClient {
    /// Create a client for the feed whose service index is `origin.location`
    pub fn new(origin: SourceOrigin) -> RegistryResult<Self> {
        Self::with_config(origin, None, RetryConfig::default())
    }

    /// Create a client that authenticates against the feed
    pub fn with_auth(origin: SourceOrigin, auth: AuthConfig) -> RegistryResult<Self> {
        Self::with_config(origin, Some(auth), RetryConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(
        origin: SourceOrigin,
        auth: Option<AuthConfig>,
        retry_config: RetryConfig,
    ) -> RegistryResult<Self> {
        url::Url::parse(&origin.location).map_err(|e| NuloadError::ConfigValidation {
            field: format!("source '{}'", origin.name),
            reason: format!("'{}' is not a valid URL: {}", origin.location, e),
        })?;

        let mut builder = ClientBuilder::new()
            // Connection pooling configuration
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(60))
            .gzip(true)
            .user_agent(concat!("nuload/", env!("CARGO_PKG_VERSION")));

        if let Some(auth_value) = auth.and_then(Self::authorization_value) {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::AUTHORIZATION,
                auth_value.parse().map_err(|e| {
                    NuloadError::network("Invalid authorization header".to_string(), e)
                })?,
            );
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|e| {
            NuloadError::network("Failed to create HTTP client".to_string(), e)
        })?;

        Ok(Self {
            client,
            retry_config,
            origin,
            endpoints: OnceCell::new(),
            metadata: MetadataCache::new(),
        })
    }

    fn authorization_value(auth: AuthConfig) -> Option<String> {
        if let Some(token) = auth.token {
            return Some(format!("Bearer {}", token));
        }

        match (auth.username, auth.password) {
            (Some(username), Some(password)) => {
                use base64::{engine::general_purpose, Engine as _};
                let encoded = general_purpose::STANDARD.encode(format!("{}:{}", username, password));
                Some(format!("Basic {}", encoded))
            },
            _ => None,
        }
    }

    /// Registration metadata cache used by this client
    pub fn metadata_cache(&self) -> &MetadataCache {
        &self.metadata
    }

    /// Execute HTTP request with exponential backoff retry logic
    async fn with_retry<F, Fut, T>(&self, operation: F) -> RegistryResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = RegistryResult<T>>,
    {
        let mut delay = self.retry_config.initial_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if attempt >= self.retry_config.max_retries || !error.is_recoverable() {
                        return Err(error);
                    }

                    debug!("Retrying after error (attempt {}): {}", attempt + 1, error);
                    tokio::time::sleep(delay).await;

                    delay = std::cmp::min(
                        Duration::from_millis(
                            (delay.as_millis() as f64 * self.retry_config.multiplier) as u64,
                        ),
                        self.retry_config.max_delay,
                    );
                    attempt += 1;
                },
            }
        }
    }

    /// GET a JSON document; a 404 is `Ok(None)`
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> RegistryResult<Option<T>> {
        let client = &self.client;

        self.with_retry(|| async move {
            let response = client
                .get(url)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| NuloadError::network(format!("Failed to fetch {}", url), e))?;

            match response.status() {
                StatusCode::OK => response
                    .json::<T>()
                    .await
                    .map(Some)
                    .map_err(|e| NuloadError::network(format!("Failed to parse {}", url), e)),
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(NuloadError::Network {
                    message: format!("{} returned status {}", url, status),
                    source: None,
                }),
            }
        })
        .await
    }

    async fn endpoints(&self) -> RegistryResult<&ServiceEndpoints> {
        self.endpoints
            .get_or_try_init(|| self.fetch_endpoints())
            .await
    }

    async fn fetch_endpoints(&self) -> RegistryResult<ServiceEndpoints> {
        let location = &self.origin.location;
        let index: ServiceIndex =
            self.get_json(location)
                .await?
                .ok_or_else(|| NuloadError::Network {
                    message: format!("No service index at {}", location),
                    source: None,
                })?;

        let missing = |resource: &str| NuloadError::ConfigValidation {
            field: format!("source '{}'", self.origin.name),
            reason: format!("service index does not advertise {}", resource),
        };

        let endpoints = ServiceEndpoints {
            package_base_address: index
                .resource(PACKAGE_BASE_ADDRESS)
                .ok_or_else(|| missing("PackageBaseAddress"))?
                .to_string(),
            registrations_base_url: index
                .resource(REGISTRATIONS_BASE_URL)
                .ok_or_else(|| missing("RegistrationsBaseUrl"))?
                .to_string(),
        };

        debug!(
            "Source {} uses {} and {}",
            self.origin.name, endpoints.package_base_address, endpoints.registrations_base_url
        );
        Ok(endpoints)
    }

    /// Registration index for `id` with every page inlined
    pub async fn registration(&self, id: &str) -> RegistryResult<Option<Arc<RegistrationIndex>>> {
        if let Some(cached) = self.metadata.get(id) {
            debug!("Registration cache hit for {}", id);
            return Ok(Some(cached));
        }

        let endpoints = self.endpoints().await?;
        let url = format!("{}/{}/index.json", endpoints.registrations_base_url, normalize_id(id));

        let Some(mut index) = self.get_json::<RegistrationIndex>(&url).await? else {
            return Ok(None);
        };

        for page in &mut index.items {
            if page.items.is_none() {
                let fetched: RegistrationPage =
                    self.get_json(&page.id)
                        .await?
                        .ok_or_else(|| NuloadError::Network {
                            message: format!("Registration page {} is missing", page.id),
                            source: None,
                        })?;
                page.items = Some(fetched.items.unwrap_or_default());
            }
        }

        Ok(Some(self.metadata.insert(id, index)))
    }

    fn package_url(&self, endpoints: &ServiceEndpoints, identity: &PackageIdentity) -> String {
        let id = normalize_id(&identity.id);
        let version = identity.version.normalized().to_ascii_lowercase();

        format!(
            "{}/{}/{}/{}.{}.nupkg",
            endpoints.package_base_address, id, version, id, version
        )
    }
}

#[async_trait]
impl PackageSource for NugetClient {
    fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    async fn list_versions(&self, id: &str) -> RegistryResult<Vec<Version>> {
        let endpoints = self.endpoints().await?;
        let url = format!("{}/{}/index.json", endpoints.package_base_address, normalize_id(id));

        let Some(listing) = self.get_json::<FlatContainerIndex>(&url).await? else {
            return Ok(Vec::new());
        };

        Ok(listing
            .versions
            .iter()
            .filter_map(|raw| match raw.parse::<Version>() {
                Ok(version) => Some(version),
                Err(e) => {
                    warn!("Ignoring version '{}' of {} from {}: {}", raw, id, self.origin.name, e);
                    None
                },
            })
            .collect())
    }

    async fn dependency_info(
        &self,
        identity: &PackageIdentity,
        framework: &TargetFramework,
    ) -> RegistryResult<Option<DependencyInfo>> {
        let Some(index) = self.registration(&identity.id).await? else {
            return Ok(None);
        };

        let leaf = index
            .items
            .iter()
            .flat_map(|page| page.items.iter().flatten())
            .find(|leaf| {
                leaf.catalog_entry
                    .version
                    .parse::<Version>()
                    .map_or(false, |v| v == identity.version)
            });

        let Some(leaf) = leaf else {
            return Ok(None);
        };

        let groups = leaf.catalog_entry.dependency_groups();
        let url = match leaf.package_content.clone() {
            Some(url) => url,
            None => self.package_url(self.endpoints().await?, identity),
        };

        Ok(Some(DependencyInfo {
            identity: PackageIdentity::new(leaf.catalog_entry.id.clone(), identity.version.clone()),
            dependencies: nuload_core::types::select_group(&groups, framework),
            content: Some(ContentDescriptor {
                url,
                sha512: leaf.catalog_entry.sha512(),
            }),
        }))
    }

    async fn download(
        &self,
        identity: &PackageIdentity,
        content: &ContentDescriptor,
    ) -> RegistryResult<Vec<u8>> {
        let client = &self.client;
        let url = content.url.as_str();

        self.with_retry(|| async move {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| NuloadError::network(format!("Failed to download {}", url), e))?;

            match response.status() {
                StatusCode::OK => {},
                StatusCode::NOT_FOUND => {
                    return Err(NuloadError::PackageNotFound {
                        id: identity.id.clone(),
                        range: format!("[{}]", identity.version),
                    })
                },
                status => {
                    return Err(NuloadError::Network {
                        message: format!("Download of {} returned status {}", url, status),
                        source: None,
                    })
                },
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| NuloadError::network(format!("Failed to read {}", url), e))?;

            Ok(bytes.to_vec())
        })
        .await
    }
}

#[cfg(test)]
mod tests;
