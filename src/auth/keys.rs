use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm},
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::AuthError;

/// Where token verification keys come from.
#[async_trait]
pub trait SigningKeys: Send + Sync {
    /// Key and algorithm for a token whose header carries `kid`.
    async fn decoding_key(&self, kid: Option<&str>) -> Result<(DecodingKey, Algorithm), AuthError>;
}

/// HS256 secret shared with the token issuer.
pub struct SharedSecret {
    key: DecodingKey,
}

impl SharedSecret {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
        }
    }
}

#[async_trait]
impl SigningKeys for SharedSecret {
    async fn decoding_key(&self, _kid: Option<&str>) -> Result<(DecodingKey, Algorithm), AuthError> {
        Ok((self.key.clone(), Algorithm::HS256))
    }
}

/// Minimum age of the cached key set before an unknown `kid` may force a
/// refetch.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Key set published by the authority at `/.well-known/jwks.json`, cached
/// for `cache_ttl`. An unknown `kid` forces a refetch to pick up rotated
/// keys, at most once per [`MIN_REFRESH_INTERVAL`].
pub struct JwksKeys {
    jwks_url: String,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedKeys>>,
    client: reqwest::Client,
}

impl JwksKeys {
    pub fn for_authority(authority: &str, client: reqwest::Client, cache_ttl: Duration) -> Self {
        Self::new(format!("{authority}.well-known/jwks.json"), client, cache_ttl)
    }

    pub fn new(jwks_url: impl Into<String>, client: reqwest::Client, cache_ttl: Duration) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            cache_ttl,
            cache: RwLock::new(None),
            client,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    #[cfg(test)]
    async fn store(&self, keys: JwkSet, fetched_at: Instant) {
        *self.cache.write().await = Some(CachedKeys { keys, fetched_at });
    }

    async fn cached(&self) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.keys.clone())
    }

    /// Refetch under the write lock. Callers that queued behind a fetch find
    /// the new set and do not fetch again.
    async fn refresh(&self, kid: Option<&str>) -> Result<JwkSet, AuthError> {
        let mut cache = self.cache.write().await;
        if let Some(entry) = cache.as_ref() {
            let age = entry.fetched_at.elapsed();
            if age < self.cache_ttl
                && (age < MIN_REFRESH_INTERVAL || select_key(&entry.keys, kid).is_some())
            {
                return Ok(entry.keys.clone());
            }
        }

        let keys = self.fetch().await?;
        *cache = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        debug!(url = %self.jwks_url, "fetching signing keys");
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AuthError::KeyFetch(format!(
                "HTTP {} from {}",
                response.status(),
                self.jwks_url
            )));
        }
        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;
        info!(url = %self.jwks_url, count = keys.keys.len(), "signing keys refreshed");
        Ok(keys)
    }
}

#[async_trait]
impl SigningKeys for JwksKeys {
    async fn decoding_key(&self, kid: Option<&str>) -> Result<(DecodingKey, Algorithm), AuthError> {
        if let Some(keys) = self.cached().await {
            if let Some(found) = select_key(&keys, kid) {
                return found;
            }
        }
        let keys = self.refresh(kid).await?;
        select_key(&keys, kid).unwrap_or(Err(AuthError::NoMatchingKey))
    }
}

/// Pick the key named by `kid`, or the first usable one when the token
/// names none.
fn select_key(
    keys: &JwkSet,
    kid: Option<&str>,
) -> Option<Result<(DecodingKey, Algorithm), AuthError>> {
    match kid {
        Some(kid) => keys.find(kid).map(jwk_to_decoding_key),
        None => keys
            .keys
            .iter()
            .map(jwk_to_decoding_key)
            .find(Result::is_ok),
    }
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    let algorithm = match (&jwk.algorithm, jwk.common.key_algorithm.as_ref()) {
        (AlgorithmParameters::RSA(_), Some(KeyAlgorithm::RS384)) => Algorithm::RS384,
        (AlgorithmParameters::RSA(_), Some(KeyAlgorithm::RS512)) => Algorithm::RS512,
        (AlgorithmParameters::RSA(_), Some(KeyAlgorithm::PS256)) => Algorithm::PS256,
        (AlgorithmParameters::RSA(_), _) => Algorithm::RS256,
        (AlgorithmParameters::EllipticCurve(_), Some(KeyAlgorithm::ES384)) => Algorithm::ES384,
        (AlgorithmParameters::EllipticCurve(_), _) => Algorithm::ES256,
        (AlgorithmParameters::OctetKeyPair(_), _) => Algorithm::EdDSA,
        _ => return Err(AuthError::NoMatchingKey),
    };
    let key = DecodingKey::from_jwk(jwk).map_err(|_| AuthError::NoMatchingKey)?;
    Ok((key, algorithm))
}
