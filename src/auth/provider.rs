use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::{Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuthError, JwksKeys, SharedSecret, SigningKeys};
use crate::config::AuthConfig;

/// Tolerated clock drift between us and the authority.
const CLOCK_SKEW_LEEWAY: u64 = 60;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Registered claims we rely on, plus the authority's RBAC extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user identifier at the authority)
    pub sub: String,
    #[serde(default)]
    pub iss: String,
    /// Expiration time (as Unix timestamp)
    pub exp: u64,
    /// Issued at (as Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// An authenticated caller, available to handlers once the bearer token has
/// been validated.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
    pub claims: Claims,
    /// The raw bearer token, forwarded to the userinfo endpoint.
    pub token: String,
}

/// Profile data published by the authority's `/userinfo` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Validates bearer tokens for one authority and audience and looks up the
/// callers' profiles. One instance serves the whole process.
pub struct IdentityProvider {
    authority: String,
    audience: String,
    keys: Arc<dyn SigningKeys>,
    client: reqwest::Client,
    cache_ttl: Duration,
    user_info_cache: RwLock<HashMap<String, (UserInfo, Instant)>>,
}

impl IdentityProvider {
    pub fn new(
        authority: impl Into<String>,
        audience: impl Into<String>,
        keys: Arc<dyn SigningKeys>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            authority: authority.into(),
            audience: audience.into(),
            keys,
            client,
            cache_ttl: DEFAULT_CACHE_TTL,
            user_info_cache: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let ttl = config
            .cache_ttl_seconds
            .map_or(DEFAULT_CACHE_TTL, Duration::from_secs);
        let authority = config.authority();
        let keys: Arc<dyn SigningKeys> = match &config.signing_secret {
            Some(secret) => Arc::new(SharedSecret::new(secret.as_bytes())),
            None => Arc::new(JwksKeys::for_authority(&authority, client.clone(), ttl)),
        };
        Ok(Self::new(authority, config.audience.clone(), keys, client).with_cache_ttl(ttl))
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Verify signature, expiry, issuer and audience of `token`.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let (key, algorithm) = self.keys.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[&self.authority]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let claims = decode::<Claims>(token, &key, &validation)?.claims;
        Ok(Identity {
            subject: claims.sub.clone(),
            claims,
            token: token.to_string(),
        })
    }

    /// Profile of the caller, fetched from `{authority}userinfo` and cached
    /// per subject.
    pub async fn user_info(&self, identity: &Identity) -> Result<UserInfo, AuthError> {
        {
            let cache = self.user_info_cache.read().await;
            if let Some((info, fetched_at)) = cache.get(&identity.subject) {
                if fetched_at.elapsed() < self.cache_ttl {
                    return Ok(info.clone());
                }
            }
        }

        debug!(subject = %identity.subject, "fetching user info");
        let response = self
            .client
            .get(format!("{}userinfo", self.authority))
            .bearer_auth(&identity.token)
            .send()
            .await
            .map_err(|e| AuthError::UserInfo(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AuthError::UserInfo(format!(
                "HTTP {} from userinfo endpoint",
                response.status()
            )));
        }
        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::UserInfo(e.to_string()))?;

        self.remember(info.clone()).await;
        Ok(info)
    }

    async fn remember(&self, info: UserInfo) {
        let mut cache = self.user_info_cache.write().await;
        cache.retain(|_, (_, fetched_at)| fetched_at.elapsed() < self.cache_ttl);
        cache.insert(info.sub.clone(), (info, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &[u8] = b"test-signing-secret";
    const AUTHORITY: &str = "https://tenant.auth0.com/";
    const AUDIENCE: &str = "https://gregslist.api";

    fn provider() -> IdentityProvider {
        IdentityProvider::new(
            AUTHORITY,
            AUDIENCE,
            Arc::new(SharedSecret::new(SECRET)),
            reqwest::Client::new(),
        )
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn token(iss: &str, aud: &str, exp: u64) -> String {
        let claims = serde_json::json!({
            "sub": "auth0|abc123",
            "iss": iss,
            "aud": aud,
            "iat": now(),
            "exp": exp,
        });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[tokio::test]
    async fn valid_token_yields_identity() {
        let identity = provider()
            .authenticate(&token(AUTHORITY, AUDIENCE, now() + 600))
            .await
            .unwrap();
        assert_eq!(identity.subject, "auth0|abc123");
        assert_eq!(identity.claims.iss, AUTHORITY);
    }

    #[tokio::test]
    async fn foreign_issuer_is_rejected() {
        let err = provider()
            .authenticate(&token("https://evil.example.com/", AUDIENCE, now() + 600))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidIssuer));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let err = provider()
            .authenticate(&token(AUTHORITY, "someone-else", now() + 600))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAudience));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let err = provider()
            .authenticate(&token(AUTHORITY, AUDIENCE, now() - 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let err = provider().authenticate("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken));
    }

    #[tokio::test]
    async fn cached_user_info_skips_the_network() {
        let provider = provider();
        provider
            .remember(UserInfo {
                sub: "auth0|abc123".into(),
                name: Some("Greg".into()),
                email: Some("greg@example.com".into()),
                picture: None,
            })
            .await;
        let identity = provider
            .authenticate(&token(AUTHORITY, AUDIENCE, now() + 600))
            .await
            .unwrap();

        let info = provider.user_info(&identity).await.unwrap();
        assert_eq!(info.name.as_deref(), Some("Greg"));
    }

    #[test]
    fn from_config_derives_authority() {
        let config = AuthConfig {
            domain: "tenant.auth0.com".into(),
            audience: AUDIENCE.into(),
            cache_ttl_seconds: None,
            signing_secret: None,
        };
        let provider = IdentityProvider::from_config(&config).unwrap();
        assert_eq!(provider.authority(), AUTHORITY);
        assert_eq!(provider.audience(), AUDIENCE);
    }
}
