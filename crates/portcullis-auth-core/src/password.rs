//! Password hashing, verification and strength scoring
//!
//! Uses the argon2id variant. Cost parameters are embedded in every PHC hash
//! string, so verification always re-derives under the parameters a hash was
//! created with, and `needs_rehash` can tell when a stored hash is weaker
//! than the current configuration.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::pool::{HashingPool, PoolError};

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argon2Config {
    /// Memory cost in KiB
    pub memory_cost_kb: u32,
    /// Number of passes
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
    /// Output length in bytes
    pub hash_length: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost_kb: 65536,
            time_cost: 3,
            parallelism: 4,
            hash_length: 32,
        }
    }
}

impl Argon2Config {
    fn hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        if self.memory_cost_kb == 0
            || self.time_cost == 0
            || self.parallelism == 0
            || self.hash_length == 0
        {
            return Err(PasswordError::InvalidHashParams);
        }
        let params = Params::new(
            self.memory_cost_kb,
            self.time_cost,
            self.parallelism,
            Some(self.hash_length as usize),
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Password errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("password is empty")]
    EmptyPassword,

    #[error("hash parameters must be non-zero")]
    InvalidHashParams,

    #[error("password hashing failed: {0}")]
    HashingFailed(String),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Hash a password with a fresh random salt
///
/// Returns the PHC string (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`).
pub fn hash_password(password: &str, config: &Argon2Config) -> Result<String, PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::EmptyPassword);
    }
    let argon2 = config.hasher()?;
    let salt = SaltString::generate(&mut OsRng);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Verify a password against a stored hash
///
/// Malformed hashes simply fail to verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::debug!("Stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Whether a stored hash was produced under different parameters than `config`
pub fn needs_rehash(hash: &str, config: &Argon2Config) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return true;
    };
    if parsed.algorithm.as_str() != Algorithm::Argon2id.as_str() {
        return true;
    }
    if parsed.version != Some(Version::V0x13 as u32) {
        return true;
    }
    let Ok(params) = Params::try_from(&parsed) else {
        return true;
    };
    params.m_cost() != config.memory_cost_kb
        || params.t_cost() != config.time_cost
        || params.p_cost() != config.parallelism
        || parsed.hash.map(|h| h.len()) != Some(config.hash_length as usize)
}

/// Threshold applied to a strength score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthPolicy {
    pub min_score: u8,
}

impl Default for StrengthPolicy {
    fn default() -> Self {
        Self { min_score: 6 }
    }
}

/// Result of scoring a candidate password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrength {
    /// 0..=7
    pub score: u8,
    pub is_valid: bool,
    pub feedback: Vec<String>,
}

/// Highest attainable strength score
pub const MAX_STRENGTH_SCORE: u8 = 7;

/// Message returned when a password passes the policy
pub const STRENGTH_OK_MESSAGE: &str = "Password meets strength requirements";

/// Score a password against seven criteria, one point each
pub fn score_strength(password: &str, policy: &StrengthPolicy) -> PasswordStrength {
    let length = password.chars().count();
    let checks: [(bool, &str); 7] = [
        (length >= 8, "Use at least 8 characters"),
        (length >= 12, "Use 12 or more characters for a stronger password"),
        (
            password.chars().any(|c| c.is_ascii_lowercase()),
            "Add lowercase letters",
        ),
        (
            password.chars().any(|c| c.is_ascii_uppercase()),
            "Add uppercase letters",
        ),
        (password.chars().any(|c| c.is_ascii_digit()), "Add numbers"),
        (
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
            "Add special characters",
        ),
        (
            !has_repeated_run(password, 3),
            "Avoid repeating the same character three or more times",
        ),
    ];

    let score = checks.iter().filter(|(met, _)| *met).count() as u8;
    let is_valid = score >= policy.min_score;
    let feedback = if is_valid {
        vec![STRENGTH_OK_MESSAGE.to_string()]
    } else {
        checks
            .iter()
            .filter(|(met, _)| !met)
            .map(|(_, hint)| hint.to_string())
            .collect()
    };

    PasswordStrength {
        score,
        is_valid,
        feedback,
    }
}

fn has_repeated_run(password: &str, run: usize) -> bool {
    let mut previous = None;
    let mut count = 0;
    for c in password.chars() {
        if Some(c) == previous {
            count += 1;
        } else {
            previous = Some(c);
            count = 1;
        }
        if count >= run {
            return true;
        }
    }
    false
}

/// Password capability injected into the coordinator
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hash under the current configuration
    async fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// Verify against a stored hash; `false` on any failure
    async fn verify(&self, password: &str, hash: &str) -> bool;

    /// Whether a stored hash should be replaced
    fn needs_rehash(&self, hash: &str) -> bool;

    /// Score a candidate password
    fn score_strength(&self, password: &str) -> PasswordStrength;
}

/// Argon2id hasher running derivations on a bounded blocking pool
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    config: Argon2Config,
    policy: StrengthPolicy,
    pool: HashingPool,
}

impl Argon2Hasher {
    pub fn new(config: Argon2Config, policy: StrengthPolicy, pool: HashingPool) -> Self {
        Self {
            config,
            policy,
            pool,
        }
    }

    pub fn config(&self) -> &Argon2Config {
        &self.config
    }
}

#[async_trait]
impl PasswordHasher for Argon2Hasher {
    async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::EmptyPassword);
        }
        let password = password.to_owned();
        let config = self.config;
        self.pool
            .run(move || hash_password(&password, &config))
            .await?
    }

    async fn verify(&self, password: &str, hash: &str) -> bool {
        let password = password.to_owned();
        let hash = hash.to_owned();
        match self.pool.run(move || verify_password(&password, &hash)).await {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!("Password verification could not run: {}", e);
                false
            }
        }
    }

    fn needs_rehash(&self, hash: &str) -> bool {
        needs_rehash(hash, &self.config)
    }

    fn score_strength(&self, password: &str) -> PasswordStrength {
        score_strength(password, &self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Argon2Config {
        Argon2Config {
            memory_cost_kb: 1024,
            time_cost: 1,
            parallelism: 1,
            hash_length: 32,
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct-horse-battery-staple", &fast()).unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        assert!(verify_password("correct-horse-battery-staple", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_different_salts() {
        let hash1 = hash_password("same-password", &fast()).unwrap();
        let hash2 = hash_password("same-password", &fast()).unwrap();
        assert_ne!(hash1, hash2);
        assert!(verify_password("same-password", &hash1));
        assert!(verify_password("same-password", &hash2));
    }

    #[test]
    fn test_empty_password_rejected() {
        assert_eq!(hash_password("", &fast()), Err(PasswordError::EmptyPassword));
    }

    #[test]
    fn test_zero_params_rejected() {
        let config = Argon2Config {
            time_cost: 0,
            ..fast()
        };
        assert_eq!(
            hash_password("pw", &config),
            Err(PasswordError::InvalidHashParams)
        );
    }

    #[test]
    fn test_library_rejection_is_hashing_failed() {
        // Argon2 requires at least 8 KiB per lane
        let config = Argon2Config {
            memory_cost_kb: 1,
            ..fast()
        };
        assert!(matches!(
            hash_password("pw", &config),
            Err(PasswordError::HashingFailed(_))
        ));
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(!verify_password("password", "not-a-valid-hash"));
        assert!(!verify_password("password", ""));
    }

    #[test]
    fn test_needs_rehash() {
        let hash = hash_password("pw", &fast()).unwrap();
        assert!(!needs_rehash(&hash, &fast()));

        let stronger = Argon2Config {
            time_cost: 2,
            ..fast()
        };
        assert!(needs_rehash(&hash, &stronger));

        let longer = Argon2Config {
            hash_length: 64,
            ..fast()
        };
        assert!(needs_rehash(&hash, &longer));

        let more_memory = Argon2Config {
            memory_cost_kb: 2048,
            ..fast()
        };
        assert!(needs_rehash(&hash, &more_memory));

        let wider = Argon2Config {
            parallelism: 2,
            ..fast()
        };
        assert!(needs_rehash(&hash, &wider));

        assert!(needs_rehash("garbage", &fast()));
    }

    #[test]
    fn test_needs_rehash_other_variant() {
        use argon2::PasswordHasher as _;

        let argon2i = Argon2::new(
            Algorithm::Argon2i,
            Version::V0x13,
            Params::new(1024, 1, 1, Some(32)).unwrap(),
        );
        let salt = SaltString::generate(&mut OsRng);
        let hash = argon2i.hash_password(b"pw", &salt).unwrap().to_string();
        assert!(needs_rehash(&hash, &fast()));
        // Still verifiable under its own parameters
        assert!(verify_password("pw", &hash));
    }

    #[test]
    fn test_strength_scoring() {
        let policy = StrengthPolicy::default();

        let strong = score_strength("Tr0ub4dor&3xyz", &policy);
        assert_eq!(strong.score, MAX_STRENGTH_SCORE);
        assert!(strong.is_valid);
        assert_eq!(strong.feedback, vec![STRENGTH_OK_MESSAGE]);

        let weak = score_strength("aaa", &policy);
        // lowercase only
        assert_eq!(weak.score, 1);
        assert!(!weak.is_valid);
        assert!(weak.feedback.contains(&"Add numbers".to_string()));
        assert!(weak
            .feedback
            .contains(&"Avoid repeating the same character three or more times".to_string()));
    }

    #[test]
    fn test_strength_threshold_boundary() {
        let policy = StrengthPolicy::default();
        // 8 chars, lower, upper, digit, symbol, no repeats; missing length >= 12
        let six = score_strength("Abcdef1!", &policy);
        assert_eq!(six.score, 6);
        assert!(six.is_valid);

        // Drop the symbol
        let five = score_strength("Abcdefg1", &policy);
        assert_eq!(five.score, 5);
        assert!(!five.is_valid);
        assert_eq!(
            five.feedback,
            vec![
                "Use 12 or more characters for a stronger password".to_string(),
                "Add special characters".to_string(),
            ]
        );
    }

    #[test]
    fn test_repeated_run_detection() {
        assert!(!has_repeated_run("aabbcc", 3));
        assert!(has_repeated_run("abccc", 3));
        assert!(!has_repeated_run("", 3));
    }

    #[tokio::test]
    async fn test_argon2_hasher_runs_on_pool() {
        let hasher = Argon2Hasher::new(fast(), StrengthPolicy::default(), HashingPool::new(2));
        let hash = hasher.hash("s3cret-Passw0rd").await.unwrap();
        assert!(hasher.verify("s3cret-Passw0rd", &hash).await);
        assert!(!hasher.verify("nope", &hash).await);
        assert!(!hasher.needs_rehash(&hash));
    }

    #[tokio::test]
    async fn test_argon2_hasher_closed_pool() {
        let pool = HashingPool::new(1);
        pool.close();
        let hasher = Argon2Hasher::new(fast(), StrengthPolicy::default(), pool);
        assert_eq!(
            hasher.hash("pw").await,
            Err(PasswordError::Pool(PoolError::Closed))
        );
    }
}
