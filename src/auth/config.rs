//! Session manager configuration.

use chrono::TimeDelta;

/// Upper bound accepted for either token TTL: ten years.
pub const MAX_TOKEN_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_VERIFICATION_CODE_LENGTH: usize = 8;

/// How a refresh persists the rotated session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RotationPolicy {
    /// Look up, then overwrite. Two concurrent refreshes with the same token
    /// may both succeed; the last write survives in the store.
    #[default]
    LastWriteWins,
    /// Overwrite only if the stored refresh token is still the presented one.
    /// The loser of a concurrent refresh gets `NotFound`.
    CompareAndSwap,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    verification_code_length: usize,
    rotation: RotationPolicy,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            verification_code_length: DEFAULT_VERIFICATION_CODE_LENGTH,
            rotation: RotationPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_verification_code_length(mut self, length: usize) -> Self {
        self.verification_code_length = length;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    /// `None` if the configured seconds do not fit a [`TimeDelta`].
    #[must_use]
    pub fn access_token_ttl(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.access_token_ttl_seconds)
    }

    /// `None` if the configured seconds do not fit a [`TimeDelta`].
    #[must_use]
    pub fn refresh_token_ttl(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.refresh_token_ttl_seconds)
    }

    #[must_use]
    pub fn verification_code_length(&self) -> usize {
        self.verification_code_length
    }

    #[must_use]
    pub fn rotation(&self) -> RotationPolicy {
        self.rotation
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttls_and_code_length() {
        let config = AuthConfig::new();
        assert_eq!(config.access_token_ttl(), Some(TimeDelta::minutes(15)));
        assert_eq!(config.refresh_token_ttl(), Some(TimeDelta::days(30)));
        assert_eq!(config.verification_code_length(), 8);
        assert_eq!(config.rotation(), RotationPolicy::LastWriteWins);
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new()
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(3600)
            .with_verification_code_length(6)
            .with_rotation(RotationPolicy::CompareAndSwap);
        assert_eq!(config.access_token_ttl(), Some(TimeDelta::seconds(60)));
        assert_eq!(config.refresh_token_ttl(), Some(TimeDelta::hours(1)));
        assert_eq!(config.verification_code_length(), 6);
        assert_eq!(config.rotation(), RotationPolicy::CompareAndSwap);
    }

    #[test]
    fn oversized_ttl_is_none() {
        let config = AuthConfig::new().with_refresh_token_ttl_seconds(i64::MAX);
        assert_eq!(config.refresh_token_ttl(), None);
    }
}
