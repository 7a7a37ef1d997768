//! Access and refresh token minting.
//!
//! Access tokens are compact HS256 JWTs carrying the principal id as `sub`.
//! Refresh tokens are opaque random values; only the credential store can map
//! one back to a principal.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALG_HS256: &str = "HS256";
const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("empty signing key")]
    EmptyKey,
    #[error("invalid signing key")]
    InvalidKey,
    #[error("invalid token ttl")]
    InvalidTtl,
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("failed to generate random token")]
    Random(#[source] rand::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG_HS256.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints signed access tokens and opaque refresh tokens. Stateless.
pub trait TokenIssuer: Send + Sync {
    /// Sign a token for `subject` that expires `ttl` from now.
    ///
    /// # Errors
    /// Returns an error if `ttl` is not positive, overflows the clock, or
    /// encoding fails.
    fn signed_token(&self, subject: &str, ttl: Duration) -> Result<String, TokenError>;

    /// Generate an unguessable token with no decodable payload.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    fn opaque_token(&self) -> Result<String, TokenError>;
}

pub struct JwtIssuer {
    signing_key: SecretString,
}

impl JwtIssuer {
    /// # Errors
    /// Returns [`TokenError::EmptyKey`] if the key is empty.
    pub fn new(signing_key: SecretString) -> Result<Self, TokenError> {
        if signing_key.expose_secret().is_empty() {
            return Err(TokenError::EmptyKey);
        }
        Ok(Self { signing_key })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.signing_key.expose_secret().as_bytes())
            .map_err(|_| TokenError::InvalidKey)
    }

    fn encode(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        ))
    }

    /// Validate signature and expiry of an access token and return its claims.
    ///
    /// Used by request-authentication middleware; session issuance never calls it.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, forged, or expired.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::TokenFormat);
        };

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != ALG_HS256 {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signature =
            Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| TokenError::Base64)?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: AccessClaims = b64d_json(claims_b64)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIssuer")
            .field("signing_key", &"***")
            .finish()
    }
}

impl TokenIssuer for JwtIssuer {
    fn signed_token(&self, subject: &str, ttl: Duration) -> Result<String, TokenError> {
        if ttl <= Duration::zero() {
            return Err(TokenError::InvalidTtl);
        }
        let now = Utc::now();
        let expires_at = now.checked_add_signed(ttl).ok_or(TokenError::InvalidTtl)?;
        let claims = AccessClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        self.encode(&claims)
    }

    fn opaque_token(&self) -> Result<String, TokenError> {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut bytes).map_err(TokenError::Random)?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}
