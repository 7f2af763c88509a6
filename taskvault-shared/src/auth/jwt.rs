/// Bearer token issuing and verification
///
/// Tokens are HMAC-signed JWTs carrying exactly three claims:
/// `user_id`, `role` and `exp`. They are minted at login, live for one hour
/// by default and are never revoked server-side; expiry is the only way a
/// token stops being accepted.
///
/// # Verification Order
///
/// [`verify_token_at`] runs a fixed chain and stops at the first failure:
///
/// 1. Token must parse and use an HMAC algorithm (HS256/HS384/HS512)
/// 2. Signature must match the shared secret
/// 3. Claims must be a JSON object
/// 4. `exp` must be numeric and not earlier than `now`
/// 5. `user_id` must be numeric
/// 6. `role` must be a string naming a known role
///
/// The order is observable: each step has its own [`JwtError`] variant and
/// rejection message.
///
/// # Example
///
/// ```
/// use taskvault_shared::auth::jwt::{create_token, verify_token, Claims};
/// use taskvault_shared::models::user::Role;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "test-secret-key-at-least-32-bytes-long";
///
/// let claims = Claims::new(7, Role::Member);
/// let token = create_token(&claims, secret)?;
///
/// let verified = verify_token(&token, secret)?;
/// assert_eq!(verified.user_id, 7);
/// assert_eq!(verified.role, Role::Member);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::models::user::Role;

/// Default token lifetime in seconds
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Error type for JWT operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token could not be parsed
    #[error("Invalid token")]
    Malformed,

    /// Header names a non-HMAC algorithm
    #[error("Unexpected signing method")]
    UnexpectedAlgorithm,

    /// Signature does not match the secret
    #[error("Invalid token")]
    InvalidSignature,

    /// Payload is not a JSON object
    #[error("Invalid token claims")]
    InvalidClaims,

    /// `exp` is missing, non-numeric or in the past
    #[error("Token expired")]
    Expired,

    /// `user_id` is missing or non-numeric
    #[error("Invalid user ID in token")]
    InvalidUserId,

    /// `role` is missing, not a string or not a known role
    #[error("Invalid role in token")]
    InvalidRole,
}

/// Verified token claims
///
/// Only produced by [`Claims::new`]/[`Claims::with_expiration`] when minting,
/// or by [`verify_token_at`] after the full validation chain has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user
    pub user_id: i32,

    /// Role at the time of login
    pub role: Role,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Creates claims that expire after [`DEFAULT_TOKEN_TTL_SECS`]
    pub fn new(user_id: i32, role: Role) -> Self {
        Self::with_expiration(user_id, role, Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
    }

    /// Creates claims with a custom lifetime
    ///
    /// # Example
    ///
    /// ```
    /// use taskvault_shared::auth::jwt::Claims;
    /// use taskvault_shared::models::user::Role;
    /// use chrono::Duration;
    ///
    /// let claims = Claims::with_expiration(1, Role::Admin, Duration::minutes(5));
    /// assert!(!claims.is_expired());
    /// ```
    pub fn with_expiration(user_id: i32, role: Role, expires_in: Duration) -> Self {
        Self {
            user_id,
            role,
            exp: (Utc::now() + expires_in).timestamp(),
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        self.exp < Utc::now().timestamp()
    }

    /// Builds typed claims from a decoded payload, checking steps 3 to 6
    fn from_payload(payload: &Value, now: i64) -> Result<Self, JwtError> {
        let map: &Map<String, Value> = payload.as_object().ok_or(JwtError::InvalidClaims)?;

        let exp = map
            .get("exp")
            .and_then(Value::as_f64)
            .ok_or(JwtError::Expired)?;
        // fractional expirations truncate toward zero
        let exp = exp as i64;
        if exp < now {
            return Err(JwtError::Expired);
        }

        // any JSON number is accepted and truncated; ids must fit a SERIAL
        let user_id = map
            .get("user_id")
            .and_then(Value::as_f64)
            .filter(|id| *id >= i32::MIN as f64 && *id < i32::MAX as f64 + 1.0)
            .ok_or(JwtError::InvalidUserId)? as i32;

        let role = map
            .get("role")
            .and_then(Value::as_str)
            .and_then(|r| r.parse::<Role>().ok())
            .ok_or(JwtError::InvalidRole)?;

        Ok(Self { user_id, role, exp })
    }
}

/// Signs claims with HS256
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies a token against the current wall clock
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    verify_token_at(token, secret, Utc::now().timestamp())
}

/// Verifies a token as of `now` (Unix seconds)
///
/// Claim checks are done here rather than by `jsonwebtoken`, so that a
/// non-numeric `exp` or a missing `user_id` produce distinct errors. A token
/// whose `exp` equals `now` is still accepted.
///
/// # Example
///
/// ```
/// use taskvault_shared::auth::jwt::{create_token, verify_token_at, Claims, JwtError};
/// use taskvault_shared::models::user::Role;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "test-secret-key-at-least-32-bytes-long";
/// let claims = Claims { user_id: 3, role: Role::Member, exp: 1_000 };
/// let token = create_token(&claims, secret)?;
///
/// assert!(verify_token_at(&token, secret, 1_000).is_ok());
/// assert_eq!(verify_token_at(&token, secret, 1_001), Err(JwtError::Expired));
/// # Ok(())
/// # }
/// ```
pub fn verify_token_at(token: &str, secret: &str, now: i64) -> Result<Claims, JwtError> {
    let header = decode_header(token).map_err(|_| JwtError::Malformed)?;
    if !HMAC_ALGORITHMS.contains(&header.alg) {
        return Err(JwtError::UnexpectedAlgorithm);
    }

    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(header.alg);
    validation.algorithms = HMAC_ALGORITHMS.to_vec();
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let token_data = decode::<Value>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::InvalidAlgorithm => JwtError::UnexpectedAlgorithm,
        ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        ErrorKind::Json(_) => JwtError::InvalidClaims,
        _ => JwtError::Malformed,
    })?;

    Claims::from_payload(&token_data.claims, now)
}
