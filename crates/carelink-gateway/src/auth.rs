use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use carelink_types::api::Claims;

/// Validate an identity-provider token and return its claims.
/// Shared by the REST middleware and the gateway Identify handshake.
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| debug!("Rejected token: {}", e))
    .ok()
}
