use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access-token payload issued by the hosted auth backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,            // user ID
    pub exp: usize,           // expires at (unix timestamp)
    pub aud: String,          // audience, "authenticated" for signed-in users
    #[serde(default)]
    pub email: Option<String>,
}
