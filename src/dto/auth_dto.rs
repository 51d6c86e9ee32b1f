use serde::{Deserialize, Serialize};

// Login del administrador
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
}

impl LoginResponse {
    pub fn success(token: String) -> Self {
        Self { ok: true, token }
    }
}
