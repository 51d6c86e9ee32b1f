use crate::config::environment::EnvironmentConfig;
use crate::dto::auth_dto::{LoginRequest, LoginResponse};
use crate::utils::errors::AppError;
use crate::utils::jwt::AdminTokenService;

pub struct AuthController<'a> {
    config: &'a EnvironmentConfig,
    tokens: &'a AdminTokenService,
}

impl<'a> AuthController<'a> {
    pub fn new(config: &'a EnvironmentConfig, tokens: &'a AdminTokenService) -> Self {
        Self { config, tokens }
    }

    /// Login con la clave compartida del administrador
    pub fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        let expected = self
            .config
            .admin_password
            .as_deref()
            .ok_or(AppError::AdminNotConfigured)?;

        if !constant_time_eq(request.password.as_bytes(), expected.as_bytes()) {
            log::warn!("🔐 Intento de login de administrador fallido");
            return Err(AppError::Unauthorized("Credenciales inválidas".to_string()));
        }

        log::info!("🔐 Login de administrador exitoso");
        Ok(LoginResponse::success(self.tokens.issue()?))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
