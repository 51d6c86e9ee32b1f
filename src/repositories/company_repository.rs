//! Directorio de empresas
//!
//! El CRUD de empresas vive fuera del motor de cotizaciones; aquí solo se
//! consultan perfiles por id desde `empresas.json`.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::models::company::CompanyProfile;

#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    async fn get(&self, id: &str) -> Option<CompanyProfile>;
    async fn list(&self) -> Vec<CompanyProfile>;
}

/// Implementación sobre el archivo `empresas.json` del directorio de salida
pub struct JsonCompanyDirectory {
    path: PathBuf,
}

impl JsonCompanyDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CompanyDirectory for JsonCompanyDirectory {
    async fn get(&self, id: &str) -> Option<CompanyProfile> {
        self.list().await.into_iter().find(|company| company.id == id)
    }

    async fn list(&self) -> Vec<CompanyProfile> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("📇 Sin directorio de empresas en {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("⚠️ empresas.json inválido ({}): {}", self.path.display(), e);
            Vec::new()
        })
    }
}
