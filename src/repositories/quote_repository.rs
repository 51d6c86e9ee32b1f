//! Repositorio de cotizaciones en archivos JSON
//!
//! Un documento por cotización (`<referencia>.json`) dentro del directorio de
//! salida, junto a los artefactos derivados (`pdfs/<referencia>.pdf` y
//! `<referencia>_qr.png`). El repositorio no bloquea: quien escribe debe
//! serializar el acceso por referencia.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::models::quote::Quote;

/// Errores del almacenamiento de documentos
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document '{0}' not found")]
    NotFound(String),

    #[error("I/O error on '{file}': {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{file}': {source}")]
    Serialization {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid reference prefix '{0}'")]
    InvalidPrefix(String),
}

/// Entrada del listado de documentos
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub file: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct QuoteRepository {
    root: PathBuf,
    prefix: String,
    file_pattern: Regex,
    reference_pattern: Regex,
}

impl QuoteRepository {
    /// Crear el repositorio y asegurar `root` y `root/pdfs`
    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Result<Self, StoreError> {
        let root = root.into();
        let escaped = regex::escape(prefix);
        let file_pattern = Regex::new(&format!(r"(?i)^{}-\d{{4}}-[A-Za-z0-9_-]+\.json$", escaped))
            .map_err(|_| StoreError::InvalidPrefix(prefix.to_string()))?;
        let reference_pattern = Regex::new(&format!(r"(?i)^{}-\d{{4}}-[A-Za-z0-9_-]+$", escaped))
            .map_err(|_| StoreError::InvalidPrefix(prefix.to_string()))?;

        for dir in [root.clone(), root.join("pdfs")] {
            std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
                file: dir.display().to_string(),
                source,
            })?;
        }

        Ok(Self {
            root,
            prefix: prefix.to_string(),
            file_pattern,
            reference_pattern,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pdf_path(&self, reference: &str) -> PathBuf {
        self.root.join("pdfs").join(format!("{}.pdf", reference))
    }

    pub fn qr_path(&self, reference: &str) -> PathBuf {
        self.root.join(format!("{}_qr.png", reference))
    }

    /// Acepta `COT-2025-123456` o `COT-2025-123456.json`.
    /// Cualquier otro nombre (incluidos rutas) se trata como inexistente.
    pub fn normalize_file(&self, file: &str) -> Result<String, StoreError> {
        let file = file.trim();
        if self.file_pattern.is_match(file) {
            return Ok(file.to_string());
        }
        if self.reference_pattern.is_match(file) {
            return Ok(format!("{}.json", file));
        }
        Err(StoreError::NotFound(file.to_string()))
    }

    /// Referencia a partir del nombre de archivo
    pub fn reference_of(file: &str) -> &str {
        file.strip_suffix(".json").unwrap_or(file)
    }

    /// Listar documentos que siguen la convención de nombres
    pub async fn list(&self) -> Result<Vec<StoredDocument>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|source| StoreError::Io {
            file: self.root.display().to_string(),
            source,
        })?;

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io {
            file: self.root.display().to_string(),
            source,
        })? {
            let name = entry.file_name().to_string_lossy().to_string();
            if self.file_pattern.is_match(&name) {
                documents.push(StoredDocument {
                    path: entry.path(),
                    file: name,
                });
            }
        }

        documents.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(documents)
    }

    pub async fn exists(&self, file: &str) -> bool {
        match self.normalize_file(file) {
            Ok(file) => tokio::fs::try_exists(self.root.join(file)).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn read(&self, file: &str) -> Result<Quote, StoreError> {
        let file = self.normalize_file(file)?;
        let path = self.root.join(&file);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(file)),
            Err(source) => return Err(StoreError::Io { file, source }),
        };

        serde_json::from_str(&raw).map_err(|source| StoreError::Serialization { file, source })
    }

    /// Sobrescritura completa: JSON con sangría, UTF-8, vía archivo temporal
    pub async fn write(&self, file: &str, quote: &Quote) -> Result<(), StoreError> {
        let file = self.normalize_file(file)?;
        let path = self.root.join(&file);
        let tmp = self.root.join(format!(".{}.tmp", file));

        let body = serde_json::to_string_pretty(quote).map_err(|source| StoreError::Serialization {
            file: file.clone(),
            source,
        })?;

        tokio::fs::write(&tmp, body.as_bytes())
            .await
            .map_err(|source| StoreError::Io { file: file.clone(), source })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io { file, source })
    }

    pub async fn delete(&self, file: &str) -> Result<(), StoreError> {
        let file = self.normalize_file(file)?;
        match tokio::fs::remove_file(self.root.join(&file)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(file)),
            Err(source) => Err(StoreError::Io { file, source }),
        }
    }

    /// Borrar PDF y QR de una referencia; los faltantes se ignoran
    pub async fn remove_artifacts(&self, reference: &str) -> Result<(), StoreError> {
        for path in [self.pdf_path(reference), self.qr_path(reference)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => log::debug!("🗑️ Artefacto eliminado: {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StoreError::Io {
                        file: path.display().to_string(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    /// Próxima referencia libre: `<PREFIX>-<año>-<6 dígitos>`
    pub async fn next_reference(&self) -> String {
        let candidate = format_reference(&self.prefix, Utc::now());
        if !self.exists(&candidate).await {
            return candidate;
        }

        let year = Utc::now().year();
        let mut candidate = candidate;
        for _ in 0..20 {
            let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
            candidate = format!("{}-{}-{:06}", self.prefix, year, suffix);
            if !self.exists(&candidate).await {
                break;
            }
        }
        candidate
    }
}

/// Los últimos 6 dígitos del timestamp en milisegundos
pub fn format_reference(prefix: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{:06}",
        prefix,
        now.year(),
        now.timestamp_millis().rem_euclid(1_000_000)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn quote(reference: &str) -> Quote {
        serde_json::from_value(json!({
            "reference": reference,
            "capabilityToken": "aaa.bbb.ccc123456",
            "client": "ACME",
            "lineItems": [],
            "currency": "CLP",
            "net": 100, "tax": 19, "total": 119
        }))
        .unwrap()
    }

    #[test]
    fn test_format_reference() {
        let now = Utc.timestamp_millis_opt(1_758_412_345_678).unwrap();
        assert_eq!(format_reference("COT", now), "COT-2025-345678");
        let early = Utc.timestamp_millis_opt(1_758_412_000_042).unwrap();
        assert_eq!(format_reference("COT", early), "COT-2025-000042");
    }

    #[test]
    fn test_normalize_file_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let repo = QuoteRepository::new(dir.path(), "COT").unwrap();

        assert_eq!(repo.normalize_file("COT-2025-123456").unwrap(), "COT-2025-123456.json");
        assert_eq!(repo.normalize_file("COT-2025-123456.json").unwrap(), "COT-2025-123456.json");
        assert!(repo.normalize_file("../secrets.json").is_err());
        assert!(repo.normalize_file("COT-2025-../../x.json").is_err());
        assert!(repo.normalize_file("empresas.json").is_err());
    }

    #[tokio::test]
    async fn test_write_read_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let repo = QuoteRepository::new(dir.path(), "COT").unwrap();
        assert!(dir.path().join("pdfs").is_dir());

        let q = quote("COT-2025-000001");
        repo.write("COT-2025-000001.json", &q).await.unwrap();
        std::fs::write(dir.path().join("empresas.json"), "[]").unwrap();

        let listed = repo.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file, "COT-2025-000001.json");

        let read = repo.read("COT-2025-000001").await.unwrap();
        assert_eq!(read, q);

        let raw = std::fs::read_to_string(dir.path().join("COT-2025-000001.json")).unwrap();
        assert!(raw.contains("\n  \"reference\""));

        repo.delete("COT-2025-000001.json").await.unwrap();
        assert!(repo.list().await.unwrap().is_empty());
        assert!(matches!(
            repo.read("COT-2025-000001.json").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete("COT-2025-000001.json").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_artifacts_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = QuoteRepository::new(dir.path(), "COT").unwrap();
        std::fs::write(repo.pdf_path("COT-2025-000001"), b"%PDF").unwrap();

        repo.remove_artifacts("COT-2025-000001").await.unwrap();
        assert!(!repo.pdf_path("COT-2025-000001").exists());
        repo.remove_artifacts("COT-2025-000001").await.unwrap();
    }

    #[tokio::test]
    async fn test_next_reference_avoids_existing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = QuoteRepository::new(dir.path(), "COT").unwrap();

        let first = repo.next_reference().await;
        assert!(repo.normalize_file(&first).is_ok());
        repo.write(&first, &quote(&first)).await.unwrap();

        let second = repo.next_reference().await;
        assert_ne!(first, second);
    }
}
