//! Modelo de Company
//!
//! Perfil de empresa emisora. Se administra fuera de este servicio; aquí solo
//! se consume por id al renderizar y al enviar correos.

use serde::{Deserialize, Serialize};

/// Perfil de empresa - mapea un elemento de `empresas.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub payment_details: Option<String>,
    #[serde(default)]
    pub terms: Option<String>,
}

impl CompanyProfile {
    /// Nombre a mostrar en la cabecera del PDF
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Empresa"
        } else {
            &self.name
        }
    }

    /// Líneas de contacto no vacías, en orden de cabecera
    pub fn contact_lines(&self) -> Vec<&str> {
        [&self.email, &self.address, &self.phone, &self.tax_id]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .filter(|line| !line.trim().is_empty())
            .collect()
    }
}
