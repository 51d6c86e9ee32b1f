//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de datos
//! y conversión de tipos.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use validator::ValidationError;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").unwrap();
}

/// Validación pragmática de un correo (sin espacios, con dominio y TLD)
pub fn is_valid_email(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && EMAIL_RE.is_match(trimmed)
}

/// Convertir un valor JSON (número o string) a Decimal
pub fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Decimal::from_str(trimmed).ok()
            }
        }
        _ => None,
    }
}

/// Validar que un monto no sea negativo
pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar que un string no esté vacío
pub fn validate_not_empty(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar un porcentaje de descuento entre 0 y 100
pub fn validate_percent(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        let mut error = ValidationError::new("percent");
        error.add_param("min".into(), &0);
        error.add_param("max".into(), &100);
        error.add_param("actual".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("cliente@empresa.cl"));
        assert!(is_valid_email("  cliente@empresa.cl "));
        assert!(!is_valid_email("cliente@empresa"));
        assert!(!is_valid_email("cliente empresa@x.cl"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("+56 9 1234 5678"));
    }

    #[test]
    fn test_decimal_from_json() {
        assert_eq!(decimal_from_json(&json!(100)), Some(dec!(100)));
        assert_eq!(decimal_from_json(&json!(100.5)), Some(dec!(100.5)));
        assert_eq!(decimal_from_json(&json!("250")), Some(dec!(250)));
        assert_eq!(decimal_from_json(&json!(" 250.00 ")), Some(dec!(250)));
        assert_eq!(decimal_from_json(&json!("")), None);
        assert_eq!(decimal_from_json(&json!("abc")), None);
        assert_eq!(decimal_from_json(&json!(null)), None);
    }

    #[test]
    fn test_amount_validators() {
        assert!(validate_non_negative(&dec!(0)).is_ok());
        assert!(validate_non_negative(&dec!(-1)).is_err());
        assert!(validate_percent(&dec!(15)).is_ok());
        assert!(validate_percent(&dec!(101)).is_err());
        assert!(validate_not_empty("  ").is_err());
    }
}
