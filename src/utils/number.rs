//! Formato numérico chileno: punto para miles y coma para decimales.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::quote::Currency;

/// Formatear con separador de miles `.` y decimales con `,`
pub fn format_number_dot(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let fixed = format!("{:.*}", decimals as usize, rounded);

    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, dec_part) = match unsigned.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    match dec_part {
        Some(d) => format!("{}{},{}", sign, grouped, d),
        None => format!("{}{}", sign, grouped),
    }
}

/// Monto con su moneda: CLP sin decimales, el resto con uno
pub fn format_amount(value: Decimal, currency: Currency) -> String {
    let decimals = match currency {
        Currency::Clp => 0,
        _ => 1,
    };
    format!("{} {}", format_number_dot(value, decimals), currency.code())
}
