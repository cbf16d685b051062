//! # Amount in Words
//!
//! Spanish wording printed under a receipt total:
//!
//! ```text
//! $1,234.50  →  MIL DOSCIENTOS TREINTA Y CUATRO CON 50/100 DÓLARES
//! ```
//!
//! ## Usage
//! ```rust
//! use bolsita_core::{words::amount_in_words, Money};
//!
//! assert_eq!(
//!     amount_in_words(Money::from_cents(2400)),
//!     "VEINTICUATRO CON 00/100 DÓLARES"
//! );
//! ```

use crate::money::Money;

const UNITS: [&str; 10] = [
    "", "UNO", "DOS", "TRES", "CUATRO", "CINCO", "SEIS", "SIETE", "OCHO", "NUEVE",
];

const TEENS: [&str; 10] = [
    "DIEZ", "ONCE", "DOCE", "TRECE", "CATORCE", "QUINCE", "DIECISÉIS", "DIECISIETE",
    "DIECIOCHO", "DIECINUEVE",
];

const TWENTIES: [&str; 10] = [
    "VEINTE", "VEINTIUNO", "VEINTIDÓS", "VEINTITRÉS", "VEINTICUATRO", "VEINTICINCO",
    "VEINTISÉIS", "VEINTISIETE", "VEINTIOCHO", "VEINTINUEVE",
];

const TENS: [&str; 10] = [
    "", "DIEZ", "VEINTE", "TREINTA", "CUARENTA", "CINCUENTA", "SESENTA", "SETENTA", "OCHENTA",
    "NOVENTA",
];

const HUNDREDS: [&str; 10] = [
    "", "CIENTO", "DOSCIENTOS", "TRESCIENTOS", "CUATROCIENTOS", "QUINIENTOS", "SEISCIENTOS",
    "SETECIENTOS", "OCHOCIENTOS", "NOVECIENTOS",
];

/// Largest whole amount that can be worded.
pub const MAX_WORDED_UNITS: i64 = 999_999_999;

/// Words for `amount`, or `None` when its whole part exceeds
/// [`MAX_WORDED_UNITS`]. Negative amounts are worded by magnitude.
pub fn try_amount_in_words(amount: Money) -> Option<String> {
    let amount = amount.abs();
    let whole = amount.dollars();
    if whole > MAX_WORDED_UNITS {
        return None;
    }
    Some(format!(
        "{} CON {:02}/100 DÓLARES",
        whole_in_words(whole),
        amount.cents_part()
    ))
}

/// Like [`try_amount_in_words`], falling back to digits for amounts too
/// large to word.
pub fn amount_in_words(amount: Money) -> String {
    try_amount_in_words(amount).unwrap_or_else(|| {
        let amount = amount.abs();
        format!("{} CON {:02}/100 DÓLARES", amount.dollars(), amount.cents_part())
    })
}

fn whole_in_words(n: i64) -> String {
    if n == 0 {
        return "CERO".to_string();
    }

    let millions = n / 1_000_000;
    let thousands = (n / 1_000) % 1_000;
    let rest = n % 1_000;

    let mut parts: Vec<String> = Vec::new();
    match millions {
        0 => {}
        1 => parts.push("UN MILLÓN".to_string()),
        m => parts.push(format!("{} MILLONES", apocopate(hundreds(m)))),
    }
    match thousands {
        0 => {}
        1 => parts.push("MIL".to_string()),
        t => parts.push(format!("{} MIL", apocopate(hundreds(t)))),
    }
    if rest > 0 {
        parts.push(hundreds(rest));
    }

    parts.join(" ")
}

/// "UNO" becomes "UN" before a noun ("VEINTIÚN MIL", "TREINTA Y UN MIL").
fn apocopate(words: String) -> String {
    if let Some(stem) = words.strip_suffix("VEINTIUNO") {
        format!("{}VEINTIÚN", stem)
    } else if let Some(stem) = words.strip_suffix("UNO") {
        format!("{}UN", stem)
    } else {
        words
    }
}

fn hundreds(n: i64) -> String {
    let n = n as usize;
    if n == 100 {
        return "CIEN".to_string();
    }
    let head = HUNDREDS[n / 100];
    let tail = tens(n % 100);
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail,
        (false, true) => head.to_string(),
        (false, false) => format!("{} {}", head, tail),
    }
}

fn tens(n: usize) -> String {
    match n {
        0..=9 => UNITS[n].to_string(),
        10..=19 => TEENS[n - 10].to_string(),
        20..=29 => TWENTIES[n - 20].to_string(),
        _ if n % 10 == 0 => TENS[n / 10].to_string(),
        _ => format!("{} Y {}", TENS[n / 10], UNITS[n % 10]),
    }
}
