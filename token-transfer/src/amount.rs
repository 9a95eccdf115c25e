//! Conversions between human readable amounts and base units.
//!
//! Every conversion truncates. Rounding up would ask the source chain for more than the caller
//! intended to send.

use crate::error::AmountError;

/// Decimals carried in token bridge payloads. Tokens with more decimals lose the extra precision.
pub const MAX_PAYLOAD_DECIMALS: u8 = 8;

fn pow10(exp: u32) -> Option<u128> {
    10u128.checked_pow(exp)
}

/// Parses a decimal string such as `"0.0015"` into base units of a token with `decimals`
/// decimals. Fractional digits beyond `decimals` are dropped.
pub fn parse_units(text: &str, decimals: u8) -> Result<u128, AmountError> {
    let s = text.trim();
    let invalid = || AmountError::Invalid(text.to_string());
    let overflow = || AmountError::Overflow(text.to_string());

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let scale = pow10(u32::from(decimals)).ok_or_else(overflow)?;

    let whole = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| overflow())?
    };

    let kept = &frac[..frac.len().min(usize::from(decimals))];
    let frac = if kept.is_empty() {
        0
    } else {
        let digits = kept.parse::<u128>().map_err(|_| overflow())?;
        let pad = pow10((usize::from(decimals) - kept.len()) as u32).ok_or_else(overflow)?;
        digits.checked_mul(pad).ok_or_else(overflow)?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(overflow)
}

/// Renders base units as a decimal string without trailing zeros.
pub fn format_units(amount: u128, decimals: u8) -> String {
    // 10^decimals only overflows past 38 decimals, and no u128 has more than 39 digits.
    let Some(scale) = pow10(u32::from(decimals)) else {
        return format!("0.{amount:0>width$}", width = usize::from(decimals))
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string();
    };

    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }

    let frac = format!("{frac:0>width$}", width = usize::from(decimals));
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Truncates an amount in base units of a token with `decimals` decimals to the at most 8 decimal
/// precision of the token bridge.
pub fn normalize(amount: u128, decimals: u8) -> u128 {
    if decimals <= MAX_PAYLOAD_DECIMALS {
        return amount;
    }

    match pow10(u32::from(decimals - MAX_PAYLOAD_DECIMALS)) {
        Some(d) => amount / d,
        None => 0,
    }
}

/// Inverse of [`normalize`], up to the truncated precision.
pub fn denormalize(amount: u128, decimals: u8) -> u128 {
    if decimals <= MAX_PAYLOAD_DECIMALS {
        return amount;
    }

    match pow10(u32::from(decimals - MAX_PAYLOAD_DECIMALS)) {
        Some(d) => amount.saturating_mul(d),
        None => u128::MAX,
    }
}

/// The value written to the 64 bit amount field of a transfer payload.
pub fn payload_amount(amount: u128, decimals: u8) -> Result<u64, AmountError> {
    let n = normalize(amount, decimals);
    u64::try_from(n).map_err(|_| AmountError::TooLarge(n))
}
