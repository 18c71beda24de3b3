use crate::error::{CoreError, RpcError};
use crate::types::{NodeTransaction, U256};

fn invalid(message: String) -> CoreError {
    RpcError::InvalidResponse(message).into()
}

fn hex_digits<'a>(value: &'a serde_json::Value, field: &str) -> Result<&'a str, CoreError> {
    let s = value
        .as_str()
        .ok_or_else(|| invalid(format!("{field}: expected hex string, got {value}")))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| invalid(format!("{field}: `{s}` is not 0x-prefixed")))?;
    if digits.is_empty() {
        return Err(invalid(format!("{field}: empty hex quantity")));
    }
    Ok(digits)
}

/// Parse a `0x`-prefixed hex quantity of up to 256 bits.
pub(super) fn parse_quantity_u256(
    value: &serde_json::Value,
    field: &str,
) -> Result<U256, CoreError> {
    let digits = hex_digits(value, field)?;
    U256::from_str_radix(digits, 16)
        .map_err(|e| invalid(format!("{field}: invalid quantity `{digits}`: {e}")))
}

pub(super) fn parse_quantity_u64(value: &serde_json::Value, field: &str) -> Result<u64, CoreError> {
    let n = parse_quantity_u256(value, field)?;
    if n > U256::from(u64::MAX) {
        return Err(invalid(format!("{field} out of range: {n}")));
    }
    Ok(n.as_u64())
}

pub(super) fn parse_field_u64(
    object: &serde_json::Value,
    field: &str,
) -> Result<u64, CoreError> {
    let value = object
        .get(field)
        .ok_or_else(|| invalid(format!("missing {field}")))?;
    parse_quantity_u64(value, field)
}

/// Largest 256-bit value; confirmation risk is reported as a fraction of it.
fn max_u256_as_f64() -> f64 {
    2f64.powi(256) - 1.0
}

/// Convert `cfx_getConfirmationRiskByHash` output into a revert rate in
/// `[0, 1]`. A `null` result means the node has no risk figure.
pub(super) fn parse_revert_rate(raw: &serde_json::Value) -> Result<Option<f64>, CoreError> {
    if raw.is_null() {
        return Ok(None);
    }

    let digits = hex_digits(raw, "confirmation risk")?;
    if digits.len() > 64 {
        return Err(invalid(format!(
            "confirmation risk `{digits}` exceeds 256 bits"
        )));
    }
    let risk = digits.chars().try_fold(0f64, |acc, c| {
        c.to_digit(16)
            .map(|d| acc * 16.0 + f64::from(d))
            .ok_or_else(|| invalid(format!("confirmation risk `{digits}` is not hex")))
    })?;

    Ok(Some((risk / max_u256_as_f64()).min(1.0)))
}

/// `null` means the node does not know the transaction.
pub(super) fn parse_transaction(
    raw: serde_json::Value,
) -> Result<Option<NodeTransaction>, CoreError> {
    if raw.is_null() {
        return Ok(None);
    }
    serde_json::from_value(raw)
        .map(Some)
        .map_err(|e| invalid(format!("invalid transaction: {e}")))
}
