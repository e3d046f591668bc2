use itertools::Itertools;
use rust_decimal::Decimal;

/// Round to a whole number and group the digits by thousands, e.g.
/// `-1234567.6` becomes `-1,234,568`.
pub fn thousands(value: Decimal) -> String {
    let rounded = value.round_dp(0).normalize();
    let digits = rounded.abs().trunc().to_string();
    let grouped = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .join(",");
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
