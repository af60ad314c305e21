//! Numeral normalization for phone and code inputs.
//!
//! Users type, paste, or autofill Persian (`۰-۹`) and Arabic-indic (`٠-٩`)
//! digits. Everything numeric is mapped to ASCII before validation or before
//! it leaves the client.

/// Maximum number of digits in a verification code.
pub const CODE_LENGTH: usize = 6;

const PERSIAN_ZERO: u32 = '۰' as u32;
const ARABIC_INDIC_ZERO: u32 = '٠' as u32;

/// Map a single Persian or Arabic-indic digit to its ASCII equivalent.
///
/// Any other character is returned unchanged.
pub fn to_ascii_digit(c: char) -> char {
    let code = c as u32;
    let offset = if (PERSIAN_ZERO..PERSIAN_ZERO + 10).contains(&code) {
        code - PERSIAN_ZERO
    } else if (ARABIC_INDIC_ZERO..ARABIC_INDIC_ZERO + 10).contains(&code) {
        code - ARABIC_INDIC_ZERO
    } else {
        return c;
    };
    char::from_digit(offset, 10).unwrap_or(c)
}

/// Replace every Persian/Arabic-indic digit in `input` with ASCII `0-9`.
pub fn normalize_digits(input: &str) -> String {
    input.chars().map(to_ascii_digit).collect()
}

/// Render ASCII digits as Persian digits for display.
pub fn to_persian_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from_u32(PERSIAN_ZERO + d).unwrap_or(c),
            None => c,
        })
        .collect()
}

/// Sanitize a code field value: normalize numerals, drop anything that is
/// not an ASCII digit, cap at [`CODE_LENGTH`].
pub fn sanitize_code_input(input: &str) -> String {
    normalize_digits(input)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(CODE_LENGTH)
        .collect()
}

/// Paste `pasted` into a code field that currently holds `current`.
///
/// Pasting appends after the existing digits; overflow beyond
/// [`CODE_LENGTH`] is discarded.
pub fn paste_code(current: &str, pasted: &str) -> String {
    let mut combined = sanitize_code_input(current);
    combined.push_str(&sanitize_code_input(pasted));
    combined.truncate(CODE_LENGTH);
    combined
}

/// Format remaining seconds as `m:ss` for the resend countdown.
pub fn format_countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
