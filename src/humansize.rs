//! Humanized-size parse/format for `-s`/`-S` and `Results`' byte-count
//! reporting. Suffixes are power-of-1024 (`k`/`m`/`g`/`t`/`p`). No pack
//! example does exactly this (the closest, `jzbor-nix-sweep`, pulls in a
//! dedicated `size` crate for the same job), so this is built directly
//! rather than adapted from any one file.

const UNITS: [(char, u64); 5] = [
    ('k', 1024),
    ('m', 1024 * 1024),
    ('g', 1024 * 1024 * 1024),
    ('t', 1024 * 1024 * 1024 * 1024),
    ('p', 1024 * 1024 * 1024 * 1024 * 1024),
];

/// Parses a size argument like `512`, `4k`, `2G`. No suffix means bytes.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty size".to_string());
    }
    let last = trimmed.chars().last().unwrap();
    let suffix = last.to_ascii_lowercase();
    if let Some(&(_, multiplier)) = UNITS.iter().find(|(c, _)| *c == suffix) {
        let digits = &trimmed[..trimmed.len() - last.len_utf8()];
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("invalid size: {input}"))?;
        value
            .checked_mul(multiplier)
            .ok_or_else(|| format!("size overflows: {input}"))
    } else {
        trimmed
            .parse()
            .map_err(|_| format!("invalid size: {input}"))
    }
}

/// Formats `bytes` using the largest suffix that divides it exactly, falling
/// back to a plain byte count. Exact multiples of a unit always round-trip
/// through `parse_size(&format_size(n))`.
pub fn format_size(bytes: u64) -> String {
    for (suffix, multiplier) in UNITS.iter().rev() {
        if bytes != 0 && bytes % multiplier == 0 {
            return format!("{}{}", bytes / multiplier, suffix);
        }
    }
    bytes.to_string()
}
