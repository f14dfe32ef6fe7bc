//! Registry path canonicalization.
//!
//! Operator-entered paths arrive in several spellings (`HKLM:\...`,
//! `HKLM\...`, `HKEY_LOCAL_MACHINE\...`, `Registry::HKEY_...\...`, forward
//! slashes). Storage and comparison use the regedit-style form
//! `HKEY_LOCAL_MACHINE\SOFTWARE\Vendor\Key`; probe scripts use the
//! PowerShell provider form `Registry::HKEY_...`.

const HIVE_ALIASES: &[(&str, &str)] = &[
    ("HKLM", "HKEY_LOCAL_MACHINE"),
    ("HKEY_LOCAL_MACHINE", "HKEY_LOCAL_MACHINE"),
    ("HKCU", "HKEY_CURRENT_USER"),
    ("HKEY_CURRENT_USER", "HKEY_CURRENT_USER"),
    ("HKCR", "HKEY_CLASSES_ROOT"),
    ("HKEY_CLASSES_ROOT", "HKEY_CLASSES_ROOT"),
    ("HKU", "HKEY_USERS"),
    ("HKEY_USERS", "HKEY_USERS"),
    ("HKCC", "HKEY_CURRENT_CONFIG"),
    ("HKEY_CURRENT_CONFIG", "HKEY_CURRENT_CONFIG"),
];

/// Finds a hive alias at the start of `s`. The alias must be followed by
/// `:`/`\` or the end of the string so `HKUnrelated` never matches `HKU`.
fn canonical_hive(s: &str) -> Option<(usize, &'static str)> {
    let bytes = s.as_bytes();
    for (alias, canonical) in HIVE_ALIASES {
        let n = alias.len();
        if bytes.len() < n || !bytes[..n].eq_ignore_ascii_case(alias.as_bytes()) {
            continue;
        }
        match bytes.get(n) {
            None | Some(b':') | Some(b'\\') => return Some((n, canonical)),
            _ => {}
        }
    }
    None
}

/// Drops the provider-drive colon in `HKLM:\...` spellings.
fn drop_hive_colon(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
        i += 1;
    }
    if i > 0 && i + 1 < bytes.len() && bytes[i] == b':' && bytes[i + 1] == b'\\' {
        format!("{}{}", &s[..i], &s[i + 1..])
    } else {
        s.to_string()
    }
}

/// Normalizes a user-supplied registry path into the canonical regedit-style
/// storage form. Unknown hives pass through untouched.
pub fn normalize_registry_path(input: &str) -> String {
    let mut s = input.trim().to_string();
    if s.is_empty() {
        return s;
    }

    // Strip PowerShell provider prefix if present
    const PROVIDER: &str = "Registry::";
    if s.len() >= PROVIDER.len()
        && s.as_bytes()[..PROVIDER.len()].eq_ignore_ascii_case(PROVIDER.as_bytes())
    {
        s = s[PROVIDER.len()..].trim().to_string();
    }

    s = s.replace('/', "\\");

    let mut collapsed = String::with_capacity(s.len());
    let mut prev_backslash = false;
    for c in s.chars() {
        if c == '\\' {
            if !prev_backslash {
                collapsed.push(c);
            }
            prev_backslash = true;
        } else {
            collapsed.push(c);
            prev_backslash = false;
        }
    }
    s = drop_hive_colon(&collapsed);

    if let Some((n, canonical)) = canonical_hive(&s) {
        s = format!("{}{}", canonical, &s[n..]);
    }

    while s.ends_with('\\') {
        s.pop();
    }
    s
}

/// Converts a stored or user-supplied path into the PowerShell registry
/// provider form consumed by probe scripts.
pub fn to_powershell_registry_path(path: &str) -> String {
    let stored = normalize_registry_path(path);
    if stored.is_empty() {
        return stored;
    }
    format!("Registry::{}", stored)
}

pub fn normalize_value_name(input: Option<&str>) -> Option<String> {
    let s = input.unwrap_or("").trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// In PowerShell single-quoted strings, `''` escapes a literal `'`.
pub fn escape_ps_single_quoted(value: &str) -> String {
    value.replace('\'', "''")
}
