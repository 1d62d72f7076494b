//! Native character set detection from the locale environment.

const LOCALE_VARS: [&str; 3] = ["LC_ALL", "LC_CTYPE", "LANG"];

/// Work out the native character set.
///
/// An explicit `hint` wins. Otherwise the first non-empty locale variable
/// decides. Returns `None` when nothing usable is found; callers keep their
/// default in that case.
pub fn detect_native_charset(hint: Option<&str>) -> Option<String> {
    detect_native_charset_with(hint, |name| std::env::var(name).ok())
}

pub fn detect_native_charset_with(
    hint: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(hint) = hint {
        return normalize_charset(hint);
    }
    let locale = LOCALE_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|v| !v.trim().is_empty())?;
    charset_from_locale(locale.trim())
}

/// `language[_territory][.codeset][@modifier]`
fn charset_from_locale(locale: &str) -> Option<String> {
    if locale == "C" || locale == "POSIX" {
        return Some("us-ascii".to_string());
    }
    let (_, rest) = locale.split_once('.')?;
    let codeset = rest.split('@').next().unwrap_or(rest);
    normalize_charset(codeset)
}

pub fn normalize_charset(name: &str) -> Option<String> {
    let lowered = name.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let canonical = match lowered.as_str() {
        "utf8" | "utf-8" => "utf-8".to_string(),
        "646" | "ascii" | "us-ascii" | "ansi_x3.4-1968" => "us-ascii".to_string(),
        "latin1" | "latin-1" => "iso-8859-1".to_string(),
        other => match iso8859_part(other) {
            Some(part) => format!("iso-8859-{part}"),
            None => other.to_string(),
        },
    };
    Some(canonical)
}

/// The part number of any `iso8859-N` spelling (`iso88591`, `iso_8859-1`, ...).
fn iso8859_part(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("iso")?;
    let rest = rest.trim_start_matches(['-', '_']);
    let rest = rest.strip_prefix("8859")?;
    let part = rest.trim_start_matches(['-', '_']);
    if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
        Some(part)
    } else {
        None
    }
}
