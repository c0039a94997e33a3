//! Inline `style` translation from CSS properties to renderer font attributes.

/// CSS property → renderer attribute.
const STYLE_TRANSLATIONS: [(&str, &str); 6] = [
    ("font-weight", "bold"),
    ("font-style", "italic"),
    ("text-decoration", "underline"),
    ("font-size", "size"),
    ("font-family", "face"),
    ("text-align", "alignment"),
];

/// Attributes the document renderer understands.
pub const SUPPORTED_STYLE_KEYS: [&str; 6] = ["bold", "italic", "underline", "size", "face", "alignment"];

/// Split `key: value; key: value` into trimmed pairs with lowercased keys.
/// Declarations without a colon or with an empty side are skipped.
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            (!key.is_empty() && !value.is_empty()).then(|| (key, value.to_string()))
        })
        .collect()
}

/// Translate a CSS `style` value into the renderer's attribute names.
///
/// Keys outside [`SUPPORTED_STYLE_KEYS`] after translation are dropped.
/// Returns `None` when nothing survives.
pub fn translate_style(style: &str) -> Option<String> {
    let kept: Vec<String> = parse_style(style)
        .into_iter()
        .filter_map(|(key, value)| {
            let mapped = STYLE_TRANSLATIONS
                .iter()
                .find(|(css, _)| *css == key)
                .map(|(_, renderer)| *renderer)
                .unwrap_or(key.as_str());
            SUPPORTED_STYLE_KEYS
                .contains(&mapped)
                .then(|| format!("{mapped}: {value}"))
        })
        .collect();

    (!kept.is_empty()).then(|| kept.join("; "))
}
