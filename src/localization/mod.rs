//! Information density of UI languages
//!
//! Denser languages fit the same message into fewer characters, so UI code
//! can scale text containers by this factor. English is the 1.0 baseline.

/// Density relative to English, keyed by ISO 639-1 code
const DENSITIES: &[(&str, f64)] = &[
    ("en", 1.0),
    ("de", 0.86),
    ("fr", 0.88),
    ("es", 0.9),
    ("it", 0.9),
    ("pt", 0.9),
    ("nl", 0.89),
    ("ru", 0.92),
    ("tr", 0.95),
    ("vi", 0.85),
    ("ko", 1.9),
    ("ja", 2.1),
    ("zh", 2.6),
];

/// Density for a locale identifier like `de`, `pt_BR`, `zh-Hant` or `en_US.UTF-8`.
/// Unknown languages count as English.
pub fn information_density_of(locale: &str) -> f64 {
    let language = locale
        .split(['_', '-', '.', '@'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    DENSITIES
        .iter()
        .find(|(code, _)| *code == language)
        .map_or(1.0, |(_, density)| *density)
}

/// Density of the language the process is running in, from the POSIX locale
/// variables in priority order.
pub fn information_density_of_current_language() -> f64 {
    let locale = ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
        .unwrap_or_else(|| "en".to_string());

    information_density_of(&locale)
}
