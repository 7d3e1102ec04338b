use isolang::Language;

/// Language utilities for prompt construction
///
/// The pipeline accepts either language names ("Chinese") or ISO 639-1 /
/// ISO 639-3 codes ("zh", "zho"). Prompts always use English names.
/// "auto" marks a source language left for the model to identify.
const AUTO: &str = "auto";

/// Whether the language is the auto-detect marker
pub fn is_auto(language: &str) -> bool {
    language.trim().eq_ignore_ascii_case(AUTO)
}

/// Look up an ISO 639-1 or ISO 639-3 code
fn from_code(code: &str) -> Option<Language> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 => Language::from_639_1(&normalized_code),
        3 => Language::from_639_3(&normalized_code).or_else(|| {
            // ISO 639-2/B codes that differ from 639-2/T
            let part2t = match normalized_code.as_str() {
                "fre" => "fra",
                "ger" => "deu",
                "dut" => "nld",
                "gre" => "ell",
                "chi" => "zho",
                "cze" => "ces",
                "per" => "fas",
                "rum" => "ron",
                "slo" => "slk",
                _ => return None,
            };
            Language::from_639_3(part2t)
        }),
        _ => None,
    }
}

/// Resolve a language code or name to the English name used in prompts
///
/// Codes are resolved through ISO tables; anything else is assumed to already
/// be a language name and is returned trimmed. "auto" is kept as is.
pub fn display_name(language: &str) -> String {
    if is_auto(language) {
        return AUTO.to_string();
    }

    match from_code(language) {
        Some(lang) => lang.to_name().to_string(),
        None => language.trim().to_string(),
    }
}

/// Whether source and target resolve to the same language
///
/// An auto-detected source never matches, since its language is unknown
/// until the model sees the text.
pub fn same_language(source: &str, target: &str) -> bool {
    if is_auto(source) || is_auto(target) {
        return false;
    }
    display_name(source).eq_ignore_ascii_case(&display_name(target))
}

/// Whether the target language writes decimals with a comma
///
/// Only Russian is special-cased; names, codes and the Chinese name are
/// accepted.
pub fn uses_decimal_comma(target: &str) -> bool {
    let lowered = target.trim().to_lowercase();
    lowered == "ru" || lowered == "rus" || lowered.contains("russian") || lowered.contains("俄语")
}
