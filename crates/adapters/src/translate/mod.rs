//! Translation adapters
//!
//! - `deepl`: DeepL REST API
//! - `proxy`: the `/api/translate` proxy served by `connectum serve`
//! - `mock`: labelled stand-in used when no credentials are configured

pub mod deepl;
pub mod mock;
pub mod proxy;

pub use deepl::DeepLTranslator;
pub use mock::MockTranslator;
pub use proxy::ProxyTranslator;

/// Free-tier DeepL endpoint
pub const DEFAULT_DEEPL_URL: &str = "https://api-free.deepl.com";

/// Target language used when a request names none
pub const DEFAULT_TARGET_LANG: &str = "EN";

/// Upper-cased target code, `EN` when blank
pub fn normalize_target(target_lang: &str) -> String {
    let target = target_lang.trim();
    if target.is_empty() {
        DEFAULT_TARGET_LANG.to_string()
    } else {
        target.to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_uppercased_with_default() {
        assert_eq!(normalize_target("de"), "DE");
        assert_eq!(normalize_target("  "), "EN");
    }
}
