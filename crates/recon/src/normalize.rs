//! Channel-name canonicalization.
//!
//! Provider names differ in spacing, dashes and trailing quality tags
//! (`CCTV-1 HD`, `CCTV1超清`, `CCTV 1(HDR)`). Normalized names compare equal
//! when they refer to the same channel in the common case.

use std::collections::HashSet;

use regex::Regex;

use crate::config::MatchingConfig;

#[derive(Debug, Clone)]
pub struct NameNormalizer {
    keep_as_is: HashSet<String>,
    protected_markers: Vec<String>,
    high_res_marker: String,
    /// `None` when no quality suffixes are configured.
    suffix: Option<Regex>,
}

impl NameNormalizer {
    pub fn new(config: &MatchingConfig) -> Self {
        let tokens: Vec<String> = config
            .quality_suffixes
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| regex::escape(t))
            .collect();
        let suffix = if tokens.is_empty() {
            None
        } else {
            let pattern = format!(r"(?i)(\s*[-_()]?\s*({}))+$", tokens.join("|"));
            Regex::new(&pattern).ok()
        };

        Self {
            keep_as_is: config.keep_as_is.iter().cloned().collect(),
            protected_markers: config.protected_markers.clone(),
            high_res_marker: config.high_res_marker.clone(),
            suffix,
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        if raw.contains(self.high_res_marker.as_str())
            && self.protected_markers.iter().any(|m| raw.contains(m.as_str()))
        {
            return strip_separators(raw);
        }

        if self.keep_as_is.contains(raw) {
            return raw.to_string();
        }

        let compact = strip_separators(raw);
        let trimmed = match &self.suffix {
            Some(re) => re.replace(&compact, "").into_owned(),
            None => compact,
        };
        trimmed.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Whether `name` is on the keep-as-is list.
    pub fn is_kept(&self, name: &str) -> bool {
        self.keep_as_is.contains(name)
    }
}

fn strip_separators(raw: &str) -> String {
    raw.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> NameNormalizer {
        NameNormalizer::new(&MatchingConfig::default())
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(normalizer().normalize(""), "");
    }

    #[test]
    fn strips_dashes_and_spaces() {
        assert_eq!(normalizer().normalize("CCTV-1 综合"), "CCTV1综合");
    }

    #[test]
    fn strips_trailing_quality_run() {
        let n = normalizer();
        assert_eq!(n.normalize("CCTV1 HDR"), "CCTV1");
        assert_eq!(n.normalize("北京卫视超清"), "北京卫视");
        assert_eq!(n.normalize("CCTV5(4K"), "CCTV5");
        // a closing parenthesis is not a separator
        assert_eq!(n.normalize("CCTV5(HDR)"), "CCTV5(HDR)");
        assert_eq!(n.normalize("CCTV5_4k"), "CCTV5");
        assert_eq!(n.normalize("CCTV5 4K SDR"), "CCTV5");
    }

    #[test]
    fn quality_token_not_at_end_is_kept() {
        assert_eq!(normalizer().normalize("HDR纪实"), "HDR纪实");
    }

    #[test]
    fn keep_as_is_names_untouched() {
        assert_eq!(normalizer().normalize("CCTV4k"), "CCTV4k");
    }

    #[test]
    fn protected_4k_names_keep_suffix() {
        let n = normalizer();
        assert_eq!(n.normalize("CCTV4K"), "CCTV4K");
        assert_eq!(n.normalize("CCTV-4K 超高清"), "CCTV4K超高清");
        assert_eq!(n.normalize("爱上4K 超清"), "爱上4K超清");
    }

    #[test]
    fn no_suffixes_configured() {
        let mut config = MatchingConfig::default();
        config.quality_suffixes.clear();
        let n = NameNormalizer::new(&config);
        assert_eq!(n.normalize("CCTV1 HDR"), "CCTV1HDR");
    }

    #[test]
    fn idempotent_on_samples() {
        let n = normalizer();
        for raw in ["CCTV-5+ 体育赛事 HDR", "CGTN 纪录", "CCTV4K", "东方卫视(超清)", "x 4K_HDR"] {
            let once = n.normalize(raw);
            assert_eq!(n.normalize(&once), once, "not idempotent for {raw:?}");
        }
    }
}
