//! Fuzzy resolution of a local channel name against a source's channel names.
//!
//! The cascade is ordered; the first rule producing a candidate wins, and
//! inside a rule the shortest normalized name wins (ties keep input order).

use regex::Regex;

use crate::config::{CompositeRule, MatchingConfig, RegionalRule};
use crate::normalize::NameNormalizer;

#[derive(Debug, Clone)]
pub struct ChannelMatcher {
    normalizer: NameNormalizer,
    family: Option<Regex>,
    high_res_marker: String,
    high_res_channels: Vec<String>,
    containment_slack: usize,
    modifier: String,
    composite: Vec<CompositeRule>,
    regional: Vec<RegionalRule>,
}

/// Candidate prepared for comparison.
struct Candidate<'c> {
    original: &'c str,
    clean: String,
    tag: Option<String>,
    len: usize,
}

impl ChannelMatcher {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            normalizer: NameNormalizer::new(config),
            family: Regex::new(&config.family_pattern).ok(),
            high_res_marker: config.high_res_marker.clone(),
            high_res_channels: config.high_res_channels.clone(),
            containment_slack: config.containment_slack,
            modifier: config.modifier.clone(),
            composite: config.composite.clone(),
            regional: config.regional.clone(),
        }
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Whether a normalized local name denotes a high-resolution variant.
    pub fn is_high_res(&self, local: &str) -> bool {
        self.high_res_channels.iter().any(|m| local.contains(m.as_str()))
            || self.normalizer.is_kept(local)
    }

    /// Pick the candidate that best matches `local` (already normalized).
    pub fn best_match<'c, S: AsRef<str>>(
        &self,
        local: &str,
        candidates: &'c [S],
        clean_candidates: bool,
    ) -> Option<&'c str> {
        if local.is_empty() {
            return None;
        }

        let all: Vec<Candidate<'c>> = candidates
            .iter()
            .map(|c| self.prepare(c.as_ref(), clean_candidates))
            .collect();

        if let Some(hit) = self.match_composite(local, &all) {
            return Some(hit);
        }

        let local_high_res = self.is_high_res(local);
        let pool: Vec<&Candidate<'c>> = all
            .iter()
            .filter(|c| local_high_res || !c.clean.contains(self.high_res_marker.as_str()))
            .collect();

        if let Some(c) = pool.iter().find(|c| c.clean == local) {
            return Some(c.original);
        }

        let local_tag = self.family_tag(local);

        if let Some(tag) = local_tag.as_deref() {
            for rule in &self.regional {
                if rule.tag != tag {
                    continue;
                }
                if let Some(region) = rule.regions.iter().find(|r| local.contains(r.as_str())) {
                    let hit = shortest(pool.iter().copied().filter(|c| {
                        c.tag.as_deref() == Some(tag) && c.clean.contains(region.as_str())
                    }));
                    if hit.is_some() {
                        return hit;
                    }
                }
            }
        }

        for marker in self.high_res_channels.iter().filter(|m| local.contains(m.as_str())) {
            let hit = shortest(pool.iter().copied().filter(|c| c.clean.contains(marker.as_str())));
            if hit.is_some() {
                return hit;
            }
        }

        if let Some(tag) = local_tag.as_deref() {
            let hit = shortest(pool.iter().copied().filter(|c| c.tag.as_deref() == Some(tag)));
            if hit.is_some() {
                return hit;
            }
        }

        let local_len = local.chars().count();
        let hit = shortest(pool.iter().copied().filter(|c| {
            c.clean.contains(local) && c.len <= local_len + self.containment_slack
        }));
        if hit.is_some() {
            return hit;
        }

        if !self.modifier.is_empty() {
            let bare = local.replace(self.modifier.as_str(), "");
            if let Some(c) = pool
                .iter()
                .find(|c| c.clean.replace(self.modifier.as_str(), "") == bare)
            {
                return Some(c.original);
            }
        }

        None
    }

    fn prepare<'c>(&self, original: &'c str, clean_candidates: bool) -> Candidate<'c> {
        let clean = if clean_candidates {
            self.normalizer.normalize(original)
        } else {
            original.trim().replace(' ', "")
        };
        Candidate {
            original,
            tag: self.family_tag(&clean),
            len: clean.chars().count(),
            clean,
        }
    }

    fn family_tag(&self, name: &str) -> Option<String> {
        self.family
            .as_ref()?
            .captures(name)?
            .get(1)
            .map(|m| m.as_str().to_string())
    }

    fn match_composite<'c>(&self, local: &str, all: &[Candidate<'c>]) -> Option<&'c str> {
        for rule in &self.composite {
            if !rule.tokens.iter().all(|t| local.contains(t.as_str())) {
                continue;
            }
            let has_tokens =
                |c: &&Candidate<'c>| rule.tokens.iter().all(|t| c.clean.contains(t.as_str()));
            if let Some(preferred) = &rule.preferred {
                let hit = shortest(
                    all.iter()
                        .filter(has_tokens)
                        .filter(|c| c.clean.contains(preferred.as_str())),
                );
                if hit.is_some() {
                    return hit;
                }
            }
            let hit = shortest(all.iter().filter(has_tokens));
            if hit.is_some() {
                return hit;
            }
        }
        None
    }
}

/// Shortest normalized candidate; the first one wins a length tie.
fn shortest<'a, 'c: 'a>(candidates: impl Iterator<Item = &'a Candidate<'c>>) -> Option<&'c str> {
    let mut best: Option<&Candidate<'c>> = None;
    for c in candidates {
        if best.map_or(true, |b| c.len < b.len) {
            best = Some(c);
        }
    }
    best.map(|c| c.original)
}
