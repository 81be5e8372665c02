use std::collections::HashSet;

use crate::model::{IdentityOrigin, ReconResult, ReconSummary};

/// Compute summary statistics from a finished run.
///
/// `rejected_programs` is left at zero; only the engine knows it.
pub fn compute_summary(result: &ReconResult, unknown_title: &str) -> ReconSummary {
    let mut linked_channels = 0;
    let mut external_channels = 0;
    for identity in &result.identities {
        match identity.origin {
            IdentityOrigin::Local => linked_channels += 1,
            IdentityOrigin::External => external_channels += 1,
            IdentityOrigin::Temporary => {}
        }
    }

    let official_channels = result.channels.iter().filter(|c| c.official).count();

    let lite_titled_programs = result
        .programs
        .iter()
        .filter(|p| p.title != unknown_title)
        .count();

    let consulted: HashSet<&str> = result.sources.iter().map(|s| s.name.as_str()).collect();

    ReconSummary {
        lineup_channels: result.channels.len(),
        linked_channels,
        official_channels,
        external_matches: result.sources.iter().map(|s| s.channels_matched).sum(),
        unmatched: result.unmatched.len(),
        lite_programs: result.programs.len(),
        lite_titled_programs,
        external_channels,
        full_programs: result.full_programs.len(),
        sources_consulted: consulted.len(),
        sources_failed: result.sources.iter().filter(|s| s.failure.is_some()).count(),
        rejected_programs: 0,
    }
}
