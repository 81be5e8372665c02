//! Assembly of the published guides from a finished run.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::{IdentityOrigin, ProgramEntry, ReconResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideKind {
    /// Lineup channels only.
    Lite,
    /// Lineup channels plus every external channel that was kept.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingChannel {
    pub id: String,
    /// Display names, primary first.
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Listing {
    pub channels: Vec<ListingChannel>,
    pub programmes: Vec<ProgramEntry>,
}

/// Build a guide. Programmes are sorted by (channel, start); exact
/// (channel, start, title) repeats and incomplete entries are dropped.
pub fn build_listing(result: &ReconResult, kind: GuideKind) -> Listing {
    let channels = result
        .identities
        .iter()
        .filter(|i| kind == GuideKind::Full || i.origin != IdentityOrigin::External)
        .map(|i| {
            let mut names = vec![i.display_name.clone()];
            names.extend(i.aliases.iter().filter(|a| **a != i.display_name).cloned());
            ListingChannel {
                id: i.output_id.clone(),
                names,
            }
        })
        .collect();

    let source = match kind {
        GuideKind::Lite => &result.programs,
        GuideKind::Full => &result.full_programs,
    };
    let mut programmes: Vec<ProgramEntry> = source
        .iter()
        .filter(|p| !p.channel.is_empty() && !p.start.is_empty() && !p.title.is_empty())
        .cloned()
        .collect();
    programmes.sort_by(|a, b| (&a.channel, &a.start).cmp(&(&b.channel, &b.start)));

    let mut seen = HashSet::new();
    programmes.retain(|p| seen.insert((p.channel.clone(), p.start.clone(), p.title.clone())));

    Listing {
        channels,
        programmes,
    }
}
