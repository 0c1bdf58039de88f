//! Picks the release artifact that best fits the host.
//!
//! Every asset gets an additive score from independent signals:
//!
//! | signal                     | points |
//! |----------------------------|--------|
//! | OS token in URL            | 4      |
//! | architecture token in URL  | 3      |
//! | downloadable archive suffix| 2      |
//! | no file extension          | 1      |
//!
//! Assets under [`MIN_SCORE`] are discarded. The extension signals alone top
//! out at 3, so an OS match is required to ever clear the threshold. Among
//! the survivors the highest score wins and ties go to the asset listed first.

use crate::error::{KelpError, Result};
use crate::platform::Capabilities;
use crate::types::Asset;

pub const OS_WEIGHT: u32 = 4;
pub const ARCH_WEIGHT: u32 = 3;
pub const ARCHIVE_WEIGHT: u32 = 2;
pub const NO_EXTENSION_WEIGHT: u32 = 1;

pub const MIN_SCORE: u32 = 6;

pub fn score(caps: &Capabilities, asset: &Asset) -> u32 {
    let mut score = 0;
    if asset.matches_os(caps) {
        score += OS_WEIGHT;
    }
    if asset.matches_architecture(caps) {
        score += ARCH_WEIGHT;
    }
    if asset.is_downloadable_archive() {
        score += ARCHIVE_WEIGHT;
    }
    if asset.has_no_extension() {
        score += NO_EXTENSION_WEIGHT;
    }
    score
}

/// Scores that clear the threshold, as `(index, score)` in input order.
pub fn candidates(caps: &Capabilities, assets: &[Asset]) -> Vec<(usize, u32)> {
    assets
        .iter()
        .enumerate()
        .filter_map(|(index, asset)| {
            let score = score(caps, asset);
            tracing::trace!("Asset '{}' scored {}", asset.name, score);
            (score >= MIN_SCORE).then_some((index, score))
        })
        .collect()
}

/// Selects the best asset of `release` for the host.
///
/// Fails with [`KelpError::NoSuitableAsset`] naming `release` when nothing
/// reaches [`MIN_SCORE`].
pub fn select_asset<'a>(caps: &Capabilities, release: &str, assets: &'a [Asset]) -> Result<&'a Asset> {
    tracing::info!("Finding assets to download...");

    let mut best: Option<(usize, u32)> = None;
    for (index, score) in candidates(caps, assets) {
        tracing::info!(
            "Found suitable candidate {} for download. Score: {}",
            assets[index].name,
            score
        );
        // strictly greater keeps the first of equal scores
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((index, score));
        }
    }

    let (index, _) = best.ok_or_else(|| KelpError::NoSuitableAsset {
        release: release.to_string(),
    })?;
    let asset = &assets[index];
    tracing::info!("Adding highest ranked asset {} to download queue", asset.name);
    Ok(asset)
}
