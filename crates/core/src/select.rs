use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::catalog::Catalog;

// One path uniformly at random from the catalog's current key set. The
// selection phases draw and remove repeatedly rather than shuffling up
// front, so the sequence of draws is reproducible from a seed.
fn draw_path(catalog: &Catalog, rng: &mut StdRng) -> Option<PathBuf> {
    if catalog.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..catalog.len());
    catalog.keys().nth(index).cloned()
}

/// Phase A: set aside up to `keep_count` random destination units.
///
/// Kept units are protected from deletion; they are never written back to
/// disk. A kept path that also exists in the source loses its source copy —
/// the destination already holds it, so it must not be re-selected. A kept
/// path absent from the source is simply protected on the destination side.
pub fn keep_media(
    src: &mut Catalog,
    dst: &mut Catalog,
    keep_count: usize,
    rng: &mut StdRng,
) -> Catalog {
    let mut kept = Catalog::new();
    while kept.len() < keep_count && !dst.is_empty() {
        let Some(chosen) = draw_path(dst, rng) else {
            break;
        };
        if let Some(unit) = dst.remove(&chosen) {
            kept.insert(unit);
        }
        src.remove(&chosen);
    }
    debug!(
        "kept {} of {} requested unit(s), {} byte(s)",
        kept.len(),
        keep_count,
        kept.total_size()
    );
    kept
}

/// Phase B: randomly fill a selection until it reaches `target_bytes`.
///
/// Greedy fill: completing the fill wins over never exceeding the nominal
/// budget, so the final draw may overshoot by its own size.
pub fn select_media(src: &mut Catalog, target_bytes: u64, rng: &mut StdRng) -> Catalog {
    let mut selected = Catalog::new();
    while selected.total_size() < target_bytes && !src.is_empty() {
        let Some(chosen) = draw_path(src, rng) else {
            break;
        };
        if let Some(unit) = src.remove(&chosen) {
            selected.insert(unit);
        }
    }
    debug!(
        "selected {} unit(s), {} byte(s) against a budget of {}",
        selected.len(),
        selected.total_size(),
        target_bytes
    );
    selected
}
