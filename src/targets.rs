use crate::types::{SegmentId, State};

/// Wire value standing for "the main segment"
pub const MAIN_SEGMENT_SENTINEL: i64 = -1;

/// A caller's idea of which segment to address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentTarget {
    /// Whatever the device currently reports as `mainseg`
    Main,
    Id(SegmentId),
}

impl SegmentTarget {
    /// Interpret a raw id, `-1` meaning the main segment
    ///
    /// Other negative values can never match a segment and yield `None`.
    pub fn from_raw(raw: i64) -> Option<Self> {
        if raw == MAIN_SEGMENT_SENTINEL {
            Some(Self::Main)
        } else {
            SegmentId::try_from(raw).ok().map(Self::Id)
        }
    }
}

impl From<SegmentId> for SegmentTarget {
    fn from(id: SegmentId) -> Self {
        Self::Id(id)
    }
}

/// Resolve requested targets into concrete segment ids against `state`
///
/// An empty request means every segment, in declared order. Otherwise the
/// request is walked in order: `Main` becomes the live main segment id,
/// ids not present in the state are dropped, and only the first occurrence
/// of each id is kept.
///
/// The result is only valid for this `state`; resolve again for every
/// command because segments can change between commands.
pub fn resolve_targets(state: &State, targets: &[SegmentTarget]) -> Vec<SegmentId> {
    if targets.is_empty() {
        return state.segment_ids();
    }

    let existing = state.segment_ids();
    let mut resolved: Vec<SegmentId> = Vec::with_capacity(targets.len());

    for target in targets {
        let id = match *target {
            // mainseg is trusted as reported, even if absent from `seg`
            SegmentTarget::Main => state.main_segment_id,
            SegmentTarget::Id(id) if existing.contains(&id) => id,
            SegmentTarget::Id(_) => continue,
        };

        if !resolved.contains(&id) {
            resolved.push(id);
        }
    }

    resolved
}

/// [`resolve_targets`] for raw ids as used on the wire
pub fn resolve_raw_targets(state: &State, raw: &[i64]) -> Vec<SegmentId> {
    if raw.is_empty() {
        return state.segment_ids();
    }

    let targets: Vec<SegmentTarget> = raw.iter().filter_map(|&r| SegmentTarget::from_raw(r)).collect();
    if targets.is_empty() {
        // Every requested id was invalid
        return Vec::new();
    }
    resolve_targets(state, &targets)
}
