//! Location handling for the fixed three-location topology.
//!
//! Index 0 is the primary location, 1 the secondary and 2 the tertiary. Cloud
//! APIs and user input spell locations differently (`"Central US"` versus
//! `"centralus"`), so comparisons always go through a normalizer.

pub const LOCATION_COUNT: usize = 3;

pub type Locations = [String; LOCATION_COUNT];
pub type LocationCounts = [u32; LOCATION_COUNT];

const LOCATION_NAMES: [&str; LOCATION_COUNT] = ["primary", "secondary", "tertiary"];

/// Lowercases and strips all whitespace.
pub fn normalize_location(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Human readable role of a location index, used in logs and error context.
pub fn location_name(index: usize) -> &'static str {
    LOCATION_NAMES.get(index).copied().unwrap_or("unknown")
}

/// Picks the single location to seed when single mode has no live signal yet.
///
/// The location with the largest baseline wins. Only a strictly larger value
/// moves the selection, so ties go to the lowest index.
pub fn distribute_single_instance(baseline: &LocationCounts) -> LocationCounts {
    let mut max_idx = 0;
    for (idx, count) in baseline.iter().enumerate().skip(1) {
        if *count > baseline[max_idx] {
            max_idx = idx;
        }
    }

    let mut counts = [0; LOCATION_COUNT];
    counts[max_idx] = 1;
    counts
}

/// Marks every observed location matching `target` after normalization.
///
/// An empty `target` means no location signal exists at all and the primary
/// location is assumed.
pub fn count_instances_at_normalized_location<S, F>(
    observed: &[S; LOCATION_COUNT],
    target: &str,
    normalize: F,
) -> LocationCounts
where
    S: AsRef<str>,
    F: Fn(&str) -> String,
{
    if target.is_empty() {
        return [1, 0, 0];
    }

    let target = normalize(target);
    let mut counts = [0; LOCATION_COUNT];
    for (count, location) in counts.iter_mut().zip(observed) {
        if normalize(location.as_ref()) == target {
            *count = 1;
        }
    }
    counts
}
