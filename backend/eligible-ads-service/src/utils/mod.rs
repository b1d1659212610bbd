// Segment hierarchy and time helpers for eligible-ads-service

use crate::models::Segment;
use chrono::{DateTime, Utc};

const SEGMENT_SEPARATOR: char = '-';

/// Parent of a `parent-child` segment; flat segments are their own parent.
pub fn parent_of(segment: &str) -> Segment {
    match segment.split_once(SEGMENT_SEPARATOR) {
        Some((parent, _)) => parent.to_string(),
        None => segment.to_string(),
    }
}

/// Parents of every segment, in input order, duplicates kept.
pub fn parents_of(segments: &[Segment]) -> Vec<Segment> {
    segments.iter().map(|segment| parent_of(segment)).collect()
}

/// True when the two lists share at least one segment.
pub fn matches_any(a: &[Segment], b: &[Segment]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }

    let mut lhs: Vec<&str> = a.iter().map(String::as_str).collect();
    let mut rhs: Vec<&str> = b.iter().map(String::as_str).collect();
    lhs.sort_unstable();
    rhs.sort_unstable();

    // Sorted merge walk, stops at the first common element
    let (mut i, mut j) = (0, 0);
    while i < lhs.len() && j < rhs.len() {
        match lhs[i].cmp(rhs[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }

    false
}

/// Whole hours elapsed since `timestamp`, clamped at zero for future timestamps.
pub fn hours_since(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let hours = (now - timestamp).num_hours();
    hours.clamp(0, u32::MAX as i64) as u32
}
