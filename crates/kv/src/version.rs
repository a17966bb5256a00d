//! Version records and the total order used to pick a winner.

use shardmap_common::Member;
use shardmap_storage::VData;
use std::cmp::Ordering;

/// A snapshot of a key's value as observed on one host.
///
/// `data == None` means the host responded but does not hold the key. That
/// is not a tombstone: the version still counts toward the read quorum, it
/// just cannot win.
#[derive(Debug, Clone)]
pub struct Version {
    /// The node this version was read from, for repair routing.
    pub host: Member,
    pub data: Option<VData>,
}

impl Version {
    /// A version recording that `host` answered without data.
    pub fn absent(host: Member) -> Self {
        Self { host, data: None }
    }

    pub fn with_data(host: Member, data: VData) -> Self {
        Self {
            host,
            data: Some(data),
        }
    }
}

/// Compare two data-bearing versions so that the winner sorts first.
///
/// Higher timestamps win. Equal timestamps fall back to lexicographic
/// comparison of the raw value bytes, larger-or-equal first. The
/// tie-breaker carries no meaning beyond giving every node the same
/// answer without coordination.
pub fn compare_versions(a: &VData, b: &VData) -> Ordering {
    if a.timestamp != b.timestamp {
        return b.timestamp.cmp(&a.timestamp);
    }
    b.value.cmp(&a.value)
}

/// Sort versions into winner-first order. Versions without data sort last.
pub fn sort_versions(versions: &mut [Version]) {
    versions.sort_by(|a, b| match (&a.data, &b.data) {
        (Some(a), Some(b)) => compare_versions(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Drop versions without data, then sort the survivors winner-first.
///
/// The input is left untouched: the caller still needs the full response
/// set for read repair.
pub fn sanitize_and_sort(versions: &[Version]) -> Vec<Version> {
    let mut sanitized: Vec<Version> = versions
        .iter()
        .filter(|ver| ver.data.is_some())
        .cloned()
        .collect();
    if sanitized.len() > 1 {
        sort_versions(&mut sanitized);
    }
    sanitized
}
