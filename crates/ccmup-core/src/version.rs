use std::cmp::Ordering;
use std::fmt;

/// A release tag together with whatever version information could be read from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion {
    tag: String,
    parts: Option<Vec<u64>>,
}

impl ReleaseVersion {
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        let bare = strip_v_prefix(tag);
        Self {
            tag: tag.to_string(),
            parts: numeric_parts(bare),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Version text without the conventional leading `v`.
    pub fn version(&self) -> &str {
        strip_v_prefix(&self.tag)
    }

    pub fn is_comparable(&self) -> bool {
        self.parts.is_some()
    }

    /// Orders by numeric dot segments, shorter versions zero-padded. Pre-release suffixes
    /// are ignored, so `1.2.3-rc1` and `1.2.3` compare equal.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let (left, right) = (self.parts.as_ref()?, other.parts.as_ref()?);
        let width = left.len().max(right.len());
        let pad = |parts: &[u64]| {
            let mut padded = parts.to_vec();
            padded.resize(width, 0);
            padded
        };
        Some(pad(left).cmp(&pad(right)))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

fn strip_v_prefix(value: &str) -> &str {
    match value.strip_prefix('v') {
        Some(rest) if !rest.is_empty() => rest,
        _ => value,
    }
}

// Leading numeric dot segments; "0.5.6-rc1" reads as [0, 5, 6].
fn numeric_parts(value: &str) -> Option<Vec<u64>> {
    let mut parts = Vec::new();
    for segment in value.split('.') {
        let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            break;
        }
        parts.push(digits.parse().ok()?);
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

pub fn compare_versions(left: &str, right: &str) -> Option<Ordering> {
    ReleaseVersion::parse(left).compare(&ReleaseVersion::parse(right))
}

/// `Some(true)` when `remote` is strictly newer, `None` when either side is unreadable.
pub fn is_version_newer(remote: &str, local: &str) -> Option<bool> {
    compare_versions(remote, local).map(|ordering| ordering == Ordering::Greater)
}
