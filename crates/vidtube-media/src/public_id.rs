use crate::store::ResourceKind;

/// Asset identity recovered from a stored delivery URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub public_id: String,
    /// `None` when the kind segment isn't one the provider defines.
    pub kind: Option<ResourceKind>,
}

/// Derive the provider public id from a delivery URL.
///
/// Expected shape:
///
/// ```text
/// https://res.cloudinary.com/<cloud>/<kind>/<delivery>/v<version>/<folder…>/<name>.<ext>
/// ```
///
/// The public id is `<folder…>/<name>`: the version segment is skipped and
/// everything from the first `.` of the file name is dropped. Query strings
/// and fragments are ignored. Returns `None` unless the URL has the fixed
/// seven-segment prefix (up to and including `v<version>`) followed by a
/// non-empty file name.
///
/// This relies on the provider's URL layout and breaks if that changes or if
/// a transformation segment is embedded in the URL.
pub fn asset_ref_from_url(url: &str) -> Option<AssetRef> {
    let url = url.split(['?', '#']).next()?;
    let segments: Vec<&str> = url.split('/').collect();

    // scheme:, "", host, cloud, kind, delivery, version
    const PREFIX: usize = 7;
    if segments.len() <= PREFIX || !is_version(segments[PREFIX - 1]) {
        return None;
    }

    let kind = ResourceKind::parse(segments[4]);
    let (file_name, folders) = segments[PREFIX..].split_last()?;
    let stem = file_name.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        return None;
    }

    let mut parts: Vec<&str> = folders.iter().copied().filter(|s| !s.is_empty()).collect();
    parts.push(stem);

    Some(AssetRef {
        public_id: parts.join("/"),
        kind,
    })
}

fn is_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
