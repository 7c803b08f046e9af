//! RDR (realtime data retrieval) discovery name conventions.
//!
//! A file's discovery name is `<prefix>/<path>/32=metadata`; a directory
//! listing's is `<prefix>/<path>/32=ls/32=metadata`. Both resolve, via one
//! round of Interest/Data, to a [`crate::metadata::FileMetadata`] whose
//! `versioned_name` is then used to fetch content segments.

use crate::name::{Name, NameComponent};

/// Default name prefix for the file-transfer application, matching the CLI
/// default.
pub const DEFAULT_NAME_PREFIX: &str = "/ndn/ft";

/// `<prefix>/<path>/32=metadata`
pub fn rdr_discovery_name_file(prefix: &Name, path: &Name) -> Name {
    let mut name = prefix.clone();
    for c in path.components() {
        name.push_mut(c.clone());
    }
    name.push(NameComponent::keyword("metadata"))
}

/// `<prefix>/<path>/32=ls/32=metadata`
pub fn rdr_discovery_name_dir(prefix: &Name, path: &Name) -> Name {
    let mut name = prefix.clone();
    for c in path.components() {
        name.push_mut(c.clone());
    }
    name.push(NameComponent::keyword("ls"))
        .push(NameComponent::keyword("metadata"))
}

/// True when `name`'s last component is the `32=metadata` marker and it
/// isn't itself a segment (i.e. it's a discovery name, not content).
pub fn is_rdr_discovery_name(name: &Name) -> bool {
    match name.last() {
        Some(c) => c.is_metadata_marker(),
        None => false,
    }
}

/// True when `name` is a directory-listing discovery name
/// (`.../32=ls/32=metadata`).
pub fn is_rdr_dir_listing_name(name: &Name) -> bool {
    if name.len() < 2 {
        return false;
    }
    let last = name.get(name.len() - 1);
    let second_last = name.get(name.len() - 2);
    matches!(last, Some(c) if c.is_metadata_marker()) && matches!(second_last, Some(c) if c.is_ls_marker())
}

/// Strips the trailing `32=metadata` marker and, for a dir-listing name, the
/// `32=ls` marker before it too, then strips `prefix` to recover the
/// application-relative file/dir path.
pub fn rdr_file_path(name: &Name, prefix: &Name) -> Name {
    let drop = if is_rdr_dir_listing_name(name) { 2 } else { 1 };
    name.prefix_drop_last(drop).sub_name(prefix.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_discovery_name() {
        let prefix = Name::from_path(DEFAULT_NAME_PREFIX);
        let path = Name::from_path("dataset.bin");
        let name = rdr_discovery_name_file(&prefix, &path);
        assert_eq!(name.to_string(), "/ndn/ft/dataset.bin/32=metadata");
        assert!(is_rdr_discovery_name(&name));
        assert!(!is_rdr_dir_listing_name(&name));
        assert_eq!(rdr_file_path(&name, &prefix).to_string(), "/dataset.bin");
    }

    #[test]
    fn dir_discovery_name() {
        let prefix = Name::from_path(DEFAULT_NAME_PREFIX);
        let path = Name::from_path("subdir");
        let name = rdr_discovery_name_dir(&prefix, &path);
        assert_eq!(name.to_string(), "/ndn/ft/subdir/32=ls/32=metadata");
        assert!(is_rdr_discovery_name(&name));
        assert!(is_rdr_dir_listing_name(&name));
        assert_eq!(rdr_file_path(&name, &prefix).to_string(), "/subdir");
    }

    #[test]
    fn content_name_is_not_discovery_name() {
        let prefix = Name::from_path(DEFAULT_NAME_PREFIX);
        let name = Name::from_path("dataset.bin")
            .push(NameComponent::Version(1))
            .push(NameComponent::Segment(0));
        assert!(!is_rdr_discovery_name(&name));
        let _ = prefix;
    }
}
