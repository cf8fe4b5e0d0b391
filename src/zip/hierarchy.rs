//! Presents the flat central directory as one directory level at a time.

use std::collections::HashSet;

use super::structures::ArchiveEntry;

/// List the direct children of `path` (`""` for the archive root).
///
/// Archives often omit explicit directory entries; any intermediate
/// directory implied by a deeper path is synthesized once. Directories sort
/// before files, then names compare case-insensitively.
pub fn entries_at_path(path: &str, entries: &[ArchiveEntry]) -> Vec<ArchiveEntry> {
    let prefix = if path.is_empty() || path.ends_with('/') {
        path.to_owned()
    } else {
        format!("{path}/")
    };

    let existing: HashSet<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    let mut synthesized = HashSet::new();
    let mut children = Vec::new();

    for entry in entries {
        let Some(rest) = entry.path.strip_prefix(prefix.as_str()) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }

        let mut components = rest.split('/');
        let first = components.next().unwrap_or_default();
        let is_direct_child = match (components.next(), components.next()) {
            (None, _) => true,
            (Some(""), None) => true,
            _ => false,
        };

        if is_direct_child {
            children.push(entry.clone());
            continue;
        }
        if first.is_empty() {
            continue;
        }

        let dir_path = format!("{prefix}{first}/");
        if !existing.contains(dir_path.as_str()) && synthesized.insert(dir_path.clone()) {
            children.push(ArchiveEntry::synthetic_directory(dir_path));
        }
    }

    children.sort_by_cached_key(|e| (!e.is_directory, e.name.to_lowercase(), e.name.clone()));
    children
}
