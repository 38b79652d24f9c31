//! Loading of `include` and `include_live` files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::ast::Node;

/// Deepest chain of nested includes followed, parse-time or live.
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Resolves an include path against the configured root.
pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub fn modified(path: &Path) -> std::io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

struct CachedInclude {
    modified: SystemTime,
    body: Arc<Node>,
}

/// Parsed `include_live` bodies keyed by file path. An entry is reused while
/// the file's modification time is unchanged.
#[derive(Default)]
pub struct IncludeCache {
    entries: RwLock<FxHashMap<PathBuf, CachedInclude>>,
}

impl IncludeCache {
    pub fn get(&self, path: &Path, modified: SystemTime) -> Option<Arc<Node>> {
        self.entries
            .read()
            .get(path)
            .filter(|cached| cached.modified == modified)
            .map(|cached| cached.body.clone())
    }

    pub fn insert(&self, path: PathBuf, modified: SystemTime, body: Arc<Node>) {
        self.entries.write().insert(path, CachedInclude { modified, body });
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        tracing::debug!(entries = entries.len(), "include cache cleared");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use crate::diagnostic::Span;
    use std::time::Duration;

    #[test]
    fn test_stale_entry_is_ignored() {
        let cache = IncludeCache::default();
        let t0 = SystemTime::UNIX_EPOCH;
        let body = Arc::new(Node::new(NodeKind::Block(Vec::new()), Span::dummy()));
        cache.insert(PathBuf::from("a.q"), t0, body);

        assert!(cache.get(Path::new("a.q"), t0).is_some());
        assert!(cache.get(Path::new("a.q"), t0 + Duration::from_secs(1)).is_none());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_relative_paths_join_root() {
        assert_eq!(resolve_path(Path::new("views"), "a.q"), PathBuf::from("views/a.q"));
    }
}
