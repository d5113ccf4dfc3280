//! Names for the `vdev` label.
//!
//! The `vdev` label plus the `path` label must be unique within a pool.
//! A top level vdev is named `<type>-<id>`, a nested vdev (which appears
//! while resilvering, for example) `<parent>/<type>-<id>`. Disks and files
//! inside a vdev carry their parent's name and are told apart by path.
//!
//! raidz and draid names follow what `zpool status` prints; everything else
//! falls back to type and id, which is unique even when it does not match.

use crate::model::{VdevNode, VdevType};

/// Returns the `vdev` label for `node`, given its parent's label (empty at top level).
pub fn vdev_name(parent: &str, node: &VdevNode) -> String {
    if node.vdev_type.is_leaf() && !parent.is_empty() {
        return parent.to_string();
    }
    let prefix = if parent.is_empty() {
        String::new()
    } else {
        format!("{parent}/")
    };
    let typ = &node.vdev_type;
    let id = node.id;
    let nparity = node.nparity.unwrap_or_default();
    match typ {
        VdevType::Raidz => format!("{prefix}{typ}{nparity}-{id}"),
        VdevType::Draid => {
            let ndata = node.draid_ndata.unwrap_or_default();
            let nspares = node.draid_nspares.unwrap_or_default();
            let nchildren = node.children().len();
            format!("{prefix}{typ}{nparity}:{ndata}d:{nchildren}c:{nspares}s-{id}")
        }
        _ => format!("{prefix}{typ}-{id}"),
    }
}
