//! Recently-edited tracker: a copy-on-write compressed trie over canonical
//! context segments.
//!
//! # Responsibility
//! - Record the most recent edit locations for quick-jump navigation.
//! - Reconcile stored paths after renames, moves and deletes with
//!   best-effort merge and decay heuristics.
//!
//! # Invariants
//! - Every operation returns a new index; a previously obtained snapshot
//!   is never mutated, so concurrent readers never observe a partial
//!   update.
//! - A leaf stored under trie keys `k[0..d]` always has those keys as the
//!   first `d` canonical segments of its own path.
//! - A missing match is a silent no-op: this index is best-effort, never
//!   the source of truth.
//!
//! The tracker depends only on the canonical path representation
//! (`EditPath` plus `canon::normalize_value`), never on the thought store.

use crate::canon::normalize_value;
use crate::model::{EditPath, Timestamp};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Leaves older than this collapse into summaries instead of being
/// remapped in place.
pub const RECENT_DECAY_MS: Timestamp = 2 * 60 * 60 * 1000;

/// One recorded edit location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentEntry {
    /// Identity-plus-value path captured at edit time. May become
    /// structurally stale after later edits elsewhere; the merge
    /// heuristics reconcile, they do not guarantee accuracy.
    pub path: EditPath,
    pub last_updated: Timestamp,
}

#[derive(Debug)]
enum TrieNode {
    Internal(BTreeMap<String, Arc<TrieNode>>),
    Leaf(RecentEntry),
}

/// Immutable snapshot of the recently-edited trie.
#[derive(Debug, Clone)]
pub struct RecentIndex {
    root: Arc<TrieNode>,
}

impl Default for RecentIndex {
    fn default() -> Self {
        Self {
            root: empty_internal(),
        }
    }
}

impl RecentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded entries, most recent first.
    pub fn leaves(&self) -> Vec<RecentEntry> {
        let mut out = Vec::new();
        collect_entries(&self.root, &mut Vec::new(), &mut |_, entry| {
            out.push(entry.clone());
        });
        out.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| a.path.len().cmp(&b.path.len()))
        });
        out
    }

    pub fn len(&self) -> usize {
        let mut count = 0;
        collect_entries(&self.root, &mut Vec::new(), &mut |_, _| count += 1);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records a value edit at a location.
    ///
    /// `old_path` and `new_path` are the location before and after the
    /// edit (equal for a fresh insertion). The deepest existing trie node
    /// matching a prefix of `old_path`'s canonical context decides the
    /// strategy: relabel a matched leaf, remap or decay an indexed
    /// subtree, or merge across branches by the sibling / distant-relation
    /// heuristics. Direct cousins are deliberately never merged.
    pub fn node_change(&self, old_path: &EditPath, new_path: &EditPath, now: Timestamp) -> Self {
        let old_segs = segments(old_path);
        let new_segs = segments(new_path);
        if old_segs.is_empty() || new_segs.is_empty() {
            return self.clone();
        }

        let (depth, node) = deepest_match(&self.root, &old_segs);
        let root = match node.as_ref() {
            TrieNode::Leaf(entry) => self.change_at_leaf(
                depth,
                entry.clone(),
                &old_segs,
                &new_segs,
                old_path,
                new_path,
                now,
            ),
            TrieNode::Internal(_) if depth == old_segs.len() => {
                self.change_indexed_subtree(&old_segs, &new_segs, old_path, new_path, now)
            }
            TrieNode::Internal(_) => {
                self.change_cross_branch(depth, &old_segs, &new_segs, new_path, now)
            }
        };
        Self { root }
    }

    /// Removes a recorded location.
    ///
    /// A strict prefix miss is a silent no-op. After removal, remaining
    /// detail near the deleted node is folded into the closest ancestor
    /// with at least two children when one exists within two levels of
    /// the deleted node's parent; otherwise the immediate parent becomes
    /// a summary leaf. `refresh` controls whether merged timestamps are
    /// renewed (true deletes) or preserved (moves).
    pub fn node_delete(&self, path: &EditPath, refresh: bool, now: Timestamp) -> Self {
        let segs = segments(path);
        if segs.is_empty() {
            return self.clone();
        }
        let (depth, node) = deepest_match(&self.root, &segs);
        if depth == 0 {
            return self.clone();
        }
        if matches!(node.as_ref(), TrieNode::Internal(_)) && depth < segs.len() {
            // Strict prefix miss: the target was never indexed.
            return self.clone();
        }

        let removed_ts = newest_entry_ts(node);
        let mut root = remove_at(&self.root, &segs[..depth]);
        let parent_depth = depth - 1;

        let ancestor = closest_multichild_depth(&root, &segs[..parent_depth]);
        match ancestor {
            Some(at) if parent_depth - at <= 2 => {
                let merged_ts = find_node(&root, &segs[..at])
                    .and_then(newest_entry_ts)
                    .or(removed_ts);
                let ts = if refresh { now } else { merged_ts.unwrap_or(now) };
                let summary = RecentEntry {
                    path: path[..at].to_vec(),
                    last_updated: ts,
                };
                root = set_at(&root, &segs[..at], Arc::new(TrieNode::Leaf(summary)));
            }
            _ if parent_depth >= 1 => {
                let ts = if refresh { now } else { removed_ts.unwrap_or(now) };
                let summary = RecentEntry {
                    path: path[..parent_depth].to_vec(),
                    last_updated: ts,
                };
                root = set_at(&root, &segs[..parent_depth], Arc::new(TrieNode::Leaf(summary)));
            }
            // Parent is the trie root: plain removal.
            _ => {}
        }
        Self { root }
    }

    /// Relocates recorded locations after a move.
    ///
    /// A rank-only change (old and new resolve to the same trie node)
    /// delegates to `node_change`. A real relocation re-adds the old
    /// location's entries at the new location and then deletes the old
    /// one, preserving timestamps on both sides.
    pub fn node_move(&self, old_path: &EditPath, new_path: &EditPath, now: Timestamp) -> Self {
        let old_segs = segments(old_path);
        let new_segs = segments(new_path);
        if old_segs.is_empty() || new_segs.is_empty() {
            return self.clone();
        }

        let (old_depth, old_node) = deepest_match(&self.root, &old_segs);
        let (new_depth, new_node) = deepest_match(&self.root, &new_segs);
        if old_depth > 0 && old_depth == new_depth && Arc::ptr_eq(old_node, new_node) {
            return self.node_change(old_path, new_path, now);
        }

        let carried: Vec<RecentEntry> = match old_node.as_ref() {
            TrieNode::Leaf(entry) if old_depth > 0 => {
                let leaf_segs = segments(&entry.path);
                let div = divergence(&leaf_segs, &old_segs);
                if div >= old_segs.len() || div >= leaf_segs.len() {
                    vec![entry.clone()]
                } else {
                    Vec::new()
                }
            }
            TrieNode::Internal(_) if old_depth > 0 && old_depth == old_segs.len() => {
                let mut entries = Vec::new();
                collect_entries(old_node, &mut Vec::new(), &mut |_, entry| {
                    entries.push(entry.clone());
                });
                entries
            }
            _ => Vec::new(),
        };

        if carried.is_empty() {
            let entry = RecentEntry {
                path: new_path.clone(),
                last_updated: now,
            };
            return Self {
                root: insert_entry(&self.root, &new_segs, 0, entry),
            };
        }

        let mut root = self.root.clone();
        for entry in &carried {
            let remapped = RecentEntry {
                path: remap_path(&entry.path, old_path, new_path),
                last_updated: entry.last_updated,
            };
            let remapped_segs = segments(&remapped.path);
            root = insert_entry(&root, &remapped_segs, 0, remapped);
        }
        Self { root }.node_delete(old_path, false, now)
    }

    fn change_at_leaf(
        &self,
        depth: usize,
        leaf: RecentEntry,
        old_segs: &[String],
        new_segs: &[String],
        old_path: &EditPath,
        new_path: &EditPath,
        now: Timestamp,
    ) -> Arc<TrieNode> {
        let leaf_segs = segments(&leaf.path);
        let div = divergence(&leaf_segs, old_segs);

        if div >= old_segs.len() || div >= leaf_segs.len() {
            // The leaf is the edited node itself (or a summary/detail of
            // it): relabel, carrying any deeper detail across the rename.
            let path = remap_path(&leaf.path, old_path, new_path);
            let entry = RecentEntry {
                path,
                last_updated: now,
            };
            let entry_segs = segments(&entry.path);
            let root = remove_at(&self.root, &leaf_segs[..depth]);
            return insert_entry(&root, &entry_segs, 0, entry);
        }

        // The leaf is a relative of the edited node.
        let sibling = leaf_segs.len() == div + 1 && new_segs.len() == div + 1;
        let cousins = leaf_segs.len() == div + 2 && new_segs.len() == div + 2;

        if sibling {
            let root = remove_at(&self.root, &leaf_segs[..depth]);
            if now - leaf.last_updated > RECENT_DECAY_MS && div >= 1 {
                // Stale sibling: both edits collapse into the shared
                // multi-child ancestor.
                let summary = RecentEntry {
                    path: new_path[..div].to_vec(),
                    last_updated: now,
                };
                return insert_entry(&root, &new_segs[..div], 0, summary);
            }
            let entry = RecentEntry {
                path: new_path.clone(),
                last_updated: now,
            };
            return insert_entry(&root, new_segs, 0, entry);
        }

        if cousins {
            // Direct cousins never merge.
            let entry = RecentEntry {
                path: new_path.clone(),
                last_updated: now,
            };
            return insert_entry(&self.root, new_segs, 0, entry);
        }

        // Distant relation: keep whichever path is longer.
        let winner_path = if leaf_segs.len() > new_segs.len() {
            leaf.path.clone()
        } else {
            new_path.clone()
        };
        let winner_segs = segments(&winner_path);
        let entry = RecentEntry {
            path: winner_path,
            last_updated: now,
        };
        let root = remove_at(&self.root, &leaf_segs[..depth]);
        insert_entry(&root, &winner_segs, 0, entry)
    }

    fn change_indexed_subtree(
        &self,
        old_segs: &[String],
        new_segs: &[String],
        old_path: &EditPath,
        new_path: &EditPath,
        now: Timestamp,
    ) -> Arc<TrieNode> {
        let subtree = match find_node(&self.root, old_segs) {
            Some(node) => node,
            None => return self.root.clone(),
        };
        let mut entries = Vec::new();
        collect_entries(subtree, &mut Vec::new(), &mut |_, entry| {
            entries.push(entry.clone());
        });

        let mut root = remove_at(&self.root, old_segs);
        for entry in entries {
            let remapped = RecentEntry {
                path: remap_path(&entry.path, old_path, new_path),
                last_updated: entry.last_updated,
            };
            if now - entry.last_updated > RECENT_DECAY_MS {
                // Stale detail collapses into the closest multi-child
                // ancestor as a summary.
                let full_segs = segments(&entry.path);
                let prefix_len = full_segs.len().saturating_sub(1);
                let at = closest_multichild_depth(&self.root, &full_segs[..prefix_len])
                    .unwrap_or(1);
                let adjusted =
                    (at + new_segs.len()).saturating_sub(old_segs.len()).max(1);
                let summary_len = adjusted.min(remapped.path.len());
                let summary = RecentEntry {
                    path: remapped.path[..summary_len].to_vec(),
                    last_updated: entry.last_updated,
                };
                let summary_segs = segments(&summary.path);
                root = insert_entry(&root, &summary_segs, 0, summary);
            } else {
                let remapped_segs = segments(&remapped.path);
                root = insert_entry(&root, &remapped_segs, 0, remapped);
            }
        }
        root
    }

    fn change_cross_branch(
        &self,
        depth: usize,
        old_segs: &[String],
        new_segs: &[String],
        new_path: &EditPath,
        now: Timestamp,
    ) -> Arc<TrieNode> {
        let prefix = &old_segs[..depth];
        let mut candidates = Vec::new();
        if let Some(common) = find_node(&self.root, prefix) {
            collect_entries(common, &mut prefix.to_vec(), &mut |position, entry| {
                candidates.push((position.to_vec(), entry.clone()));
            });
        }
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        for (position, entry) in candidates {
            let leaf_segs = segments(&entry.path);
            let div = divergence(&leaf_segs, new_segs);
            let sibling = leaf_segs.len() == div + 1 && new_segs.len() == div + 1;
            let cousins = leaf_segs.len() == div + 2 && new_segs.len() == div + 2;

            if sibling {
                let root = remove_at(&self.root, &position);
                if now - entry.last_updated > RECENT_DECAY_MS && div >= 1 {
                    let summary = RecentEntry {
                        path: new_path[..div].to_vec(),
                        last_updated: now,
                    };
                    return insert_entry(&root, &new_segs[..div], 0, summary);
                }
                let merged = RecentEntry {
                    path: new_path.clone(),
                    last_updated: now,
                };
                return insert_entry(&root, new_segs, 0, merged);
            }
            if cousins {
                continue;
            }
            if leaf_segs.len() > div + 1 || new_segs.len() > div + 1 {
                // Distant relation: the longer path survives the merge.
                let winner_path = if leaf_segs.len() > new_segs.len() {
                    entry.path.clone()
                } else {
                    new_path.clone()
                };
                let winner_segs = segments(&winner_path);
                let merged = RecentEntry {
                    path: winner_path,
                    last_updated: now,
                };
                let root = remove_at(&self.root, &position);
                return insert_entry(&root, &winner_segs, 0, merged);
            }
        }

        let entry = RecentEntry {
            path: new_path.clone(),
            last_updated: now,
        };
        insert_entry(&self.root, new_segs, 0, entry)
    }
}

/// Canonical trie segments of an edit path.
fn segments(path: &EditPath) -> Vec<String> {
    path.iter().map(|step| normalize_value(&step.value)).collect()
}

/// First index at which two segment sequences differ.
fn divergence(a: &[String], b: &[String]) -> usize {
    let limit = a.len().min(b.len());
    let mut index = 0;
    while index < limit && a[index] == b[index] {
        index += 1;
    }
    index
}

/// Substitutes the `old` prefix of `path` with `new`.
fn remap_path(path: &EditPath, old: &EditPath, new: &EditPath) -> EditPath {
    if path.len() >= old.len() {
        let mut remapped = new.clone();
        remapped.extend(path[old.len()..].iter().cloned());
        remapped
    } else {
        new.clone()
    }
}

fn empty_internal() -> Arc<TrieNode> {
    Arc::new(TrieNode::Internal(BTreeMap::new()))
}

fn is_empty_internal(node: &TrieNode) -> bool {
    matches!(node, TrieNode::Internal(children) if children.is_empty())
}

/// Walks as deep as the trie allows along `segs`; returns the depth
/// reached and the node there. Depth 0 means the root itself.
fn deepest_match<'a>(root: &'a Arc<TrieNode>, segs: &[String]) -> (usize, &'a Arc<TrieNode>) {
    let mut node = root;
    let mut depth = 0;
    while depth < segs.len() {
        match node.as_ref() {
            TrieNode::Internal(children) => match children.get(&segs[depth]) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            },
            TrieNode::Leaf(_) => break,
        }
    }
    (depth, node)
}

/// The node at exactly `segs`, when every hop exists.
fn find_node<'a>(root: &'a Arc<TrieNode>, segs: &[String]) -> Option<&'a Arc<TrieNode>> {
    let mut node = root;
    for seg in segs {
        match node.as_ref() {
            TrieNode::Internal(children) => node = children.get(seg)?,
            TrieNode::Leaf(_) => return None,
        }
    }
    Some(node)
}

/// Deepest depth `>= 1` along `segs` whose internal node has two or more
/// children.
fn closest_multichild_depth(root: &Arc<TrieNode>, segs: &[String]) -> Option<usize> {
    let mut best = None;
    let mut node = root;
    let mut depth = 0;
    loop {
        if depth >= 1 {
            if let TrieNode::Internal(children) = node.as_ref() {
                if children.len() >= 2 {
                    best = Some(depth);
                }
            }
        }
        if depth == segs.len() {
            break;
        }
        match node.as_ref() {
            TrieNode::Internal(children) => match children.get(&segs[depth]) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            },
            TrieNode::Leaf(_) => break,
        }
    }
    best
}

fn collect_entries(
    node: &Arc<TrieNode>,
    position: &mut Vec<String>,
    visit: &mut impl FnMut(&[String], &RecentEntry),
) {
    match node.as_ref() {
        TrieNode::Leaf(entry) => visit(position, entry),
        TrieNode::Internal(children) => {
            for (seg, child) in children {
                position.push(seg.clone());
                collect_entries(child, position, visit);
                position.pop();
            }
        }
    }
}

fn newest_entry_ts(node: &Arc<TrieNode>) -> Option<Timestamp> {
    let mut newest = None;
    collect_entries(node, &mut Vec::new(), &mut |_, entry| {
        newest = Some(match newest {
            Some(current) if current > entry.last_updated => current,
            _ => entry.last_updated,
        });
    });
    newest
}

/// Compressed insert: the entry lands at the first divergence from the
/// existing structure, splitting a leaf into an internal node only when
/// their segments actually share a deeper prefix. An entry aimed at an
/// occupied internal position replaces that branch with a summary.
fn insert_entry(
    node: &Arc<TrieNode>,
    segs: &[String],
    depth: usize,
    entry: RecentEntry,
) -> Arc<TrieNode> {
    match node.as_ref() {
        TrieNode::Internal(children) => {
            if depth == segs.len() {
                return Arc::new(TrieNode::Leaf(entry));
            }
            let mut next = children.clone();
            let updated = match children.get(&segs[depth]) {
                Some(child) => insert_entry(child, segs, depth + 1, entry),
                None => Arc::new(TrieNode::Leaf(entry)),
            };
            next.insert(segs[depth].clone(), updated);
            Arc::new(TrieNode::Internal(next))
        }
        TrieNode::Leaf(existing) => {
            let existing_segs = segments(&existing.path);
            if depth >= segs.len() || depth >= existing_segs.len() {
                return Arc::new(TrieNode::Leaf(merge_entries(existing.clone(), entry)));
            }
            if existing_segs[depth] == segs[depth] {
                let pushed = Arc::new(TrieNode::Leaf(existing.clone()));
                let child = insert_entry(&pushed, segs, depth + 1, entry);
                let mut children = BTreeMap::new();
                children.insert(existing_segs[depth].clone(), child);
                return Arc::new(TrieNode::Internal(children));
            }
            let mut children = BTreeMap::new();
            children.insert(
                existing_segs[depth].clone(),
                Arc::new(TrieNode::Leaf(existing.clone())),
            );
            children.insert(segs[depth].clone(), Arc::new(TrieNode::Leaf(entry)));
            Arc::new(TrieNode::Internal(children))
        }
    }
}

/// Deeper detail wins; equal depth resolves to the newer entry.
fn merge_entries(a: RecentEntry, b: RecentEntry) -> RecentEntry {
    if a.path.len() > b.path.len() {
        a
    } else if b.path.len() > a.path.len() {
        b
    } else if a.last_updated > b.last_updated {
        a
    } else {
        b
    }
}

/// Removes the node at exactly `segs`, pruning emptied internal nodes.
fn remove_at(node: &Arc<TrieNode>, segs: &[String]) -> Arc<TrieNode> {
    let Some((head, rest)) = segs.split_first() else {
        return empty_internal();
    };
    let TrieNode::Internal(children) = node.as_ref() else {
        return node.clone();
    };
    let mut next = children.clone();
    if let Some(child) = children.get(head) {
        if rest.is_empty() {
            next.remove(head);
        } else {
            let updated = remove_at(child, rest);
            if is_empty_internal(&updated) {
                next.remove(head);
            } else {
                next.insert(head.clone(), updated);
            }
        }
    }
    Arc::new(TrieNode::Internal(next))
}

/// Places `replacement` at exactly `segs`, growing internal nodes along
/// the way when needed.
fn set_at(node: &Arc<TrieNode>, segs: &[String], replacement: Arc<TrieNode>) -> Arc<TrieNode> {
    let Some((head, rest)) = segs.split_first() else {
        return replacement;
    };
    let mut children = match node.as_ref() {
        TrieNode::Internal(existing) => existing.clone(),
        TrieNode::Leaf(_) => BTreeMap::new(),
    };
    let base = children
        .get(head)
        .cloned()
        .unwrap_or_else(empty_internal);
    children.insert(head.clone(), set_at(&base, rest, replacement));
    Arc::new(TrieNode::Internal(children))
}
