//! Comment threads.
//!
//! Replies are stored flat with an optional parent pointer. This module turns
//! such a list into a forest and back into an indented display order. All
//! walks are iterative, so arbitrarily deep threads cannot overflow the
//! stack.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{Reply, ReplyId, ReplyView};

/// Deepest indentation level used for display. Deeper replies are still in
/// the tree, they just stop shifting right.
pub const MAX_INDENT_DEPTH: usize = 8;

/// Anything that can hang in a comment thread.
pub trait ThreadItem {
    fn id(&self) -> &ReplyId;
    fn parent_id(&self) -> Option<&ReplyId>;
}

impl ThreadItem for Reply {
    fn id(&self) -> &ReplyId {
        &self.id
    }

    fn parent_id(&self) -> Option<&ReplyId> {
        self.parent_id.as_ref()
    }
}

impl ThreadItem for ReplyView {
    fn id(&self) -> &ReplyId {
        &self.reply.id
    }

    fn parent_id(&self) -> Option<&ReplyId> {
        self.reply.parent_id.as_ref()
    }
}

/// A reply and its direct answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode<T = Reply> {
    #[serde(flatten)]
    pub item: T,
    #[serde(rename = "replies")]
    pub children: Vec<CommentNode<T>>,
}

/// One row of a flattened thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadLine<'a, T> {
    pub item: &'a T,
    pub depth: usize,
    /// `depth` clamped to [`MAX_INDENT_DEPTH`].
    pub indent: usize,
}

/// Build a forest from replies given in creation order.
///
/// A reply whose parent is in the list becomes that parent's child; any
/// other reply is a root. Roots and children keep input order. A parent
/// cycle (including a reply that is its own parent) is cut by promoting the
/// reply where the walk re-enters the cycle to root, so every input reply
/// appears exactly once in the result.
pub fn build_comment_tree<T: ThreadItem>(items: Vec<T>) -> Vec<CommentNode<T>> {
    let n = items.len();
    let mut parent: Vec<Option<usize>> = {
        let mut index: HashMap<&ReplyId, usize> = HashMap::with_capacity(n);
        for (i, item) in items.iter().enumerate() {
            index.entry(item.id()).or_insert(i);
        }
        items
            .iter()
            .map(|item| item.parent_id().and_then(|p| index.get(p).copied()))
            .collect()
    };
    break_cycles(&mut parent);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for (i, p) in parent.iter().enumerate() {
        match p {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    // Pre-order from the roots; walking it backwards visits every child
    // before its parent.
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        order.push(i);
        stack.extend(children[i].iter().rev().copied());
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode<T>>> = (0..n).map(|_| None).collect();
    for &i in order.iter().rev() {
        let Some(item) = slots[i].take() else {
            continue;
        };
        let kids = children[i]
            .iter()
            .filter_map(|&c| built[c].take())
            .collect();
        built[i] = Some(CommentNode {
            item,
            children: kids,
        });
    }

    roots.iter().filter_map(|&r| built[r].take()).collect()
}

/// Cut every parent cycle. `parent[i]` is the index of i's parent.
fn break_cycles(parent: &mut [Option<usize>]) {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; parent.len()];
    let mut path = Vec::new();
    for start in 0..parent.len() {
        if state[start] != UNSEEN {
            continue;
        }
        let mut cur = start;
        loop {
            match state[cur] {
                UNSEEN => {
                    state[cur] = ON_PATH;
                    path.push(cur);
                    match parent[cur] {
                        Some(p) => cur = p,
                        None => break,
                    }
                }
                ON_PATH => {
                    log::debug!("Reply parent cycle cut at index {}", cur);
                    parent[cur] = None;
                    break;
                }
                _ => break,
            }
        }
        for i in path.drain(..) {
            state[i] = DONE;
        }
    }
}

/// Depth-first display order with depth and clamped indent.
pub fn flatten_thread<T>(roots: &[CommentNode<T>]) -> Vec<ThreadLine<'_, T>> {
    let mut lines = Vec::new();
    let mut stack: Vec<(&CommentNode<T>, usize)> = roots.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        lines.push(ThreadLine {
            item: &node.item,
            depth,
            indent: depth.min(MAX_INDENT_DEPTH),
        });
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }
    lines
}

/// Number of nodes in a forest.
pub fn count_nodes<T>(roots: &[CommentNode<T>]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&CommentNode<T>> = roots.iter().collect();
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PersonaId, PostId};
    use chrono::Utc;

    fn reply(id: &str, parent: Option<&str>) -> Reply {
        Reply {
            id: ReplyId::new(id),
            content: format!("content of {id}"),
            post_id: PostId::new("p"),
            author_id: PersonaId::new("a"),
            parent_id: parent.map(ReplyId::new),
            votes: 0,
            created_at: Utc::now(),
        }
    }

    fn ids(lines: &[ThreadLine<'_, Reply>]) -> Vec<String> {
        lines.iter().map(|l| l.item.id.to_string()).collect()
    }

    #[test]
    fn test_builds_nested_tree_in_input_order() {
        let tree = build_comment_tree(vec![
            reply("a", None),
            reply("b", Some("a")),
            reply("c", None),
            reply("d", Some("a")),
            reply("e", Some("b")),
        ]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].item.id.as_str(), "a");
        assert_eq!(tree[1].item.id.as_str(), "c");
        let a_children: Vec<_> = tree[0].children.iter().map(|c| c.item.id.as_str()).collect();
        assert_eq!(a_children, ["b", "d"]);
        assert_eq!(tree[0].children[0].children[0].item.id.as_str(), "e");
        assert_eq!(count_nodes(&tree), 5);
    }

    #[test]
    fn test_child_listed_before_parent_still_nests() {
        let tree = build_comment_tree(vec![reply("child", Some("parent")), reply("parent", None)]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].item.id.as_str(), "parent");
        assert_eq!(tree[0].children[0].item.id.as_str(), "child");
    }

    #[test]
    fn test_dangling_parent_becomes_root() {
        let tree = build_comment_tree(vec![reply("a", None), reply("orphan", Some("deleted"))]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[1].item.id.as_str(), "orphan");
    }

    #[test]
    fn test_cycles_are_cut_without_losing_replies() {
        let tree = build_comment_tree(vec![
            reply("x", Some("y")),
            reply("y", Some("x")),
            reply("self", Some("self")),
            reply("z", Some("y")),
        ]);
        assert_eq!(count_nodes(&tree), 4);
        let roots: Vec<_> = tree.iter().map(|n| n.item.id.as_str()).collect();
        assert_eq!(roots, ["x", "self"]);
        let lines = flatten_thread(&tree);
        assert_eq!(ids(&lines), ["x", "y", "z", "self"]);
        assert_eq!(lines[2].depth, 2);
    }

    #[test]
    fn test_empty_input() {
        let tree = build_comment_tree(Vec::<Reply>::new());
        assert!(tree.is_empty());
        assert!(flatten_thread(&tree).is_empty());
        assert_eq!(count_nodes(&tree), 0);
    }

    #[test]
    fn test_deep_chain_is_kept_whole_and_indent_clamped() {
        let depth = 2_000;
        let mut replies = vec![reply("r0", None)];
        for i in 1..depth {
            let parent = format!("r{}", i - 1);
            replies.push(reply(&format!("r{i}"), Some(&parent)));
        }
        let tree = build_comment_tree(replies);
        assert_eq!(tree.len(), 1);
        assert_eq!(count_nodes(&tree), depth);

        let lines = flatten_thread(&tree);
        assert_eq!(lines.len(), depth);
        assert_eq!(lines[3].indent, 3);
        assert_eq!(lines[depth - 1].depth, depth - 1);
        assert_eq!(lines[depth - 1].indent, MAX_INDENT_DEPTH);
    }

    #[test]
    fn test_serializes_children_as_replies() {
        let tree = build_comment_tree(vec![reply("a", None), reply("b", Some("a"))]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json[0]["id"], "a");
        assert_eq!(json[0]["replies"][0]["parentId"], "a");
    }
}
