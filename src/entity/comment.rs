use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParticipantId;

/// Comment ids are unique across the whole thread of one record and are
/// handed out in insertion order, replies included.
pub type CommentId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentNode {
    pub id: CommentId,
    pub author: ParticipantId,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn new(
        id: CommentId,
        author: ParticipantId,
        message: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author,
            timestamp,
            message,
            replies: Vec::new(),
        }
    }

    fn max_id(&self) -> CommentId {
        self.replies
            .iter()
            .map(CommentNode::max_id)
            .fold(self.id, CommentId::max)
    }

    fn count(&self) -> usize {
        1 + self.replies.iter().map(CommentNode::count).sum::<usize>()
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a CommentNode>) {
        out.push(self);
        for reply in &self.replies {
            reply.collect(out);
        }
    }
}

/// Depth-first search through a thread.
pub fn find_comment(nodes: &[CommentNode], id: CommentId) -> Option<&CommentNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_comment(&node.replies, id) {
            return Some(found);
        }
    }
    None
}

pub(crate) fn find_comment_mut(
    nodes: &mut [CommentNode],
    id: CommentId,
) -> Option<&mut CommentNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_comment_mut(&mut node.replies, id) {
            return Some(found);
        }
    }
    None
}

/// Next free id for a thread. Empty threads start at 1.
pub fn next_comment_id(nodes: &[CommentNode]) -> CommentId {
    nodes.iter().map(CommentNode::max_id).max().unwrap_or(0) + 1
}

pub(crate) fn count_comments(nodes: &[CommentNode]) -> usize {
    nodes.iter().map(CommentNode::count).sum()
}

/// Every node in the thread, depth-first.
pub(crate) fn flatten(nodes: &[CommentNode]) -> Vec<&CommentNode> {
    let mut out = Vec::new();
    for node in nodes {
        node.collect(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: CommentId, replies: Vec<CommentNode>) -> CommentNode {
        let mut n = CommentNode::new(id, ParticipantId::from("E-1"), format!("c{}", id), Utc::now());
        n.replies = replies;
        n
    }

    #[test]
    fn test_next_id_counts_replies() {
        let thread = vec![node(1, vec![node(2, vec![]), node(4, vec![])]), node(3, vec![])];
        assert_eq!(next_comment_id(&thread), 5);
        assert_eq!(next_comment_id(&[]), 1);
    }

    #[test]
    fn test_find_nested_comment() {
        let thread = vec![node(1, vec![node(2, vec![node(3, vec![])])])];
        assert_eq!(find_comment(&thread, 3).map(|c| c.id), Some(3));
        assert!(find_comment(&thread, 9).is_none());
    }

    #[test]
    fn test_count_and_flatten() {
        let thread = vec![node(1, vec![node(2, vec![])]), node(3, vec![])];
        assert_eq!(count_comments(&thread), 3);
        let ids: Vec<_> = flatten(&thread).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
