//! The contended resource: candidate lines plus a one-time claim.
//!
//! `SharedResource` is not synchronized on its own. Callers mutate it only
//! while holding the critical section, so every method takes `&mut self`
//! and assumes exclusive access.

use crate::line::Line;
use crate::predicate::normalize;
use permit_core::NodeId;
use serde::{Deserialize, Serialize};

/// The marker written over a claimed line: the claimant id followed by one
/// space, once per character of the space-stripped original.
pub fn marker(node: NodeId, stripped_len: usize) -> String {
    format!("{} ", node).repeat(stripped_len)
}

/// A successful claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub node: NodeId,
    /// Position of the claimed line.
    pub index: usize,
    /// The matched line with spaces removed.
    pub matched: String,
    /// What the line was rewritten to.
    pub marker: String,
}

/// Candidate lines, the claim marker and a scan cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedResource {
    lines: Vec<Line>,
    claim: Option<Claim>,
    cursor: usize,
}

impl SharedResource {
    pub fn new<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Line>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            claim: None,
            cursor: 0,
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn claim(&self) -> Option<&Claim> {
        self.claim.as_ref()
    }

    pub fn claimed_by(&self) -> Option<NodeId> {
        self.claim.as_ref().map(|c| c.node)
    }

    pub fn claimed_index(&self) -> Option<usize> {
        self.claim.as_ref().map(|c| c.index)
    }

    pub fn is_claimed(&self) -> bool {
        self.claim.is_some()
    }

    /// Number of lines already consumed by incremental scanning.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// True once incremental scanning has looked at every line.
    pub fn is_consumed(&self) -> bool {
        self.cursor >= self.lines.len()
    }

    /// Swap in freshly loaded lines. The claim and cursor are kept.
    pub fn replace_lines(&mut self, lines: Vec<Line>) {
        self.lines = lines;
    }

    /// Scan every line in order and claim the first target for `node`.
    ///
    /// Returns `None` without touching any line when nothing matches or the
    /// resource has already been claimed.
    pub fn claim_first(&mut self, node: NodeId) -> Option<Claim> {
        if self.claim.is_some() {
            return None;
        }
        let index = self.lines.iter().position(Line::is_target)?;
        Some(self.claim_at(index, node))
    }

    /// Consume the line under the cursor and claim it for `node` if it is a
    /// target. Each call examines exactly one line.
    pub fn claim_next(&mut self, node: NodeId) -> Option<Claim> {
        if self.claim.is_some() || self.is_consumed() {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        if self.lines[index].is_target() {
            Some(self.claim_at(index, node))
        } else {
            None
        }
    }

    fn claim_at(&mut self, index: usize, node: NodeId) -> Claim {
        let matched = normalize(self.lines[index].as_text().unwrap_or(""));
        let marker = marker(node, matched.chars().count());
        self.lines[index] = Line::Text(marker.clone());

        let claim = Claim {
            node,
            index,
            matched,
            marker,
        };
        self.claim = Some(claim.clone());
        claim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(lines: &[&str]) -> SharedResource {
        SharedResource::new(lines.iter().copied())
    }

    #[test]
    fn marker_repeats_id_per_char() {
        assert_eq!(marker(NodeId(3), 3), "3 3 3 ");
        assert_eq!(marker(NodeId(12), 2), "12 12 ");
        assert_eq!(marker(NodeId(1), 0), "");
    }

    #[test]
    fn first_target_is_claimed() {
        let mut res = resource(&["abc", "12321", "a b a", "anna"]);
        let claim = res.claim_first(NodeId(2)).unwrap();

        assert_eq!(claim.index, 2);
        assert_eq!(claim.matched, "aba");
        assert_eq!(res.lines()[2], "2 2 2 ");
        assert_eq!(res.claimed_by(), Some(NodeId(2)));
        assert_eq!(res.claimed_index(), Some(2));
        // Later lines are untouched.
        assert_eq!(res.lines()[3], "anna");
    }

    #[test]
    fn second_claim_is_a_noop() {
        let mut res = resource(&["anna", "otto"]);
        res.claim_first(NodeId(1)).unwrap();
        let before = res.clone();

        assert!(res.claim_first(NodeId(2)).is_none());
        assert!(res.claim_next(NodeId(2)).is_none());
        assert_eq!(res, before);
        assert_eq!(res.claimed_by(), Some(NodeId(1)));
    }

    #[test]
    fn no_match_leaves_lines_alone() {
        let mut res = resource(&["abc", "", "909"]);
        let before = res.lines().to_vec();

        assert!(res.claim_first(NodeId(1)).is_none());
        assert_eq!(res.lines(), &before[..]);
        assert!(!res.is_claimed());
    }

    #[test]
    fn incremental_scan_consumes_one_line_per_call() {
        let mut res = resource(&["abc", "xyz", "level"]);

        assert!(res.claim_next(NodeId(1)).is_none());
        assert_eq!(res.cursor(), 1);
        assert!(res.claim_next(NodeId(2)).is_none());
        let claim = res.claim_next(NodeId(3)).unwrap();

        assert_eq!(claim.index, 2);
        assert_eq!(claim.node, NodeId(3));
        assert!(res.is_consumed());
        assert!(res.claim_next(NodeId(1)).is_none());
    }

    #[test]
    fn empty_resource_is_consumed_from_the_start() {
        let mut res = SharedResource::default();
        assert!(res.is_consumed());
        assert!(res.claim_next(NodeId(1)).is_none());
        assert!(res.claim_first(NodeId(1)).is_none());
    }

    #[test]
    fn raw_lines_are_skipped_and_kept() {
        let mut res = SharedResource::new(vec![Line::Raw(vec![0xff]), Line::from("r a c e c a r")]);
        let claim = res.claim_first(NodeId(5)).unwrap();

        assert_eq!(claim.index, 1);
        assert_eq!(res.lines()[0], Line::Raw(vec![0xff]));
        assert_eq!(res.lines()[1], "5 5 5 5 5 5 5 ");
    }

    #[test]
    fn claimed_resource_serializes() {
        let mut res = resource(&["abc", "wow"]);
        res.claim_first(NodeId(2)).unwrap();

        let json = serde_json::to_string(&res).unwrap();
        let back: SharedResource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, res);
        assert_eq!(back.claim().map(|c| c.marker.as_str()), Some("2 2 2 "));
    }

    #[test]
    fn replacing_lines_keeps_claim_and_cursor() {
        let mut res = resource(&["abc", "aa"]);
        res.claim_next(NodeId(1));
        res.replace_lines(vec!["abc".into(), "aa".into(), "bb".into()]);

        assert_eq!(res.cursor(), 1);
        assert_eq!(res.len(), 3);
    }
}
