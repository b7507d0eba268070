//! Device-node stack (spec.md §2 component 5).
//!
//! Each `new-device`/`finish-device` pair owns a vocabulary chain that must
//! not remain reachable once the node is finished: a child node may not
//! directly invoke a parent's method (it would have to go through
//! `$call-parent`), so the parent's chain is simply not searched while a
//! child is open. The exception is a configured set of "global scope"
//! names, which get added to the top-level (core) chain no matter how
//! deeply nested the current node is; that switch lives in `Config`/the
//! dispatcher, not here.

use crate::vocab::VocabChain;

/// One open device-node. `ifile`/`line` record where `new-device` occurred,
/// used by the diagnostic subsystem's "in device-node opened at ..."
/// context (spec.md §7).
#[derive(Debug)]
pub struct DeviceNode {
    pub ifile: String,
    pub line: u32,
    pub vocab: VocabChain,
}

impl DeviceNode {
    fn new(ifile: impl Into<String>, line: u32) -> Self {
        DeviceNode {
            ifile: ifile.into(),
            line,
            vocab: VocabChain::new(),
        }
    }
}

/// The stack of open device-nodes. Tokenization starts with an implicit
/// top-level node already open (spec.md component 5: "implicit top-level
/// node"), which is never popped.
#[derive(Debug)]
pub struct DeviceNodeStack {
    nodes: Vec<DeviceNode>,
}

impl DeviceNodeStack {
    pub fn new(start_file: impl Into<String>) -> Self {
        DeviceNodeStack {
            nodes: vec![DeviceNode::new(start_file, 0)],
        }
    }

    /// Open a nested device-node (`new-device`).
    pub fn push(&mut self, ifile: impl Into<String>, line: u32) {
        self.nodes.push(DeviceNode::new(ifile, line));
    }

    /// Close the current device-node (`finish-device`). Returns `None` (and
    /// leaves the stack untouched) if called at the top level, where it is
    /// a usage error for the caller to report.
    pub fn pop(&mut self) -> Option<DeviceNode> {
        if self.nodes.len() > 1 {
            self.nodes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    pub fn at_top_level(&self) -> bool {
        self.nodes.len() == 1
    }

    /// The vocabulary definitions currently go into: the innermost open
    /// node's chain, unless `global` scope has been requested, in which
    /// case the caller should route to `core_vocab()` instead.
    pub fn current_definitions(&mut self) -> &mut VocabChain {
        &mut self.nodes.last_mut().expect("top-level node always present").vocab
    }

    pub fn core_vocab(&mut self) -> &mut VocabChain {
        &mut self.nodes[0].vocab
    }

    /// Look a name up starting at the innermost node and working outward
    /// *only as far as the top-level (core) node* -- intermediate ancestor
    /// nodes are intentionally not searched, matching the "no direct access
    /// to a parent's method" rule. In practice this means: check the
    /// current node, then (if different) the core node.
    pub fn lookup(&self, name: &str) -> Option<&crate::vocab::TicEntry> {
        let current = self.nodes.last().unwrap();
        if let Some(e) = current.vocab.lookup(name) {
            return Some(e);
        }
        if self.nodes.len() > 1 {
            self.nodes[0].vocab.lookup(name)
        } else {
            None
        }
    }

    /// True if `name` exists in some ancestor node strictly between the
    /// core vocabulary and the current node -- used to produce the
    /// "exists in an ancestor node, but out of scope" warning (spec.md
    /// component 5's "exists_in_ancestor"-type diagnostic) rather than a
    /// flat "undefined word" message.
    pub fn exists_in_ancestor(&self, name: &str) -> bool {
        if self.nodes.len() <= 2 {
            return false;
        }
        self.nodes[1..self.nodes.len() - 1]
            .iter()
            .any(|n| n.vocab.exists(name))
    }

    pub fn current(&self) -> &DeviceNode {
        self.nodes.last().unwrap()
    }

    /// Un-hide `name` wherever it was hidden, searching the same
    /// current-node-then-core order as `lookup`. Used to restore a macro's
    /// active behavior once its body frame has finished expanding (spec.md
    /// §4.1), undoing the recursion guard `hide` installed regardless of
    /// which scope the macro was defined in.
    pub fn reveal(&mut self, name: &str) {
        self.nodes.last_mut().unwrap().vocab.reveal(name);
        if self.nodes.len() > 1 {
            self.nodes[0].vocab.reveal(name);
        }
    }

    /// Hide `name` wherever `lookup` would have found it -- the recursion
    /// guard a macro installs on itself while its body is being expanded,
    /// mirroring the self-reference guard a colon-definition installs on
    /// its own name (spec.md §4.1/component 9).
    pub fn hide(&mut self, name: &str) {
        self.nodes.last_mut().unwrap().vocab.hide(name);
        if self.nodes.len() > 1 {
            self.nodes[0].vocab.hide(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{ActiveKind, Definer, TicEntry};

    #[test]
    fn child_vocab_is_not_visible_after_finish() {
        let mut stack = DeviceNodeStack::new("top.fth");
        stack.push("dev.fth", 5);
        stack
            .current_definitions()
            .add_entry(TicEntry::new("probe", ActiveKind::EmitToken(1), Definer::BuiltinFcode));
        assert!(stack.lookup("probe").is_some());
        stack.pop();
        assert!(stack.lookup("probe").is_none());
    }

    #[test]
    fn top_level_cannot_be_popped() {
        let mut stack = DeviceNodeStack::new("top.fth");
        assert!(stack.pop().is_none());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn grandchild_cannot_see_parent_but_can_see_core() {
        let mut stack = DeviceNodeStack::new("top.fth");
        stack
            .core_vocab()
            .add_entry(TicEntry::new("global-word", ActiveKind::EmitToken(9), Definer::BuiltinFcode));
        stack.push("parent.fth", 1);
        stack
            .current_definitions()
            .add_entry(TicEntry::new("parent-word", ActiveKind::EmitToken(2), Definer::BuiltinFcode));
        stack.push("child.fth", 2);
        assert!(stack.lookup("global-word").is_some());
        assert!(stack.lookup("parent-word").is_none());
        assert!(stack.exists_in_ancestor("parent-word"));
    }
}
