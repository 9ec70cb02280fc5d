//! Continuation-scope stack
//!
//! Every statement of a flow either leaves open exits behind (a linear node's
//! `next`, the fall-through tails of a branch) or ends control flow (a
//! terminal action, a jump). The open exits of the innermost enclosing block
//! live in the top [`ScopeFrame`]; the next node placed in that block takes
//! them all as its incoming edges.
//!
//! A branch pushes one frame per case body. When the body is done the frame
//! is popped and its open exits are handed back to the branch, which joins
//! them into the enclosing frame.

/// Transition slot of a node whose target is not known yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The unconditional `next`
    Next,
    /// Conditional edge at this position
    Condition(usize),
    /// Error edge at this position
    Error(usize),
}

/// An open exit: a node (by insertion index) and one of its slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tail {
    /// Index of the node in insertion order
    pub node: usize,
    /// Slot still waiting for a target
    pub slot: Slot,
}

impl Tail {
    /// The `next` slot of a node
    pub fn next(node: usize) -> Self {
        Self {
            node,
            slot: Slot::Next,
        }
    }

    /// Conditional edge `index` of a node
    pub fn condition(node: usize, index: usize) -> Self {
        Self {
            node,
            slot: Slot::Condition(index),
        }
    }

    /// Error edge `index` of a node
    pub fn error(node: usize, index: usize) -> Self {
        Self {
            node,
            slot: Slot::Error(index),
        }
    }
}

/// An open exit that will be patched to a label's node
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LabelRef {
    pub tail: Tail,
    pub label: String,
}

/// Open exits of one block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFrame {
    pending: Vec<Tail>,
    origin: Option<usize>,
    terminated: bool,
}

impl ScopeFrame {
    fn with_entry(entry: Vec<Tail>) -> Self {
        Self {
            pending: entry,
            origin: None,
            terminated: false,
        }
    }

    /// Exits the next placed node must be wired from
    pub fn pending(&self) -> &[Tail] {
        &self.pending
    }

    /// Branch or input node whose fall-through tails are pending
    pub fn origin(&self) -> Option<usize> {
        self.origin
    }

    /// Whether the last statement ended control flow
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Hand the pending exits to a newly placed node
    pub(crate) fn take(&mut self) -> Vec<Tail> {
        self.origin = None;
        self.terminated = false;
        std::mem::take(&mut self.pending)
    }

    /// Record the exit of a linear node
    pub(crate) fn advance(&mut self, tail: Tail) {
        self.pending = vec![tail];
        self.origin = None;
        self.terminated = false;
    }

    /// Record the fall-through tails of a branch
    pub(crate) fn join(&mut self, origin: usize, tails: Vec<Tail>) {
        self.terminated = tails.is_empty();
        self.pending = tails;
        self.origin = Some(origin);
    }

    /// Mark the block as ended by a terminal action or jump
    pub(crate) fn terminate(&mut self) {
        self.pending.clear();
        self.origin = None;
        self.terminated = true;
    }
}

/// Stack of open blocks, outermost first
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    root: ScopeFrame,
    nested: Vec<ScopeFrame>,
}

impl ScopeStack {
    /// Empty stack with only the top-level block
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a case body whose first node is wired from `entry`
    pub(crate) fn push_case(&mut self, entry: Vec<Tail>) {
        tracing::debug!(
            "Opening case scope at depth {} with {} entry exit(s)",
            self.nested.len() + 1,
            entry.len()
        );
        self.nested.push(ScopeFrame::with_entry(entry));
    }

    /// Close the innermost case body, returning its fall-through tails
    pub(crate) fn pop_case(&mut self) -> Vec<Tail> {
        let tails = self
            .nested
            .pop()
            .map(|mut frame| frame.take())
            .unwrap_or_default();
        tracing::debug!(
            "Closed case scope at depth {} with {} open exit(s)",
            self.nested.len() + 1,
            tails.len()
        );
        tails
    }

    /// Innermost open block
    pub fn current(&self) -> &ScopeFrame {
        self.nested.last().unwrap_or(&self.root)
    }

    pub(crate) fn current_mut(&mut self) -> &mut ScopeFrame {
        self.nested.last_mut().unwrap_or(&mut self.root)
    }

    /// Number of open case bodies
    pub fn depth(&self) -> usize {
        self.nested.len()
    }

    /// Whether statements currently land at the top level
    pub fn is_root(&self) -> bool {
        self.nested.is_empty()
    }

    pub(crate) fn into_root(self) -> ScopeFrame {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears_pending_and_origin() {
        let mut frame = ScopeFrame::default();
        frame.join(3, vec![Tail::next(4), Tail::error(3, 0)]);
        assert_eq!(frame.origin(), Some(3));

        let tails = frame.take();
        assert_eq!(tails, vec![Tail::next(4), Tail::error(3, 0)]);
        assert!(frame.pending().is_empty());
        assert_eq!(frame.origin(), None);
    }

    #[test]
    fn test_join_without_tails_terminates() {
        let mut frame = ScopeFrame::default();
        frame.join(0, vec![]);
        assert!(frame.is_terminated());
    }

    #[test]
    fn test_empty_case_returns_entry() {
        let mut stack = ScopeStack::new();
        stack.push_case(vec![Tail::condition(0, 1)]);
        assert_eq!(stack.depth(), 1);
        assert!(!stack.is_root());

        let tails = stack.pop_case();
        assert_eq!(tails, vec![Tail::condition(0, 1)]);
        assert!(stack.is_root());
    }

    #[test]
    fn test_nested_frames_are_independent() {
        let mut stack = ScopeStack::new();
        stack.current_mut().advance(Tail::next(0));
        stack.push_case(vec![Tail::condition(1, 0)]);
        stack.current_mut().terminate();
        assert!(stack.pop_case().is_empty());
        assert_eq!(stack.current().pending(), &[Tail::next(0)]);
    }
}
