// flatten.rs — Branch Flattener
//
// Linearises an if/else-if/else chain or a switch body into one preorder
// node sequence. Each entry is marked with the role it plays in the
// construct, so the reachability proof never has to compare nodes to find
// a segment boundary.
//
// Preconditions: the construct comes from a parsed unit.
// Postconditions: `nodes` is the preorder of every descendant the proof must
//   inspect; `segments` counts the mutually exclusive outcome blocks.
// Failure modes: none.
// Side effects: none.

use crate::ast::{IfStmt, Node, Stmt, StmtKind, SwitchStmt};

/// Role of a flattened node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// An `else if` link of the chain (the nested `if` statement itself).
    ChainLink,
    /// Part of a link's controlling condition.
    ChainCondition,
    /// First node of outcome segment `n` (counted from 0).
    SegmentStart(usize),
    /// A `case`/`default` label belonging to this switch.
    Label,
    /// Any other node inside a segment.
    Body,
}

#[derive(Debug, Clone, Copy)]
pub struct FlatNode<'a> {
    pub node: Node<'a>,
    pub mark: Mark,
}

#[derive(Debug, Clone)]
pub struct FlatConstruct<'a> {
    pub nodes: Vec<FlatNode<'a>>,
    pub segments: usize,
    /// A final `else` or a `default` label is present.
    pub exhaustive: bool,
}

/// Push `root` marked `first`, then its descendants marked `rest`.
fn push_preorder<'a>(root: Node<'a>, first: Mark, rest: Mark, out: &mut Vec<FlatNode<'a>>) {
    out.push(FlatNode {
        node: root,
        mark: first,
    });
    for child in root.children() {
        push_preorder(child, rest, rest, out);
    }
}

/// Flatten an if chain rooted at `root`.
///
/// Layout: root condition, segment 0 (then branch), then per `else if`:
/// link, link condition, next segment; finally the `else` segment if any.
pub fn flatten_if_chain(root: &IfStmt) -> FlatConstruct<'_> {
    let mut nodes = Vec::new();
    let mut segments = 0;
    let mut link = root;

    loop {
        push_preorder(
            Node::Expr(&link.cond),
            Mark::ChainCondition,
            Mark::ChainCondition,
            &mut nodes,
        );
        push_preorder(
            Node::Stmt(&link.then_branch),
            Mark::SegmentStart(segments),
            Mark::Body,
            &mut nodes,
        );
        segments += 1;

        let Some(else_branch) = &link.else_branch else {
            return FlatConstruct {
                nodes,
                segments,
                exhaustive: false,
            };
        };
        match &else_branch.kind {
            StmtKind::If(next) => {
                nodes.push(FlatNode {
                    node: Node::Stmt(else_branch),
                    mark: Mark::ChainLink,
                });
                link = next;
            }
            _ => {
                push_preorder(
                    Node::Stmt(else_branch),
                    Mark::SegmentStart(segments),
                    Mark::Body,
                    &mut nodes,
                );
                return FlatConstruct {
                    nodes,
                    segments: segments + 1,
                    exhaustive: true,
                };
            }
        }
    }
}

/// The `if` statements that form the links of a chain, root first.
pub fn chain_links(root: &IfStmt) -> Vec<&IfStmt> {
    let mut links = vec![root];
    let mut link = root;
    while let Some(StmtKind::If(next)) = link.else_branch.as_deref().map(|s| &s.kind) {
        links.push(next);
        link = next;
    }
    links
}

/// Flatten a switch body. Labels of nested switches stay `Body`.
pub fn flatten_switch(switch: &SwitchStmt) -> FlatConstruct<'_> {
    let mut nodes = Vec::new();
    push_switch_body(Node::Stmt(&switch.body), false, &mut nodes);

    let labels = nodes.iter().filter(|n| n.mark == Mark::Label);
    let exhaustive = labels
        .clone()
        .any(|n| matches!(n.node, Node::Stmt(Stmt { kind: StmtKind::Default, .. })));
    FlatConstruct {
        segments: labels.count(),
        nodes,
        exhaustive,
    }
}

fn push_switch_body<'a>(node: Node<'a>, nested: bool, out: &mut Vec<FlatNode<'a>>) {
    let (is_label, is_switch) = match node {
        Node::Stmt(s) => (
            matches!(s.kind, StmtKind::Case(_) | StmtKind::Default),
            matches!(s.kind, StmtKind::Switch(_)),
        ),
        Node::Expr(_) => (false, false),
    };
    let mark = if is_label && !nested {
        Mark::Label
    } else {
        Mark::Body
    };
    out.push(FlatNode { node, mark });
    for child in node.children() {
        push_switch_body(child, nested || is_switch, out);
    }
}
