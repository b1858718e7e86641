// barrier.rs — Barrier-Reachability Checker
//
// Flags barrier calls nested in a conditional construct whose controlling
// condition is identity-dependent, unless the construct is proven to make
// every work-item reach the same positive number of barriers.
//
// Preconditions: the taint store reflects everything visited before the
//   construct.
// Postconditions: one finding per barrier call per flagged construct.
// Failure modes: none. Anything the proof cannot reason about yields
//   `Proof::Unknown`, which is flagged like `ProvenUnsafe`.
// Side effects: `log::debug!` for every proof outcome.

use std::fmt;

use log::debug;

use crate::ast::{preorder, Expr, IfStmt, LoopKind, Node, Span, Stmt, StmtKind, SwitchStmt};
use crate::diag::{codes, Diagnostic};
use crate::flatten::{chain_links, flatten_if_chain, flatten_switch, FlatConstruct, Mark};
use crate::source::SourceFile;
use crate::taint::{CallTarget, Dependence, Scanner, TaintStore};

// ── Construct kinds ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalKind {
    ForLoop,
    IfElse,
    DoLoop,
    WhileLoop,
    Switch,
}

impl From<LoopKind> for ConditionalKind {
    fn from(kind: LoopKind) -> Self {
        match kind {
            LoopKind::For => ConditionalKind::ForLoop,
            LoopKind::While => ConditionalKind::WhileLoop,
            LoopKind::DoWhile => ConditionalKind::DoLoop,
        }
    }
}

impl fmt::Display for ConditionalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConditionalKind::ForLoop => "for loop",
            ConditionalKind::IfElse => "if/else",
            ConditionalKind::DoLoop => "do loop",
            ConditionalKind::WhileLoop => "while loop",
            ConditionalKind::Switch => "switch",
        })
    }
}

// ── Proof result ────────────────────────────────────────────────────────────

/// Why a construct is known to leave some work-items without a barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsafe {
    MissingElse,
    MissingDefault,
    NoBarrier { segment: usize },
    CountMismatch {
        segment: usize,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for Unsafe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unsafe::MissingElse => f.write_str("the chain has no final 'else' branch"),
            Unsafe::MissingDefault => f.write_str("the switch has no 'default' label"),
            Unsafe::NoBarrier { segment } => {
                write!(f, "branch {} contains no barrier call", segment + 1)
            }
            Unsafe::CountMismatch {
                segment,
                expected,
                found,
            } => write!(
                f,
                "branch {} contains {found} barrier call(s) where branch 1 contains {expected}",
                segment + 1
            ),
        }
    }
}

/// Why the proof gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bailout {
    NestedBranch,
    Jump,
    NonBarrierCall(String),
    UnresolvedCallee,
    CallInCondition,
    FallthroughAfterBarrier,
    BarrierOutsideCase,
}

impl fmt::Display for Bailout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bailout::NestedBranch => f.write_str("nested branch or loop"),
            Bailout::Jump => f.write_str("jump statement"),
            Bailout::NonBarrierCall(name) => write!(f, "call to non-barrier function '{name}'"),
            Bailout::UnresolvedCallee => f.write_str("call with no statically known callee"),
            Bailout::CallInCondition => f.write_str("function call in branch condition"),
            Bailout::FallthroughAfterBarrier => {
                f.write_str("fall-through into the next case after a barrier")
            }
            Bailout::BarrierOutsideCase => f.write_str("barrier outside any case"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proof {
    ProvenSafe,
    ProvenUnsafe(Unsafe),
    Unknown { span: Span, reason: Bailout },
}

// ── Segment counting ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SegmentTally {
    /// Barrier count of the first closed segment.
    target: Option<usize>,
    segment: usize,
    current: usize,
}

impl SegmentTally {
    fn open(&mut self, segment: usize) {
        self.segment = segment;
        self.current = 0;
    }

    fn close(&mut self) -> Result<(), Unsafe> {
        if self.current == 0 {
            return Err(Unsafe::NoBarrier {
                segment: self.segment,
            });
        }
        match self.target {
            None => self.target = Some(self.current),
            Some(expected) if expected != self.current => {
                return Err(Unsafe::CountMismatch {
                    segment: self.segment,
                    expected,
                    found: self.current,
                })
            }
            Some(_) => {}
        }
        Ok(())
    }
}

/// How one body node affects the proof.
enum Step {
    Neutral,
    Barrier,
    Break,
    Abort(Proof),
}

fn classify_node(node: Node<'_>, scanner: &Scanner<'_>) -> Step {
    match node {
        Node::Stmt(s) => match &s.kind {
            StmtKind::Break => Step::Break,
            StmtKind::If(_)
            | StmtKind::For(_)
            | StmtKind::While(_)
            | StmtKind::DoWhile(_)
            | StmtKind::Switch(_) => Step::Abort(Proof::Unknown {
                span: s.span,
                reason: Bailout::NestedBranch,
            }),
            _ if s.is_branching() => Step::Abort(Proof::Unknown {
                span: s.span,
                reason: Bailout::Jump,
            }),
            _ => Step::Neutral,
        },
        Node::Expr(e) => match scanner.classify_call(e) {
            None => Step::Neutral,
            Some(CallTarget::Barrier(_)) => Step::Barrier,
            Some(CallTarget::Identity(name)) | Some(CallTarget::Other(name)) => {
                Step::Abort(Proof::Unknown {
                    span: e.span,
                    reason: Bailout::NonBarrierCall(name.to_string()),
                })
            }
            Some(CallTarget::Unresolved) => Step::Abort(Proof::Unknown {
                span: e.span,
                reason: Bailout::UnresolvedCallee,
            }),
        },
    }
}

// ── Proofs ──────────────────────────────────────────────────────────────────

/// Prove that every outcome of an if chain executes the same positive
/// number of simple barrier calls.
pub fn prove_if_chain(flat: &FlatConstruct<'_>, scanner: &Scanner<'_>) -> Proof {
    if !flat.exhaustive {
        return Proof::ProvenUnsafe(Unsafe::MissingElse);
    }
    let mut tally = SegmentTally::default();
    let mut open = false;

    for item in &flat.nodes {
        match item.mark {
            Mark::ChainLink => continue,
            Mark::ChainCondition => {
                // Only identity calls may appear in link conditions.
                if let Some(call) = item.node.as_call() {
                    if !matches!(scanner.classify_call(call), Some(CallTarget::Identity(_))) {
                        return Proof::Unknown {
                            span: call.span,
                            reason: Bailout::CallInCondition,
                        };
                    }
                }
                continue;
            }
            Mark::SegmentStart(n) => {
                if open {
                    if let Err(reason) = tally.close() {
                        return Proof::ProvenUnsafe(reason);
                    }
                }
                tally.open(n);
                open = true;
            }
            Mark::Label | Mark::Body => {}
        }
        match classify_node(item.node, scanner) {
            Step::Neutral => {}
            Step::Barrier => tally.current += 1,
            Step::Break => {
                return Proof::Unknown {
                    span: item.node.span(),
                    reason: Bailout::Jump,
                }
            }
            Step::Abort(proof) => return proof,
        }
    }

    if open {
        if let Err(reason) = tally.close() {
            return Proof::ProvenUnsafe(reason);
        }
    }
    Proof::ProvenSafe
}

/// Prove that every case group of a switch executes the same positive
/// number of simple barrier calls. A `break` closes the open group; labels
/// reached by fall-through merge into it.
pub fn prove_switch(flat: &FlatConstruct<'_>, scanner: &Scanner<'_>) -> Proof {
    if !flat.exhaustive {
        return Proof::ProvenUnsafe(Unsafe::MissingDefault);
    }
    let mut tally = SegmentTally::default();
    let mut open = false;
    let mut next_segment = 0;

    for item in &flat.nodes {
        if item.mark == Mark::Label {
            if open && tally.current > 0 {
                return Proof::Unknown {
                    span: item.node.span(),
                    reason: Bailout::FallthroughAfterBarrier,
                };
            }
            if !open {
                tally.open(next_segment);
                next_segment += 1;
                open = true;
            }
            continue;
        }
        match classify_node(item.node, scanner) {
            Step::Neutral => {}
            Step::Barrier if open => tally.current += 1,
            Step::Barrier => {
                return Proof::Unknown {
                    span: item.node.span(),
                    reason: Bailout::BarrierOutsideCase,
                }
            }
            Step::Break => {
                if open {
                    if let Err(reason) = tally.close() {
                        return Proof::ProvenUnsafe(reason);
                    }
                    open = false;
                }
            }
            Step::Abort(proof) => return proof,
        }
    }

    if open {
        if let Err(reason) = tally.close() {
            return Proof::ProvenUnsafe(reason);
        }
    }
    if tally.target.is_none() {
        return Proof::ProvenUnsafe(Unsafe::NoBarrier { segment: 0 });
    }
    Proof::ProvenSafe
}

// ── Checker ─────────────────────────────────────────────────────────────────

pub struct BarrierChecker<'a> {
    scanner: Scanner<'a>,
    source: &'a SourceFile,
}

impl<'a> BarrierChecker<'a> {
    pub fn new(scanner: Scanner<'a>, source: &'a SourceFile) -> Self {
        BarrierChecker { scanner, source }
    }

    /// Simple barrier calls anywhere inside `stmt`, in source order.
    pub fn barrier_calls<'s>(&self, stmt: &'s Stmt) -> Vec<&'s Expr> {
        let mut nodes = Vec::new();
        preorder(Node::Stmt(stmt), &mut nodes);
        nodes
            .into_iter()
            .filter_map(|n| n.as_call())
            .filter(|call| matches!(self.scanner.classify_call(call), Some(CallTarget::Barrier(_))))
            .collect()
    }

    /// Loops are never proven safe: a divergent trip count means divergent
    /// barrier counts.
    pub fn check_loop(
        &self,
        store: &TaintStore,
        kind: LoopKind,
        stmt: &Stmt,
        cond: &Expr,
    ) -> Vec<Diagnostic> {
        let barriers = self.barrier_calls(stmt);
        if barriers.is_empty() {
            return Vec::new();
        }
        let Some(dependence) = self.scanner.dependence(cond, store) else {
            return Vec::new();
        };
        self.findings(kind.into(), cond, &dependence, &barriers, store, None)
    }

    pub fn check_if_chain(&self, store: &TaintStore, stmt: &Stmt, chain: &IfStmt) -> Vec<Diagnostic> {
        let barriers = self.barrier_calls(stmt);
        if barriers.is_empty() {
            return Vec::new();
        }
        // The first identity-dependent link condition controls the report.
        let Some((cond, dependence)) = chain_links(chain).into_iter().find_map(|link| {
            self.scanner
                .dependence(&link.cond, store)
                .map(|d| (&link.cond, d))
        }) else {
            return Vec::new();
        };
        let proof = prove_if_chain(&flatten_if_chain(chain), &self.scanner);
        debug!("barrier: if/else proof {:?}", proof);
        if proof == Proof::ProvenSafe {
            return Vec::new();
        }
        self.findings(
            ConditionalKind::IfElse,
            cond,
            &dependence,
            &barriers,
            store,
            Some(&proof),
        )
    }

    pub fn check_switch(
        &self,
        store: &TaintStore,
        stmt: &Stmt,
        switch: &SwitchStmt,
    ) -> Vec<Diagnostic> {
        let barriers = self.barrier_calls(stmt);
        if barriers.is_empty() {
            return Vec::new();
        }
        let Some(dependence) = self.scanner.dependence(&switch.cond, store) else {
            return Vec::new();
        };
        let proof = prove_switch(&flatten_switch(switch), &self.scanner);
        debug!("barrier: switch proof {:?}", proof);
        if proof == Proof::ProvenSafe {
            return Vec::new();
        }
        self.findings(
            ConditionalKind::Switch,
            &switch.cond,
            &dependence,
            &barriers,
            store,
            Some(&proof),
        )
    }

    fn findings(
        &self,
        kind: ConditionalKind,
        cond: &Expr,
        dependence: &Dependence,
        barriers: &[&Expr],
        store: &TaintStore,
        proof: Option<&Proof>,
    ) -> Vec<Diagnostic> {
        let (reason, trace) = match dependence {
            Dependence::IdentityCall { .. } => ("identity function call".to_string(), Vec::new()),
            Dependence::Reference(r) => (
                format!("reference to identity-dependent {}", r.describe()),
                store.trace(r.key),
            ),
        };
        let message = format!(
            "barrier inside {kind} may not be reachable by all work-items due to {reason} in condition at {}",
            self.source.span_location(cond.span)
        );

        barriers
            .iter()
            .map(|call| {
                let mut diag = Diagnostic::warning(call.span, message.clone())
                    .with_code(codes::CONDITIONAL_BARRIER)
                    .with_trace(trace.iter().cloned());
                match proof {
                    Some(Proof::ProvenUnsafe(why)) => {
                        diag = diag.with_note(cond.span, format!("not every work-item is guaranteed to reach a barrier: {why}"));
                    }
                    Some(Proof::Unknown { span, reason }) => {
                        diag = diag.with_note(*span, format!("cannot prove that every path reaches the same number of barriers: {reason}"));
                    }
                    Some(Proof::ProvenSafe) | None => {}
                }
                diag
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Item, TranslationUnit};
    use crate::config::CheckConfig;
    use crate::parser::parse;
    use crate::resolve::{resolve, ResolvedUnit};

    struct Fixture {
        unit: TranslationUnit,
        resolved: ResolvedUnit,
        config: CheckConfig,
    }

    impl Fixture {
        fn new(body: &str) -> Self {
            let result = parse(&format!("void f(int x, int y, int fp) {{ {body} }}"));
            assert!(result.errors.is_empty(), "parse errors: {:?}", result.errors);
            let unit = result.unit.expect("unit");
            let resolved = resolve(&unit);
            Fixture {
                unit,
                resolved,
                config: CheckConfig::default(),
            }
        }

        fn stmt(&self) -> &Stmt {
            match self.unit.items.first() {
                Some(Item::Function(f)) => &f.body.as_ref().expect("body").stmts[0],
                _ => panic!("expected function"),
            }
        }

        fn scanner(&self) -> Scanner<'_> {
            Scanner::new(&self.resolved, &self.config)
        }

        fn if_proof(&self) -> Proof {
            let StmtKind::If(chain) = &self.stmt().kind else {
                panic!("expected if");
            };
            prove_if_chain(&flatten_if_chain(chain), &self.scanner())
        }

        fn switch_proof(&self) -> Proof {
            let StmtKind::Switch(sw) = &self.stmt().kind else {
                panic!("expected switch");
            };
            prove_switch(&flatten_switch(sw), &self.scanner())
        }
    }

    // ── if chains ──

    #[test]
    fn equal_counts_are_proven_safe() {
        let fx = Fixture::new(
            "if (x) { barrier(1); barrier(1); } else if (y) { barrier(1); barrier(1); } else { barrier(1); barrier(1); }",
        );
        assert_eq!(fx.if_proof(), Proof::ProvenSafe);
    }

    #[test]
    fn unbraced_branches_are_segments() {
        let fx = Fixture::new("if (x) barrier(1); else barrier(2);");
        assert_eq!(fx.if_proof(), Proof::ProvenSafe);
    }

    #[test]
    fn missing_else_is_unsafe() {
        let fx = Fixture::new("if (x) { barrier(1); } else if (y) { barrier(1); }");
        assert_eq!(fx.if_proof(), Proof::ProvenUnsafe(Unsafe::MissingElse));
    }

    #[test]
    fn empty_branch_is_unsafe() {
        let fx = Fixture::new("if (x) { barrier(1); } else { x = 2; }");
        assert_eq!(
            fx.if_proof(),
            Proof::ProvenUnsafe(Unsafe::NoBarrier { segment: 1 })
        );
    }

    #[test]
    fn count_mismatch_is_unsafe() {
        let fx = Fixture::new(
            "if (x) { barrier(1); } else if (y) { barrier(1); barrier(1); } else { barrier(1); }",
        );
        assert_eq!(
            fx.if_proof(),
            Proof::ProvenUnsafe(Unsafe::CountMismatch {
                segment: 1,
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn nested_branch_is_unknown() {
        let fx = Fixture::new("if (x) { if (y) barrier(1); } else { barrier(1); }");
        assert!(matches!(
            fx.if_proof(),
            Proof::Unknown {
                reason: Bailout::NestedBranch,
                ..
            }
        ));
    }

    #[test]
    fn non_barrier_call_is_unknown() {
        let fx = Fixture::new("if (x) { helper(); barrier(1); } else { barrier(1); }");
        assert!(matches!(
            fx.if_proof(),
            Proof::Unknown {
                reason: Bailout::NonBarrierCall(ref name),
                ..
            } if name == "helper"
        ));
    }

    #[test]
    fn call_through_variable_is_unknown() {
        let fx = Fixture::new("if (x) { fp(); barrier(1); } else { barrier(1); }");
        assert!(matches!(
            fx.if_proof(),
            Proof::Unknown {
                reason: Bailout::UnresolvedCallee,
                ..
            }
        ));
    }

    #[test]
    fn jump_in_branch_is_unknown() {
        let fx = Fixture::new("if (x) { barrier(1); return; } else { barrier(1); }");
        assert!(matches!(
            fx.if_proof(),
            Proof::Unknown {
                reason: Bailout::Jump,
                ..
            }
        ));
    }

    #[test]
    fn identity_call_in_link_condition_is_allowed() {
        let fx = Fixture::new(
            "if (x) { barrier(1); } else if (get_local_id(0) == 0) { barrier(1); } else { barrier(1); }",
        );
        assert_eq!(fx.if_proof(), Proof::ProvenSafe);
    }

    #[test]
    fn other_call_in_link_condition_is_unknown() {
        let fx = Fixture::new(
            "if (x) { barrier(1); } else if (check(y)) { barrier(1); } else { barrier(1); }",
        );
        assert!(matches!(
            fx.if_proof(),
            Proof::Unknown {
                reason: Bailout::CallInCondition,
                ..
            }
        ));
    }

    // ── switches ──

    #[test]
    fn switch_with_equal_groups_is_safe() {
        let fx = Fixture::new(
            "switch (x) { case 0: case 1: barrier(1); break; case 2: barrier(1); break; default: barrier(1); }",
        );
        assert_eq!(fx.switch_proof(), Proof::ProvenSafe);
    }

    #[test]
    fn switch_without_default_is_unsafe() {
        let fx = Fixture::new("switch (x) { case 0: barrier(1); break; }");
        assert_eq!(fx.switch_proof(), Proof::ProvenUnsafe(Unsafe::MissingDefault));
    }

    #[test]
    fn switch_group_without_barrier_is_unsafe() {
        let fx = Fixture::new(
            "switch (x) { case 0: barrier(1); break; default: y = 1; break; }",
        );
        assert_eq!(
            fx.switch_proof(),
            Proof::ProvenUnsafe(Unsafe::NoBarrier { segment: 1 })
        );
    }

    #[test]
    fn fallthrough_after_barrier_is_unknown() {
        let fx = Fixture::new(
            "switch (x) { case 0: barrier(1); case 1: barrier(1); break; default: barrier(1); }",
        );
        assert!(matches!(
            fx.switch_proof(),
            Proof::Unknown {
                reason: Bailout::FallthroughAfterBarrier,
                ..
            }
        ));
    }

    #[test]
    fn switch_nested_loop_is_unknown() {
        let fx = Fixture::new(
            "switch (x) { case 0: for (;;) { barrier(1); } break; default: barrier(1); }",
        );
        assert!(matches!(
            fx.switch_proof(),
            Proof::Unknown {
                reason: Bailout::NestedBranch,
                ..
            }
        ));
    }

    #[test]
    fn conditional_kind_display() {
        assert_eq!(ConditionalKind::from(LoopKind::DoWhile).to_string(), "do loop");
        assert_eq!(ConditionalKind::IfElse.to_string(), "if/else");
    }
}
