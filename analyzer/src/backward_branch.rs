// backward_branch.rs — Backward-Branch Risk Checker
//
// A loop condition that differs between work-items makes the trip count
// diverge. The check uses the same two dependence rules as the barrier
// checker: a direct identity call, else a tainted reference.
//
// Preconditions: the taint store reflects everything visited before the loop.
// Postconditions: at most one finding per loop, located at its condition.
// Failure modes: none.
// Side effects: none.

use crate::ast::{Expr, LoopKind};
use crate::diag::{codes, Diagnostic};
use crate::taint::{Dependence, Scanner, TaintStore};

pub fn check_loop(
    scanner: &Scanner<'_>,
    store: &TaintStore,
    kind: LoopKind,
    cond: &Expr,
) -> Option<Diagnostic> {
    let diag = match scanner.dependence(cond, store)? {
        Dependence::IdentityCall { .. } => Diagnostic::warning(
            cond.span,
            format!(
                "backward branch ({kind} loop) is identity-dependent due to identity function call and may cause performance degradation"
            ),
        ),
        Dependence::Reference(r) => Diagnostic::warning(
            cond.span,
            format!(
                "backward branch ({kind} loop) is identity-dependent due to reference to {} and may cause performance degradation",
                r.describe()
            ),
        )
        .with_trace(store.trace(r.key)),
    };
    Some(diag.with_code(codes::BACKWARD_BRANCH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Item, StmtKind, TranslationUnit};
    use crate::config::CheckConfig;
    use crate::parser::parse;
    use crate::resolve::{resolve, ResolvedUnit};
    use crate::taint::{Provenance, TaintKey};

    struct Fixture {
        unit: TranslationUnit,
        resolved: ResolvedUnit,
        config: CheckConfig,
    }

    impl Fixture {
        fn new(source: &str) -> Self {
            let result = parse(source);
            assert!(result.errors.is_empty(), "parse errors: {:?}", result.errors);
            let unit = result.unit.expect("unit");
            let resolved = resolve(&unit);
            Fixture {
                unit,
                resolved,
                config: CheckConfig::default(),
            }
        }

        /// Condition of the first `while` in the function body.
        fn while_cond(&self) -> &Expr {
            let Some(Item::Function(f)) = self.unit.items.first() else {
                panic!("expected function");
            };
            f.body
                .as_ref()
                .expect("body")
                .stmts
                .iter()
                .find_map(|s| match &s.kind {
                    StmtKind::While(w) => Some(&w.cond),
                    _ => None,
                })
                .expect("while loop")
        }
    }

    #[test]
    fn direct_identity_call_in_condition() {
        let fx = Fixture::new("void f() { int i; while (i < get_global_id(0)) i++; }");
        let scanner = Scanner::new(&fx.resolved, &fx.config);
        let d = check_loop(&scanner, &TaintStore::new(), LoopKind::While, fx.while_cond())
            .expect("finding");
        assert_eq!(
            d.message,
            "backward branch (while loop) is identity-dependent due to identity function call and may cause performance degradation"
        );
        assert_eq!(d.code, Some(codes::BACKWARD_BRANCH));
        assert!(d.trace.is_empty());
    }

    #[test]
    fn tainted_reference_carries_provenance() {
        let fx = Fixture::new("void f() { int tid; int i; while (i < tid) i++; }");
        let scanner = Scanner::new(&fx.resolved, &fx.config);
        let mut store = TaintStore::new();
        let tid = TaintKey::Var(fx.resolved.var_named("tid").expect("tid"));
        store.record(
            tid,
            Provenance {
                span: (11..19).into(),
                message: "assignment of identity-dependent variable 'tid' from identity function call 'get_local_id'".into(),
                upstream: None,
            },
        );

        let d = check_loop(&scanner, &store, LoopKind::While, fx.while_cond())
            .expect("finding");
        assert!(d.message.contains("due to reference to variable 'tid'"));
        assert_eq!(d.trace.len(), 1);
    }

    #[test]
    fn clean_condition_is_silent() {
        let fx = Fixture::new("void f(int n) { int i; while (i < n * 2) i++; }");
        let scanner = Scanner::new(&fx.resolved, &fx.config);
        assert!(check_loop(&scanner, &TaintStore::new(), LoopKind::While, fx.while_cond()).is_none());
    }
}
