// Property-based tests for analysis invariants.
//
// Three categories:
// 1. Taint propagation matches a sequential reference model and is deterministic
// 2. Loops are flagged iff their condition is identity-dependent
// 3. Balanced if/else chains are proven safe; any imbalance flags every barrier
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;

use simtlint::config::CheckConfig;
use simtlint::diag::Diagnostic;
use simtlint::engine::{AnalysisContext, AnalysisOutput};
use simtlint::resolve::{resolve, ResolvedUnit};
use simtlint::source::SourceFile;
use simtlint::taint::TaintKey;

// ── Test helpers ────────────────────────────────────────────────────────────

fn analyze(source: &str) -> (ResolvedUnit, AnalysisOutput) {
    let parsed = simtlint::parser::parse(source);
    assert!(parsed.errors.is_empty(), "parse errors: {:?}\n{source}", parsed.errors);
    let unit = parsed.unit.expect("unit");
    let resolved = resolve(&unit);
    let config = CheckConfig::default();
    let file = SourceFile::new("gen.cl", source);
    let output = AnalysisContext::new(&resolved, &config, &file).run(&unit);
    (resolved, output)
}

fn count_code(diags: &[Diagnostic], code: &str) -> usize {
    diags
        .iter()
        .filter(|d| d.code.map(|c| c.0) == Some(code))
        .count()
}

const VARS: usize = 5;

#[derive(Debug, Clone)]
enum Source {
    Identity,
    Var(usize),
    Constant(i64),
}

fn arb_assignment() -> impl Strategy<Value = (usize, Source)> {
    let source = prop_oneof![
        Just(Source::Identity),
        (0..VARS).prop_map(Source::Var),
        (0i64..100).prop_map(Source::Constant),
    ];
    (0..VARS, source)
}

fn render_assignments(ops: &[(usize, Source)]) -> String {
    let mut body = String::new();
    for i in 0..VARS {
        body.push_str(&format!("  int a{i};\n"));
    }
    for (target, source) in ops {
        let value = match source {
            Source::Identity => "get_local_id(0)".to_string(),
            Source::Var(s) => format!("a{s} + 1"),
            Source::Constant(c) => c.to_string(),
        };
        body.push_str(&format!("  a{target} = {value};\n"));
    }
    format!("void f() {{\n{body}}}\n")
}

// ── 1. Taint model ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn taint_matches_sequential_model(ops in prop::collection::vec(arb_assignment(), 0..12)) {
        let mut model = [false; VARS];
        for (target, source) in &ops {
            match source {
                Source::Identity => model[*target] = true,
                Source::Var(s) if model[*s] => model[*target] = true,
                _ => {}
            }
        }

        let source = render_assignments(&ops);
        let (resolved, output) = analyze(&source);
        for (i, expected) in model.iter().enumerate() {
            let id = resolved.var_named(&format!("a{i}")).expect("declared");
            prop_assert_eq!(output.taint.is_tainted(TaintKey::Var(id)), *expected, "a{}", i);
        }
    }

    #[test]
    fn analysis_is_deterministic(ops in prop::collection::vec(arb_assignment(), 0..8)) {
        let source = render_assignments(&ops);
        let (_, first) = analyze(&source);
        let (_, second) = analyze(&source);
        prop_assert_eq!(first.taint, second.taint);
        prop_assert_eq!(first.diagnostics, second.diagnostics);
    }
}

// ── 2. Backward branches ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn loop_flagged_iff_condition_depends_on_identity(
        bound in prop_oneof![Just("tid"), Just("copy"), Just("n"), Just("m"), Just("get_global_id(0)")],
        offset in 0u32..16,
        form in 0usize..3,
    ) {
        let cond = format!("i < {bound} + {offset}");
        let looped = match form {
            0 => format!("for (i = 0; {cond}; i++) {{ }}"),
            1 => format!("while ({cond}) i++;"),
            _ => format!("do {{ i++; }} while ({cond});"),
        };
        let source = format!(
            "void f(int n) {{ int tid = get_local_id(0); int copy = tid; int m = n; int i = 0; {looped} }}"
        );
        let (_, output) = analyze(&source);
        let expected = usize::from(matches!(bound, "tid" | "copy" | "get_global_id(0)"));
        prop_assert_eq!(count_code(&output.diagnostics, "W0101"), expected);
    }
}

// ── 3. Barrier proof ────────────────────────────────────────────────────────

fn render_chain(counts: &[usize], final_else: bool) -> String {
    let mut out = String::from("void f() {\n  int t = get_local_id(0);\n");
    let last = counts.len() - 1;
    for (i, count) in counts.iter().enumerate() {
        let barriers = "barrier(1); ".repeat(*count);
        let head = if i == 0 {
            format!("  if (t == {i}) ")
        } else if i == last && final_else {
            "  else ".to_string()
        } else {
            format!("  else if (t == {i}) ")
        };
        out.push_str(&format!("{head}{{ {barriers}}}\n"));
    }
    out.push_str("}\n");
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn balanced_chain_is_never_flagged(branches in 2usize..6, k in 1usize..4) {
        let source = render_chain(&vec![k; branches], true);
        let (_, output) = analyze(&source);
        prop_assert_eq!(count_code(&output.diagnostics, "W0201"), 0, "{}", source);
    }

    #[test]
    fn any_imbalance_flags_every_barrier(
        branches in 2usize..6,
        k in 1usize..4,
        victim in 0usize..6,
        replacement in 0usize..5,
    ) {
        prop_assume!(replacement != k);
        let mut counts = vec![k; branches];
        counts[victim % branches] = replacement;
        let source = render_chain(&counts, true);
        let (_, output) = analyze(&source);
        let total: usize = counts.iter().sum();
        prop_assert_eq!(count_code(&output.diagnostics, "W0201"), total, "{}", source);
    }

    #[test]
    fn missing_final_else_flags_every_barrier(branches in 2usize..6, k in 1usize..4) {
        let source = render_chain(&vec![k; branches], false);
        let (_, output) = analyze(&source);
        prop_assert_eq!(count_code(&output.diagnostics, "W0201"), k * branches, "{}", source);
    }
}
