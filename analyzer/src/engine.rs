// engine.rs — Per-file analysis context
//
// Owns every piece of mutable state for one translation unit (taint store,
// caller map, accumulated findings) and routes walker events to the
// propagator, the recorder and the enabled checks.
//
// Preconditions: `resolved` was built from the unit being walked.
// Postconditions: `finish()` returns findings ordered by source position.
// Failure modes: none.
// Side effects: `log::debug!` per finding.

use log::debug;

use crate::ast::*;
use crate::backward_branch;
use crate::barrier::BarrierChecker;
use crate::config::{Check, CheckConfig};
use crate::diag::Diagnostic;
use crate::recursion::{self, CallerMap};
use crate::resolve::ResolvedUnit;
use crate::single_work_item;
use crate::source::SourceFile;
use crate::taint::{self, Scanner, TaintKey, TaintStore};
use crate::walk::{walk_unit, Events};

/// Everything one run produced.
#[derive(Debug)]
pub struct AnalysisOutput {
    pub diagnostics: Vec<Diagnostic>,
    pub taint: TaintStore,
    pub callers: CallerMap,
}

pub struct AnalysisContext<'a> {
    scanner: Scanner<'a>,
    source: &'a SourceFile,
    store: TaintStore,
    callers: CallerMap,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(resolved: &'a ResolvedUnit, config: &'a CheckConfig, source: &'a SourceFile) -> Self {
        AnalysisContext {
            scanner: Scanner::new(resolved, config),
            source,
            store: TaintStore::new(),
            callers: CallerMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Walk `unit` and return the results.
    pub fn run(mut self, unit: &TranslationUnit) -> AnalysisOutput {
        walk_unit(unit, &mut self);
        self.finish()
    }

    pub fn finish(mut self) -> AnalysisOutput {
        self.diagnostics.sort_by_key(|d| d.span.start);
        AnalysisOutput {
            diagnostics: self.diagnostics,
            taint: self.store,
            callers: self.callers,
        }
    }

    fn enabled(&self, check: Check) -> bool {
        self.scanner.config().enabled(check)
    }

    fn emit(&mut self, diag: Diagnostic) {
        debug!("finding at {}: {}", self.source.span_location(diag.span), diag);
        self.diagnostics.push(diag);
    }

    fn barrier_checker(&self) -> BarrierChecker<'a> {
        BarrierChecker::new(self.scanner, self.source)
    }

    /// Record a call site of `name` and look for a cycle through it.
    fn call_site(&mut self, name: &str, span: Span) {
        if self.callers.record_call(name, span) == 0 {
            return;
        }
        if !self.enabled(Check::Recursion) {
            return;
        }
        let max_depth = self.scanner.config().max_recursion_depth;
        if let Some(hops) = self.callers.find_cycle(name, max_depth) {
            self.emit(recursion::recursive_call(name, span, &hops));
        }
    }
}

impl Events for AnalysisContext<'_> {
    fn on_function(&mut self, function: &FunctionDecl) {
        if function.body.is_none() {
            return;
        }
        self.callers.record_function(&function.name.name, function.span);
        if self.enabled(Check::SingleWorkItem) {
            if let Some(diag) = single_work_item::check_kernel(&self.scanner, self.source, function) {
                self.emit(diag);
            }
        }
    }

    fn on_var_init(&mut self, declarator: &Declarator, init: &Expr) {
        let Some(&id) = self.scanner.resolved().var_decls.get(&declarator.name.span) else {
            return;
        };
        taint::propagate(&self.scanner, &mut self.store, TaintKey::Var(id), init, declarator.span);
    }

    fn on_assign(&mut self, expr: &Expr, target: &Expr, value: &Expr) {
        let Some(key) = self.scanner.key_of(target) else {
            return;
        };
        taint::propagate(&self.scanner, &mut self.store, key, value, expr.span);
    }

    fn on_call(&mut self, _expr: &Expr, callee: &Expr) {
        if let Some(name) = self.scanner.resolved().callee_name(callee) {
            self.call_site(name, callee.span);
        }
    }

    fn on_name(&mut self, expr: &Expr) {
        if let Some(name) = self.scanner.resolved().function_ref(expr) {
            self.call_site(name, expr.span);
        }
    }

    fn on_loop(&mut self, kind: LoopKind, stmt: &Stmt, cond: &Expr) {
        if self.enabled(Check::BackwardBranch) {
            if let Some(diag) = backward_branch::check_loop(&self.scanner, &self.store, kind, cond) {
                self.emit(diag);
            }
        }
        if self.enabled(Check::Barrier) {
            for diag in self.barrier_checker().check_loop(&self.store, kind, stmt, cond) {
                self.emit(diag);
            }
        }
    }

    fn on_if_chain(&mut self, stmt: &Stmt, chain: &IfStmt) {
        if self.enabled(Check::Barrier) {
            for diag in self.barrier_checker().check_if_chain(&self.store, stmt, chain) {
                self.emit(diag);
            }
        }
    }

    fn on_switch(&mut self, stmt: &Stmt, switch: &SwitchStmt) {
        if self.enabled(Check::Barrier) {
            for diag in self.barrier_checker().check_switch(&self.store, stmt, switch) {
                self.emit(diag);
            }
        }
    }
}
