// walk.rs — Tree Walker
//
// Source-order traversal of one translation unit. Emits an event for every
// construct a check cares about; the receiver decides what to do with it.
//
// Preconditions: none.
// Postconditions: events arrive in the order the constructs appear, with
//   these exceptions: an assignment fires after its operands, a `for` loop
//   fires after its init clause, a `do` loop fires after its body.
// Failure modes: none.
// Side effects: whatever the `Events` implementation does.

use crate::ast::*;

/// Receiver of walker events. Every method defaults to a no-op.
pub trait Events {
    fn on_function(&mut self, _function: &FunctionDecl) {}
    /// `declarator` has an initializer `init`; `init` has been walked.
    fn on_var_init(&mut self, _declarator: &Declarator, _init: &Expr) {}
    /// `expr` is an assignment whose operands have been walked.
    fn on_assign(&mut self, _expr: &Expr, _target: &Expr, _value: &Expr) {}
    /// `expr` is a call; its arguments have been walked.
    fn on_call(&mut self, _expr: &Expr, _callee: &Expr) {}
    /// A bare name outside callee position.
    fn on_name(&mut self, _expr: &Expr) {}
    fn on_loop(&mut self, _kind: LoopKind, _stmt: &Stmt, _cond: &Expr) {}
    /// The root of an if chain. `else if` links are not reported separately.
    fn on_if_chain(&mut self, _stmt: &Stmt, _chain: &IfStmt) {}
    fn on_switch(&mut self, _stmt: &Stmt, _switch: &SwitchStmt) {}
}

pub fn walk_unit(unit: &TranslationUnit, events: &mut impl Events) {
    for item in &unit.items {
        match item {
            Item::Function(f) => {
                events.on_function(f);
                if let Some(body) = &f.body {
                    for stmt in &body.stmts {
                        walk_stmt(stmt, false, events);
                    }
                }
            }
            Item::Global(decl) => walk_decl(decl, events),
            Item::Struct(_) | Item::Typedef(_) => {}
        }
    }
}

fn walk_decl(decl: &DeclStmt, events: &mut impl Events) {
    for declarator in &decl.declarators {
        for dim in declarator.array_dims.iter().flatten() {
            walk_expr(dim, events);
        }
        if let Some(init) = &declarator.init {
            walk_expr(init, events);
            events.on_var_init(declarator, init);
        }
    }
}

fn walk_stmt(stmt: &Stmt, else_if: bool, events: &mut impl Events) {
    match &stmt.kind {
        StmtKind::Compound(block) => {
            for s in &block.stmts {
                walk_stmt(s, false, events);
            }
        }
        StmtKind::Decl(decl) => walk_decl(decl, events),
        StmtKind::Expr(e) | StmtKind::Case(e) => walk_expr(e, events),
        StmtKind::Return(value) => {
            if let Some(e) = value {
                walk_expr(e, events);
            }
        }
        StmtKind::If(s) => {
            if !else_if {
                events.on_if_chain(stmt, s);
            }
            walk_expr(&s.cond, events);
            walk_stmt(&s.then_branch, false, events);
            if let Some(else_branch) = &s.else_branch {
                let link = matches!(else_branch.kind, StmtKind::If(_));
                walk_stmt(else_branch, link, events);
            }
        }
        StmtKind::For(s) => {
            if let Some(init) = &s.init {
                walk_stmt(init, false, events);
            }
            if let Some(cond) = &s.cond {
                events.on_loop(LoopKind::For, stmt, cond);
                walk_expr(cond, events);
            }
            if let Some(step) = &s.step {
                walk_expr(step, events);
            }
            walk_stmt(&s.body, false, events);
        }
        StmtKind::While(s) => {
            events.on_loop(LoopKind::While, stmt, &s.cond);
            walk_expr(&s.cond, events);
            walk_stmt(&s.body, false, events);
        }
        StmtKind::DoWhile(s) => {
            walk_stmt(&s.body, false, events);
            events.on_loop(LoopKind::DoWhile, stmt, &s.cond);
            walk_expr(&s.cond, events);
        }
        StmtKind::Switch(s) => {
            events.on_switch(stmt, s);
            walk_expr(&s.cond, events);
            walk_stmt(&s.body, false, events);
        }
        StmtKind::Default
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Goto(_)
        | StmtKind::Label(_)
        | StmtKind::Empty => {}
    }
}

fn walk_expr(expr: &Expr, events: &mut impl Events) {
    match &expr.kind {
        ExprKind::Call { callee, args } => {
            // A bare-name callee is reported through `on_call`, not `on_name`.
            if !matches!(callee.kind, ExprKind::Name(_)) {
                walk_expr(callee, events);
            }
            for arg in args {
                walk_expr(arg, events);
            }
            events.on_call(expr, callee);
        }
        ExprKind::Assign { target, value, .. } => {
            walk_expr(target, events);
            walk_expr(value, events);
            events.on_assign(expr, target, value);
        }
        ExprKind::Name(_) => events.on_name(expr),
        _ => {
            for child in expr.children() {
                walk_expr(child, events);
            }
        }
    }
}
