// resolve.rs — Declaration identity for kernel-C translation units
//
// Walks the parsed AST with a lexical scope stack and assigns every variable
// and struct field a stable ID. Downstream phases look expressions up by span
// in the side tables produced here; no phase ever compares variables by name.
//
// Preconditions: `unit` is a well-formed AST from the parser.
// Postconditions: every `Name` expression that denotes a visible variable is
//   in `var_refs`; every member expression is in `member_refs`; every
//   declarator and named parameter is in `var_decls`.
// Failure modes: none. A name that is not a visible variable is treated as
//   a function reference; a member whose struct is unknown resolves to the
//   first declared field of that name, or to a synthetic field.
// Side effects: none.

use std::collections::HashMap;

use crate::ast::*;
use crate::id::{FieldId, FunctionId, IdAllocator, VarId};

// ── Public types ────────────────────────────────────────────────────────────

/// Resolution tables produced by name resolution.
/// Downstream phases use these alongside the original AST.
#[derive(Debug, Default)]
pub struct ResolvedUnit {
    /// Indexed by `VarId`.
    pub vars: Vec<VarInfo>,
    /// Indexed by `FieldId`.
    pub fields: Vec<FieldInfo>,
    pub structs: Vec<StructInfo>,
    pub functions: HashMap<String, FunctionEntry>,
    /// Declarator or parameter name span → declared variable.
    pub var_decls: HashMap<Span, VarId>,
    /// `Name` expression span → referenced variable.
    pub var_refs: HashMap<Span, VarId>,
    /// Member expression span → referenced field.
    pub member_refs: HashMap<Span, FieldId>,
}

#[derive(Debug, Clone)]
pub struct VarInfo {
    pub name: String,
    pub span: Span,
    /// Index into `structs` when the variable has a known struct type.
    pub struct_type: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    /// Display name of the declaring struct; `None` for synthetic fields.
    pub owner: Option<String>,
    /// Declaration span; `None` for synthetic fields.
    pub span: Option<Span>,
    pub struct_type: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct StructInfo {
    pub name: String,
    pub fields: Vec<(String, FieldId)>,
}

#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub id: FunctionId,
    /// Name span of the first declaration seen.
    pub name_span: Span,
    pub is_kernel: bool,
    pub has_body: bool,
}

impl ResolvedUnit {
    pub fn var(&self, id: VarId) -> &VarInfo {
        &self.vars[id.0 as usize]
    }

    pub fn field(&self, id: FieldId) -> &FieldInfo {
        &self.fields[id.0 as usize]
    }

    /// The variable a `Name` expression refers to.
    pub fn var_ref(&self, expr: &Expr) -> Option<VarId> {
        match expr.kind {
            ExprKind::Name(_) => self.var_refs.get(&expr.span).copied(),
            _ => None,
        }
    }

    /// The field a member expression refers to.
    pub fn member_ref(&self, expr: &Expr) -> Option<FieldId> {
        match expr.kind {
            ExprKind::Member { .. } => self.member_refs.get(&expr.span).copied(),
            _ => None,
        }
    }

    /// The statically known target of a call: the callee must be a bare name
    /// that is not a variable. Calls through any other expression have none.
    pub fn callee_name<'e>(&self, callee: &'e Expr) -> Option<&'e str> {
        match &callee.kind {
            ExprKind::Name(name) if !self.var_refs.contains_key(&callee.span) => {
                Some(name.as_str())
            }
            _ => None,
        }
    }

    /// A non-call reference to a function declared in this unit.
    pub fn function_ref<'e>(&self, expr: &'e Expr) -> Option<&'e str> {
        self.callee_name(expr)
            .filter(|name| self.functions.contains_key(*name))
    }

    /// First variable declared with `name`, in source order.
    pub fn var_named(&self, name: &str) -> Option<VarId> {
        self.vars
            .iter()
            .position(|v| v.name == name)
            .map(|i| VarId(i as u32))
    }

    /// First field declared (or synthesised) with `name`.
    pub fn field_named(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| FieldId(i as u32))
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Resolve all names in a parsed translation unit.
pub fn resolve(unit: &TranslationUnit) -> ResolvedUnit {
    let mut ctx = ResolveCtx::new();

    // Pass 1: struct layouts and function names
    ctx.collect_globals(unit);

    // Pass 2: scopes, declarations and references in source order
    ctx.resolve_items(unit);

    ctx.resolved
}

// ── Internal context ────────────────────────────────────────────────────────

struct ResolveCtx {
    resolved: ResolvedUnit,
    /// Tag and typedef names → index into `resolved.structs`.
    struct_names: HashMap<String, usize>,
    /// Field name → declared fields in source order.
    fields_by_name: HashMap<String, Vec<FieldId>>,
    synthetic_fields: HashMap<String, FieldId>,
    scopes: Vec<HashMap<String, VarId>>,
    id_alloc: IdAllocator,
}

impl ResolveCtx {
    fn new() -> Self {
        ResolveCtx {
            resolved: ResolvedUnit::default(),
            struct_names: HashMap::new(),
            fields_by_name: HashMap::new(),
            synthetic_fields: HashMap::new(),
            scopes: vec![HashMap::new()],
            id_alloc: IdAllocator::new(),
        }
    }

    // ── Pass 1: collect globals ─────────────────────────────────────────

    fn collect_globals(&mut self, unit: &TranslationUnit) {
        for item in &unit.items {
            match item {
                Item::Struct(def) => self.collect_struct(def),
                Item::Typedef(def) => {
                    if let Some(index) = self.struct_of_type(&def.ty) {
                        self.struct_names.insert(def.alias.name.clone(), index);
                    }
                }
                Item::Function(func) => {
                    let id_alloc = &mut self.id_alloc;
                    let entry = self
                        .resolved
                        .functions
                        .entry(func.name.name.clone())
                        .or_insert_with(|| FunctionEntry {
                            id: id_alloc.alloc_function(),
                            name_span: func.name.span,
                            is_kernel: false,
                            has_body: false,
                        });
                    entry.is_kernel |= func.is_kernel;
                    entry.has_body |= func.body.is_some();
                }
                Item::Global(_) => {}
            }
        }
    }

    fn collect_struct(&mut self, def: &StructDef) {
        let index = self.resolved.structs.len();
        let name = def
            .alias
            .as_ref()
            .or(def.tag.as_ref())
            .map(|n| n.name.clone())
            .unwrap_or_else(|| "<anonymous struct>".to_string());

        // Register names first so self-referential fields see the type.
        for n in def.tag.iter().chain(def.alias.iter()) {
            self.struct_names.insert(n.name.clone(), index);
        }
        self.resolved.structs.push(StructInfo {
            name: name.clone(),
            fields: Vec::new(),
        });

        for field in &def.fields {
            let id = self.id_alloc.alloc_field();
            let struct_type = self.struct_of_type(&field.ty);
            self.resolved.fields.push(FieldInfo {
                name: field.name.name.clone(),
                owner: Some(name.clone()),
                span: Some(field.name.span),
                struct_type,
            });
            self.resolved.structs[index]
                .fields
                .push((field.name.name.clone(), id));
            self.fields_by_name
                .entry(field.name.name.clone())
                .or_default()
                .push(id);
        }
    }

    fn struct_of_type(&self, ty: &TypeSpec) -> Option<usize> {
        let name = match &ty.name {
            TypeName::Named(n) | TypeName::Struct(n) => &n.name,
        };
        self.struct_names.get(name).copied()
    }

    // ── Pass 2: scoped resolution ───────────────────────────────────────

    fn resolve_items(&mut self, unit: &TranslationUnit) {
        for item in &unit.items {
            match item {
                Item::Global(decl) => self.resolve_decl(decl),
                Item::Function(func) => {
                    self.scopes.push(HashMap::new());
                    for param in &func.params {
                        if let Some(name) = &param.name {
                            self.declare(name, &param.ty);
                        }
                    }
                    if let Some(body) = &func.body {
                        self.resolve_block(body);
                    }
                    self.scopes.pop();
                }
                Item::Struct(_) | Item::Typedef(_) => {}
            }
        }
    }

    fn declare(&mut self, name: &Ident, ty: &TypeSpec) -> VarId {
        let id = self.id_alloc.alloc_var();
        let struct_type = self.struct_of_type(ty);
        self.resolved.vars.push(VarInfo {
            name: name.name.clone(),
            span: name.span,
            struct_type,
        });
        self.resolved.var_decls.insert(name.span, id);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.name.clone(), id);
        }
        id
    }

    fn lookup(&self, name: &str) -> Option<VarId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn resolve_block(&mut self, block: &Block) {
        self.scopes.push(HashMap::new());
        for stmt in &block.stmts {
            self.resolve_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn resolve_decl(&mut self, decl: &DeclStmt) {
        for d in &decl.declarators {
            for dim in d.array_dims.iter().flatten() {
                self.resolve_expr(dim);
            }
            // The declarator's scope begins before its initializer.
            self.declare(&d.name, &decl.ty);
            if let Some(init) = &d.init {
                self.resolve_expr(init);
            }
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Compound(block) => self.resolve_block(block),
            StmtKind::Decl(decl) => self.resolve_decl(decl),
            StmtKind::For(f) => {
                self.scopes.push(HashMap::new());
                if let Some(init) = &f.init {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = &f.cond {
                    self.resolve_expr(cond);
                }
                if let Some(step) = &f.step {
                    self.resolve_expr(step);
                }
                self.resolve_stmt(&f.body);
                self.scopes.pop();
            }
            _ => {
                for child in stmt.children() {
                    match child {
                        Node::Stmt(s) => self.resolve_stmt(s),
                        Node::Expr(e) => self.resolve_expr(e),
                    }
                }
            }
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(name) => {
                if let Some(id) = self.lookup(name) {
                    self.resolved.var_refs.insert(expr.span, id);
                }
            }
            ExprKind::Member { base, field, .. } => {
                self.resolve_expr(base);
                let owner = self.struct_of_expr(base);
                let id = self.field_for(owner, &field.name);
                self.resolved.member_refs.insert(expr.span, id);
            }
            _ => {
                for child in expr.children() {
                    self.resolve_expr(child);
                }
            }
        }
    }

    /// Struct type of an already-resolved expression, when known.
    fn struct_of_expr(&self, expr: &Expr) -> Option<usize> {
        match &expr.kind {
            ExprKind::Name(_) => self
                .resolved
                .var_refs
                .get(&expr.span)
                .and_then(|id| self.resolved.var(*id).struct_type),
            ExprKind::Member { .. } => self
                .resolved
                .member_refs
                .get(&expr.span)
                .and_then(|id| self.resolved.field(*id).struct_type),
            ExprKind::Index { base, .. } => self.struct_of_expr(base),
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => self.struct_of_expr(operand),
            ExprKind::Cast { ty, .. } => self.struct_of_type(ty),
            _ => None,
        }
    }

    /// Field lookup order: the base's struct, then the first struct that
    /// declares `name`, then a synthetic field keyed by `name`.
    fn field_for(&mut self, owner: Option<usize>, name: &str) -> FieldId {
        if let Some(index) = owner {
            let declared = self.resolved.structs[index]
                .fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, id)| *id);
            if let Some(id) = declared {
                return id;
            }
        }
        if let Some(id) = self.fields_by_name.get(name).and_then(|ids| ids.first()) {
            return *id;
        }
        if let Some(id) = self.synthetic_fields.get(name) {
            return *id;
        }
        let id = self.id_alloc.alloc_field();
        self.resolved.fields.push(FieldInfo {
            name: name.to_string(),
            owner: None,
            span: None,
            struct_type: None,
        });
        self.synthetic_fields.insert(name.to_string(), id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn resolve_ok(source: &str) -> (TranslationUnit, ResolvedUnit) {
        let result = parse(source);
        assert!(result.errors.is_empty(), "parse errors: {:?}", result.errors);
        let unit = result.unit.expect("unit");
        let resolved = resolve(&unit);
        (unit, resolved)
    }

    /// Span of the `n`th whole-word occurrence of `word` in `source`.
    fn nth_span(source: &str, word: &str, n: usize) -> Span {
        let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
        let start = source
            .match_indices(word)
            .map(|(i, _)| i)
            .filter(|&i| {
                let before = source[..i].chars().next_back();
                let after = source[i + word.len()..].chars().next();
                !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
            })
            .nth(n)
            .expect("word occurrence");
        (start..start + word.len()).into()
    }

    #[test]
    fn parameter_and_local_references() {
        let src = "__kernel void k(int n) { int i = n; i = i + 1; }";
        let (_, r) = resolve_ok(src);
        let n = r.var_named("n").expect("n");
        let i = r.var_named("i").expect("i");
        assert_eq!(r.var_refs.get(&nth_span(src, "n", 1)), Some(&n));
        assert_eq!(r.var_refs.get(&nth_span(src, "i", 2)), Some(&i));
        assert_eq!(r.var_decls.get(&nth_span(src, "i", 0)), Some(&i));
    }

    #[test]
    fn shadowed_variables_get_distinct_ids() {
        let src = "void f() { int x = 1; { int x = 2; x = 3; } x = 4; }";
        let (_, r) = resolve_ok(src);
        let outer = r.var_decls[&nth_span(src, "x", 0)];
        let inner = r.var_decls[&nth_span(src, "x", 1)];
        assert_ne!(outer, inner);
        assert_eq!(r.var_refs[&nth_span(src, "x", 2)], inner);
        assert_eq!(r.var_refs[&nth_span(src, "x", 3)], outer);
    }

    #[test]
    fn for_init_is_scoped_to_loop() {
        let src = "void f() { int i = 0; for (int i = 5; i < 9; i++) ; i = 1; }";
        let (_, r) = resolve_ok(src);
        let outer = r.var_decls[&nth_span(src, "i", 0)];
        let inner = r.var_decls[&nth_span(src, "i", 1)];
        assert_eq!(r.var_refs[&nth_span(src, "i", 2)], inner);
        assert_eq!(r.var_refs[&nth_span(src, "i", 4)], outer);
    }

    #[test]
    fn globals_are_visible_in_functions() {
        let src = "int g; void f() { g = 1; }";
        let (_, r) = resolve_ok(src);
        let g = r.var_named("g").expect("g");
        assert_eq!(r.var_refs[&nth_span(src, "g", 1)], g);
    }

    #[test]
    fn member_resolves_through_declared_struct_type() {
        let src = "struct A { int x; }; struct B { int x; };\n\
                   void f() { struct B b; b.x = 1; }";
        let (_, r) = resolve_ok(src);
        let member_span: Span = {
            let start = src.find("b.x").expect("b.x");
            (start..start + 3).into()
        };
        let id = r.member_refs[&member_span];
        assert_eq!(r.field(id).owner.as_deref(), Some("B"));
    }

    #[test]
    fn member_through_typedef_pointer_and_index() {
        let src = "typedef struct { int id; float v; } Item;\n\
                   void f(Item *items) { items[0].v = 1.0f; items->id = 2; }";
        let (_, r) = resolve_ok(src);
        let v = r.field_named("v").expect("v");
        let id = r.field_named("id").expect("id");
        assert!(r.member_refs.values().any(|f| *f == v));
        assert!(r.member_refs.values().any(|f| *f == id));
        assert_eq!(r.field(v).owner.as_deref(), Some("Item"));
    }

    #[test]
    fn unknown_struct_falls_back_to_first_declared_field() {
        let src = "struct P { int x; }; void f(Opaque o) { o.x = 1; }";
        let (_, r) = resolve_ok(src);
        let x = r.field_named("x").expect("x");
        assert_eq!(r.member_refs.values().copied().collect::<Vec<_>>(), vec![x]);
    }

    #[test]
    fn undeclared_field_is_synthesised_once() {
        let src = "void f(Opaque a, Opaque b) { a.w = 1; b.w = 2; }";
        let (_, r) = resolve_ok(src);
        let ids: Vec<_> = r.member_refs.values().copied().collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
        assert!(r.field(ids[0]).owner.is_none());
    }

    #[test]
    fn nested_member_uses_field_struct_type() {
        let src = "struct In { int v; }; struct Other { int v; };\n\
                   struct Out { struct Other o; };\n\
                   void f() { struct Out s; s.o.v = 1; }";
        let (_, r) = resolve_ok(src);
        let start = src.find("s.o.v").expect("s.o.v");
        let id = r.member_refs[&Span::from(start..start + 5)];
        assert_eq!(r.field(id).owner.as_deref(), Some("Other"));
    }

    #[test]
    fn names_that_are_not_variables_are_function_references() {
        let src = "int helper(int a);\n\
                   __kernel void k(int n) { helper(n); get_local_id(0); n(); }";
        let (unit, r) = resolve_ok(src);
        assert!(r.functions.contains_key("helper"));
        assert!(r.functions["k"].is_kernel);

        let Item::Function(k) = &unit.items[1] else {
            panic!("expected kernel");
        };
        let calls: Vec<Option<&str>> = k
            .body
            .as_ref()
            .expect("body")
            .stmts
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Expr(Expr {
                    kind: ExprKind::Call { callee, .. },
                    ..
                }) => r.callee_name(callee),
                _ => None,
            })
            .collect();
        // `n()` calls through a variable and has no static callee.
        assert_eq!(calls, vec![Some("helper"), Some("get_local_id"), None]);
    }

    #[test]
    fn prototype_and_definition_share_entry() {
        let src = "int f(int a); int f(int a) { return a; }";
        let (_, r) = resolve_ok(src);
        assert_eq!(r.functions.len(), 1);
        assert!(r.functions["f"].has_body);
    }
}
