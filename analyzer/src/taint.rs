// taint.rs — Identity-dependence tracking
//
// Taint Store: declaration key → provenance, insert-once.
// Identity Reference Scanner: first tainted reference in an expression.
// Taint Propagator: classifies assignment/initialization events.
//
// Preconditions: expressions come from the unit `ResolvedUnit` was built from.
// Postconditions: a key, once recorded, keeps its first provenance forever.
// Failure modes: none. Unclassifiable sources record nothing.
// Side effects: `log::debug!` on every new taint record.

use std::collections::btree_map::{self, BTreeMap};

use log::debug;

use crate::ast::{Expr, ExprKind, Span};
use crate::config::{CheckConfig, IndexPolicy};
use crate::diag::TraceEntry;
use crate::id::{FieldId, VarId};
use crate::resolve::ResolvedUnit;

// ── Keys and provenance ─────────────────────────────────────────────────────

/// Declaration identity of a taintable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaintKey {
    Var(VarId),
    Field(FieldId),
}

/// Why a declaration is identity-dependent.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    /// The tainting assignment or initialization.
    pub span: Span,
    pub message: String,
    /// The declaration the value was copied from, if any.
    pub upstream: Option<TaintKey>,
}

// ── Taint Store ─────────────────────────────────────────────────────────────

/// Insert-once map from one kind of declaration key to its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct TaintMap<K: Ord> {
    entries: BTreeMap<K, Provenance>,
}

impl<K: Ord> Default for TaintMap<K> {
    fn default() -> Self {
        TaintMap {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> TaintMap<K> {
    pub fn get(&self, key: K) -> Option<&Provenance> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    /// Returns `false`, leaving the existing record untouched, when `key`
    /// is already present.
    pub fn insert_once(&mut self, key: K, provenance: Provenance) -> bool {
        match self.entries.entry(key) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(provenance);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Provenance)> {
        self.entries.iter()
    }
}

/// Variables and fields are tracked in parallel maps with identical rules.
/// A field write anywhere in the unit taints that field declaration for
/// every instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaintStore {
    vars: TaintMap<VarId>,
    fields: TaintMap<FieldId>,
}

impl TaintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: TaintKey) -> Option<&Provenance> {
        match key {
            TaintKey::Var(id) => self.vars.get(id),
            TaintKey::Field(id) => self.fields.get(id),
        }
    }

    pub fn is_tainted(&self, key: TaintKey) -> bool {
        self.get(key).is_some()
    }

    /// First classification wins.
    pub fn record(&mut self, key: TaintKey, provenance: Provenance) -> bool {
        match key {
            TaintKey::Var(id) => self.vars.insert_once(id, provenance),
            TaintKey::Field(id) => self.fields.insert_once(id, provenance),
        }
    }

    pub fn vars(&self) -> &TaintMap<VarId> {
        &self.vars
    }

    pub fn fields(&self) -> &TaintMap<FieldId> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.vars.len() + self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Provenance chain of `key`, most recent first.
    ///
    /// An upstream record always predates its dependent, so the chain is
    /// acyclic; the walk is still bounded by the store size.
    pub fn trace(&self, key: TaintKey) -> Vec<TraceEntry> {
        let mut entries = Vec::new();
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            if entries.len() > self.len() {
                break;
            }
            let Some(provenance) = self.get(k) else {
                break;
            };
            entries.push(TraceEntry::new(provenance.span, provenance.message.clone()));
            cursor = provenance.upstream;
        }
        entries
    }
}

// ── Identity Reference Scanner ──────────────────────────────────────────────

/// A reference to a tainted declaration found inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct TaintedReference {
    pub key: TaintKey,
    pub name: String,
    /// The referencing expression.
    pub span: Span,
}

impl TaintedReference {
    /// `variable 'tid'` or `member 'idx'`.
    pub fn describe(&self) -> String {
        describe_key(self.key, &self.name)
    }
}

fn describe_key(key: TaintKey, name: &str) -> String {
    match key {
        TaintKey::Var(_) => format!("variable '{name}'"),
        TaintKey::Field(_) => format!("member '{name}'"),
    }
}

/// Why a condition is identity-dependent.
#[derive(Debug, Clone, PartialEq)]
pub enum Dependence {
    /// The condition calls an identity function directly.
    IdentityCall { callee: String, span: Span },
    /// The condition reads a tainted declaration.
    Reference(TaintedReference),
}

/// What a call expression statically targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget<'e> {
    Identity(&'e str),
    Barrier(&'e str),
    Other(&'e str),
    /// The callee is not a bare function name.
    Unresolved,
}

/// Read-only queries over expressions, parameterised by the resolved unit
/// and the configuration.
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'a> {
    resolved: &'a ResolvedUnit,
    config: &'a CheckConfig,
}

impl<'a> Scanner<'a> {
    pub fn new(resolved: &'a ResolvedUnit, config: &'a CheckConfig) -> Self {
        Scanner { resolved, config }
    }

    pub fn resolved(&self) -> &'a ResolvedUnit {
        self.resolved
    }

    pub fn config(&self) -> &'a CheckConfig {
        self.config
    }

    /// `None` when `expr` is not a call.
    pub fn classify_call<'e>(&self, expr: &'e Expr) -> Option<CallTarget<'e>> {
        let ExprKind::Call { callee, .. } = &expr.kind else {
            return None;
        };
        Some(match self.resolved.callee_name(callee) {
            Some(name) if self.config.is_identity(name) => CallTarget::Identity(name),
            Some(name) if self.config.is_barrier(name) => CallTarget::Barrier(name),
            Some(name) => CallTarget::Other(name),
            None => CallTarget::Unresolved,
        })
    }

    /// Children to inspect, honouring the index policy.
    fn scan_children<'e>(&self, expr: &'e Expr) -> Vec<&'e Expr> {
        match (&expr.kind, self.config.index_policy) {
            (ExprKind::Index { base, .. }, IndexPolicy::Exclude) => vec![base.as_ref()],
            _ => expr.children(),
        }
    }

    /// First identity call in `expr`, preorder.
    pub fn find_identity_call<'e>(&self, expr: &'e Expr) -> Option<&'e Expr> {
        if matches!(self.classify_call(expr), Some(CallTarget::Identity(_))) {
            return Some(expr);
        }
        self.scan_children(expr)
            .into_iter()
            .find_map(|child| self.find_identity_call(child))
    }

    /// Callee name of a call found by `find_identity_call`.
    pub fn identity_callee<'e>(&self, call: &'e Expr) -> &'e str {
        match self.classify_call(call) {
            Some(CallTarget::Identity(name)) => name,
            _ => "",
        }
    }

    /// The declaration key an expression denotes, when it is a plain
    /// variable or member reference.
    pub fn key_of(&self, expr: &Expr) -> Option<TaintKey> {
        if let Some(id) = self.resolved.var_ref(expr) {
            return Some(TaintKey::Var(id));
        }
        self.resolved.member_ref(expr).map(TaintKey::Field)
    }

    pub fn name_of(&self, key: TaintKey) -> &'a str {
        match key {
            TaintKey::Var(id) => &self.resolved.var(id).name,
            TaintKey::Field(id) => &self.resolved.field(id).name,
        }
    }

    pub fn describe(&self, key: TaintKey) -> String {
        describe_key(key, self.name_of(key))
    }

    /// First reference to a tainted declaration in `expr`, left to right.
    ///
    /// A member expression checks its field first and, if the field is not
    /// tainted, continues into its base.
    pub fn scan(&self, expr: &Expr, store: &TaintStore) -> Option<TaintedReference> {
        if let Some(key) = self.key_of(expr) {
            if store.is_tainted(key) {
                return Some(TaintedReference {
                    key,
                    name: self.name_of(key).to_string(),
                    span: expr.span,
                });
            }
        }
        self.scan_children(expr)
            .into_iter()
            .find_map(|child| self.scan(child, store))
    }

    /// The two identity-dependence rules: a direct identity call, else a
    /// tainted reference.
    pub fn dependence(&self, expr: &Expr, store: &TaintStore) -> Option<Dependence> {
        if let Some(call) = self.find_identity_call(expr) {
            return Some(Dependence::IdentityCall {
                callee: self.identity_callee(call).to_string(),
                span: call.span,
            });
        }
        self.scan(expr, store).map(Dependence::Reference)
    }
}

// ── Taint Propagator ────────────────────────────────────────────────────────

/// Classify one assignment or initialization event `target ← value`.
///
/// Returns `true` when a new record was written. An already tainted target
/// is left alone, and a value that is neither an identity call nor a
/// tainted reference records nothing.
pub fn propagate(
    scanner: &Scanner<'_>,
    store: &mut TaintStore,
    target: TaintKey,
    value: &Expr,
    event: Span,
) -> bool {
    if store.is_tainted(target) {
        return false;
    }
    let target_desc = scanner.describe(target);

    if let Some(call) = scanner.find_identity_call(value) {
        let callee = scanner.identity_callee(call);
        debug!("taint: {target_desc} assigned from identity call '{callee}'");
        return store.record(
            target,
            Provenance {
                span: event,
                message: format!(
                    "assignment of identity-dependent {target_desc} from identity function call '{callee}'"
                ),
                upstream: None,
            },
        );
    }

    if let Some(source) = scanner.scan(value, store) {
        debug!("taint: {target_desc} copied from {}", source.describe());
        return store.record(
            target,
            Provenance {
                span: event,
                message: format!(
                    "inferred assignment of identity-dependent value to {target_desc}, copied from {}",
                    source.describe()
                ),
                upstream: Some(source.key),
            },
        );
    }

    false
}
