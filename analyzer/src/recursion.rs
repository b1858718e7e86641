// recursion.rs — Call-Graph Recorder + Recursion Detector
//
// Records, per callee name, every call site found inside a known function
// body together with the enclosing function's name, then searches the
// recorded callers backwards from a call site looking for its own callee.
//
// Preconditions: a function is recorded before any call inside its body.
// Postconditions: `find_cycle` only reports cycles of at most `max_depth`
//   hops; longer ones are silently missed.
// Failure modes: none.
// Side effects: `log::trace!` per search step.

use std::collections::BTreeMap;

use log::trace;

use crate::ast::Span;
use crate::diag::{codes, Diagnostic, TraceEntry};

/// One recorded call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Name of the function whose body contains the call.
    pub caller: String,
    pub span: Span,
}

/// One step of a cycle: `callee` is called by `site.caller` at `site.span`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub callee: String,
    pub site: CallSite,
}

impl Hop {
    pub fn to_trace(&self) -> TraceEntry {
        TraceEntry::new(
            self.site.span,
            format!("{} is called by {}", self.callee, self.site.caller),
        )
    }
}

/// Name-keyed caller index for one translation unit.
#[derive(Debug, Clone, Default)]
pub struct CallerMap {
    /// Function name → source range of its latest definition.
    ranges: BTreeMap<String, Span>,
    /// Callee name → recorded call sites, in visit order.
    callers: BTreeMap<String, Vec<CallSite>>,
}

impl CallerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_function(&mut self, name: &str, range: Span) {
        self.ranges.insert(name.to_string(), range);
    }

    /// Record a call to `callee` at `span` against every function whose
    /// range contains it. Returns the number of enclosing functions found.
    pub fn record_call(&mut self, callee: &str, span: Span) -> usize {
        let enclosing: Vec<CallSite> = self
            .ranges
            .iter()
            .filter(|(_, range)| range.start <= span.start && span.start <= range.end)
            .map(|(name, _)| CallSite {
                caller: name.clone(),
                span,
            })
            .collect();
        let count = enclosing.len();
        if count > 0 {
            self.callers
                .entry(callee.to_string())
                .or_default()
                .extend(enclosing);
        }
        count
    }

    pub fn callers_of(&self, callee: &str) -> &[CallSite] {
        self.callers.get(callee).map_or(&[], Vec::as_slice)
    }

    /// Search for a chain of recorded callers leading from `target` back to
    /// itself. Hops are ordered from `target` outwards.
    pub fn find_cycle(&self, target: &str, max_depth: usize) -> Option<Vec<Hop>> {
        let mut path = Vec::new();
        self.search(target, target, 0, max_depth, &mut path)
            .then_some(path)
    }

    fn search(
        &self,
        target: &str,
        current: &str,
        depth: usize,
        max_depth: usize,
        path: &mut Vec<Hop>,
    ) -> bool {
        if depth >= max_depth {
            return false;
        }
        trace!("recursion: searching callers of '{current}' at depth {depth}");
        for site in self.callers_of(current) {
            path.push(Hop {
                callee: current.to_string(),
                site: site.clone(),
            });
            if site.caller == target
                || self.search(target, &site.caller, depth + 1, max_depth, path)
            {
                return true;
            }
            path.pop();
        }
        false
    }
}

/// The error reported at a call site that closes a cycle.
pub fn recursive_call(callee: &str, span: Span, hops: &[Hop]) -> Diagnostic {
    Diagnostic::error(
        span,
        format!("the call to function '{callee}' is recursive, which is not supported in kernel code"),
    )
    .with_code(codes::RECURSIVE_CALL)
    .with_trace(hops.iter().map(Hop::to_trace))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        (start..end).into()
    }

    /// f1 at 0..10, f2 at 20..30, f3 at 40..50; each calls the next.
    fn three_cycle() -> CallerMap {
        let mut map = CallerMap::new();
        map.record_function("f1", span(0, 10));
        map.record_function("f2", span(20, 30));
        map.record_function("f3", span(40, 50));
        map.record_call("f2", span(5, 7));
        map.record_call("f3", span(25, 27));
        map.record_call("f1", span(45, 47));
        map
    }

    #[test]
    fn direct_self_call_is_found_at_depth_zero() {
        let mut map = CallerMap::new();
        map.record_function("f", span(0, 20));
        map.record_call("f", span(10, 11));
        let hops = map.find_cycle("f", 1).expect("cycle");
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].to_trace().message, "f is called by f");
    }

    #[test]
    fn three_hop_cycle_names_every_function() {
        let hops = three_cycle().find_cycle("f1", 3).expect("cycle");
        let messages: Vec<_> = hops.iter().map(|h| h.to_trace().message).collect();
        assert_eq!(
            messages,
            vec!["f1 is called by f3", "f3 is called by f2", "f2 is called by f1"]
        );
        assert_eq!(hops[0].site.span, span(45, 47));
    }

    #[test]
    fn cycle_longer_than_bound_is_missed() {
        assert!(three_cycle().find_cycle("f1", 2).is_none());
        assert!(three_cycle().find_cycle("f1", 5).is_some());
    }

    #[test]
    fn call_outside_any_function_is_not_recorded() {
        let mut map = CallerMap::new();
        map.record_function("f", span(0, 10));
        assert_eq!(map.record_call("g", span(50, 51)), 0);
        assert!(map.callers_of("g").is_empty());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let mut map = CallerMap::new();
        map.record_function("f", span(0, 10));
        assert_eq!(map.record_call("g", span(10, 11)), 1);
        assert_eq!(map.callers_of("g")[0].caller, "f");
    }

    #[test]
    fn acyclic_chain_is_not_recursive() {
        let mut map = CallerMap::new();
        map.record_function("a", span(0, 10));
        map.record_function("b", span(20, 30));
        map.record_call("b", span(5, 6));
        map.record_call("c", span(25, 26));
        assert!(map.find_cycle("c", 5).is_none());
        assert!(map.find_cycle("b", 5).is_none());
    }

    #[test]
    fn diagnostic_carries_hops_as_trace() {
        let hops = three_cycle().find_cycle("f1", 5).expect("cycle");
        let d = recursive_call("f1", span(45, 47), &hops);
        assert!(d.is_error());
        assert_eq!(d.code, Some(codes::RECURSIVE_CALL));
        assert_eq!(
            d.message,
            "the call to function 'f1' is recursive, which is not supported in kernel code"
        );
        assert_eq!(d.trace.len(), 3);
    }
}
