// single_work_item.rs — Kernels that synchronise without an identity query
//
// A kernel that never asks for its work-item index can be compiled as a
// single work-item kernel, unless it calls a barrier, which forces NDRange
// execution.
//
// Preconditions: none.
// Postconditions: at most one finding per kernel, at the kernel's name.
// Failure modes: none.
// Side effects: none.

use crate::ast::{preorder, FunctionDecl, Node};
use crate::diag::{codes, Diagnostic};
use crate::source::SourceFile;
use crate::taint::{CallTarget, Scanner};

pub fn check_kernel(
    scanner: &Scanner<'_>,
    source: &SourceFile,
    function: &FunctionDecl,
) -> Option<Diagnostic> {
    if !function.is_kernel {
        return None;
    }
    let body = function.body.as_ref()?;

    let mut nodes = Vec::new();
    for stmt in &body.stmts {
        preorder(Node::Stmt(stmt), &mut nodes);
    }
    let mut first_barrier = None;
    for call in nodes.iter().filter_map(|n| n.as_call()) {
        match scanner.classify_call(call) {
            Some(CallTarget::Identity(_)) => return None,
            Some(CallTarget::Barrier(_)) if first_barrier.is_none() => {
                first_barrier = Some(call.span);
            }
            _ => {}
        }
    }

    let barrier = first_barrier?;
    Some(
        Diagnostic::warning(
            function.name.span,
            format!(
                "kernel function '{}' does not call an identity function and may be treated as single-work-item; barrier call at {} forces NDRange execution",
                function.name.name,
                source.span_location(barrier)
            ),
        )
        .with_code(codes::SINGLE_WORK_ITEM_BARRIER),
    )
}
