//! Typed traversal over the closed set of syntax-tree nodes.
//!
//! [`walk`] dispatches each node kind to a dedicated [`Visitor`] handler.
//! Every handler returns whether the walk should descend into that node's
//! children, so a visitor can cut off subtrees it does not care about.

use crate::ast::{CompilationUnit, Decl, Expr, ImportDecl, ImportSpec, SpecId};

/// Callbacks for the node variants import repair cares about. Default
/// implementations descend everywhere.
pub trait Visitor {
    /// Called for every import declaration, with its index in the unit's
    /// declaration list. Returning `false` skips the declaration's specs.
    fn import_decl(&mut self, _decl: &ImportDecl, _decl_index: usize) -> bool {
        true
    }

    /// Called for every import spec of a visited declaration. The return
    /// value is ignored; specs have no children.
    fn import_spec(&mut self, _spec: &ImportSpec, _id: SpecId) -> bool {
        true
    }

    /// Called for every member selection `base.member`. Returning `false`
    /// skips the base expression.
    fn qualified(&mut self, _base: &Expr, _member: &str) -> bool {
        true
    }
}

/// Walks every declaration of `unit` in source order, dispatching to
/// `visitor`.
pub fn walk(unit: &CompilationUnit, visitor: &mut impl Visitor) {
    for (decl_index, decl) in unit.decls.iter().enumerate() {
        match decl {
            Decl::Import(import) => {
                if visitor.import_decl(import, decl_index) {
                    for &id in &import.specs {
                        visitor.import_spec(unit.spec(id), id);
                    }
                }
            }
            Decl::Item(item) => {
                for expr in &item.body {
                    walk_expr(expr, visitor);
                }
            }
        }
    }
}

/// Preorder walk of one expression tree.
pub fn walk_expr(expr: &Expr, visitor: &mut impl Visitor) {
    match expr {
        Expr::Ident(_) => {}
        Expr::Qualified { base, member } => {
            if visitor.qualified(base, member) {
                walk_expr(base, visitor);
            }
        }
        Expr::Call { callee, args } => {
            walk_expr(callee, visitor);
            for arg in args {
                walk_expr(arg, visitor);
            }
        }
    }
}
