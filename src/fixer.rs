//! Import repair for one parsed compilation unit.
//!
//! A single read-only traversal collects the declared aliases, the aliases
//! actually referenced, the import declarations, and the placement anchors.
//! Qualified references whose package is neither declared nor already queued
//! are resolved through the workspace index and queued; the queued paths are
//! then inserted, and finally imports nothing references are pruned. The
//! whole operation is infallible and idempotent.
//!
//! Placement policy: a new spec for a standard-library path is prepended to
//! the first import declaration, so successive standard insertions end up in
//! reverse encounter order; a new external spec is appended, in encounter
//! order. An external path arriving while the unit has no pre-existing
//! external imports falls back to the standard anchor and is prepended. Two
//! unset anchors compare equal, so a unit with no imports at all appends
//! everything in encounter order.

use crate::ast::{
    BLANK_ALIAS, CompilationUnit, Decl, Expr, ImportDecl, ImportSpec, Rank, SPLICE_ALIAS, SpecId,
    base_segment,
};
use crate::index::WorkspaceIndex;
use crate::stdlib;
use crate::visit::{self, Visitor};
use std::collections::{HashMap, HashSet};

/// Repairs `unit`'s import list in place against `index`.
///
/// Adds an import for every qualified reference `X.Y` where `X` is not a
/// declared alias and `X.Y` resolves through the index; removes every import
/// whose alias no expression references, except the blank and splice
/// aliases. The resulting unit never contains an empty import declaration,
/// and a declaration holding exactly one spec is not parenthesized.
pub fn fix(unit: &mut CompilationUnit, index: &WorkspaceIndex) {
    let mut pass = FixPass::collect(unit, index);
    pass.apply_additions(unit);
    pass.prune_unused(unit);
}

/// All state of one repair pass. Built fresh per `fix` call, so the fixer is
/// reentrant and units can be repaired independently.
struct FixPass<'a> {
    index: &'a WorkspaceIndex,
    /// In-scope package alias to its spec. Explicit renames and path base
    /// segments alike.
    declared: HashMap<String, SpecId>,
    /// Aliases dereferenced by at least one qualified expression.
    used: HashSet<String>,
    /// Aliases that a queued addition will satisfy.
    queued_aliases: HashSet<String>,
    /// Indices of import declarations in the unit's declaration list.
    import_decls: Vec<usize>,
    /// Rank of the first standard-library spec seen; set once.
    standard_anchor: Option<Rank>,
    /// Rank of the first external spec seen; set once.
    external_anchor: Option<Rank>,
    /// External specs present before any insertion. Fixed at traversal time.
    preexisting_external: usize,
    /// Resolved import paths to insert, in encounter order.
    additions: Vec<String>,
}

impl<'a> FixPass<'a> {
    fn collect(unit: &CompilationUnit, index: &'a WorkspaceIndex) -> Self {
        let mut pass = FixPass {
            index,
            declared: HashMap::new(),
            used: HashSet::new(),
            queued_aliases: HashSet::new(),
            import_decls: Vec::new(),
            standard_anchor: None,
            external_anchor: None,
            preexisting_external: 0,
            additions: Vec::new(),
        };
        visit::walk(unit, &mut pass);
        pass
    }

    fn apply_additions(&mut self, unit: &mut CompilationUnit) {
        let additions = std::mem::take(&mut self.additions);
        for path in additions {
            self.add_import(unit, path);
        }
    }

    fn add_import(&mut self, unit: &mut CompilationUnit, path: String) {
        let standard = stdlib::is_standard_path(&path);
        let anchor = if standard || self.preexisting_external == 0 {
            self.standard_anchor
        } else {
            self.external_anchor
        };

        let alias = base_segment(&path).to_string();
        let id = unit.alloc_spec(ImportSpec {
            alias: None,
            path,
            rank: anchor.unwrap_or(0),
        });
        self.declared.insert(alias, id);

        if self.import_decls.is_empty() {
            unit.decls.insert(0, Decl::Import(ImportDecl::default()));
            self.import_decls.push(0);
            unit.imports.push(id);
        }
        let first = self.import_decls[0];
        let Some(Decl::Import(decl)) = unit.decls.get_mut(first) else {
            return; // import_decls only ever holds import declarations
        };

        if anchor != self.external_anchor {
            decl.specs.insert(0, id);
        } else {
            decl.specs.push(id);
        }
        if decl.specs.len() > 1 {
            decl.parenthesized = true;
        }
    }

    fn prune_unused(&mut self, unit: &mut CompilationUnit) {
        let mut unused: HashSet<SpecId> = HashSet::new();
        for (alias, &id) in &self.declared {
            if !self.used.contains(alias) && alias != BLANK_ALIAS && alias != SPLICE_ALIAS {
                unused.insert(id);
            }
        }

        for &decl_index in &self.import_decls {
            let Some(Decl::Import(decl)) = unit.decls.get_mut(decl_index) else {
                continue;
            };
            decl.specs.retain(|id| !unused.contains(id));
            if decl.specs.len() == 1 {
                decl.parenthesized = false;
            }
        }

        unit.decls
            .retain(|decl| !matches!(decl, Decl::Import(import) if import.specs.is_empty()));

        // Drop unused entries from the flat list, sliding ranks so the
        // survivors stay consistent with file layout: each later entry takes
        // the rank of the one before it.
        let order = unit.imports.clone();
        let mut kept = Vec::with_capacity(order.len());
        for (position, &id) in order.iter().enumerate() {
            if unused.contains(&id) {
                let mut carried = unit.spec(id).rank;
                for &later in &order[position + 1..] {
                    let rank = unit.spec(later).rank;
                    unit.spec_mut(later).rank = carried;
                    carried = rank;
                }
            } else {
                kept.push(id);
            }
        }
        unit.imports = kept;
    }
}

impl Visitor for FixPass<'_> {
    fn import_decl(&mut self, _decl: &ImportDecl, decl_index: usize) -> bool {
        self.import_decls.push(decl_index);
        true
    }

    fn import_spec(&mut self, spec: &ImportSpec, id: SpecId) -> bool {
        self.declared.insert(spec.local_name().to_string(), id);
        if stdlib::is_standard_path(&spec.path) {
            if self.standard_anchor.is_none() {
                self.standard_anchor = Some(spec.rank);
            }
        } else {
            if self.external_anchor.is_none() {
                self.external_anchor = Some(spec.rank);
            }
            self.preexisting_external += 1;
        }
        true
    }

    fn qualified(&mut self, base: &Expr, member: &str) -> bool {
        let Expr::Ident(alias) = base else {
            return true;
        };
        self.used.insert(alias.clone());
        if !self.declared.contains_key(alias) && !self.queued_aliases.contains(alias) {
            if let Some(path) = self.index.get(&format!("{alias}.{member}")) {
                self.queued_aliases.insert(base_segment(path).to_string());
                self.additions.push(path.to_string());
            }
        }
        true
    }
}
