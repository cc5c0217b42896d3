//! Syntax-tree data model for a single compilation unit.
//!
//! The crate never tokenizes or prints source text. An embedding application
//! implements [`UnitParser`] to produce these types and owns the inverse
//! printing step. Import specs are stored in an arena on the unit and
//! referenced by [`SpecId`], so one spec can appear both in its declaration's
//! ordered list and in the unit's denormalized flat import list while having
//! a single owner.

use anyhow::Result;

/// Ordinal tracking an import spec's place in file layout. Assigned in
/// source order by the parser and kept consistent by the fixer after
/// structural edits.
pub type Rank = u32;

/// Blank alias: the import binds no name and is kept for its effects only.
/// Exempt from unused-import pruning.
pub const BLANK_ALIAS: &str = "_";

/// Splice alias: the package's exported names are brought directly into the
/// local scope, so no qualified references exist for it. Exempt from
/// unused-import pruning.
pub const SPLICE_ALIAS: &str = ".";

/// Handle to an [`ImportSpec`] stored on its [`CompilationUnit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecId(u32);

/// One entry of an import declaration: an optional alias, the import path
/// literal, and a layout rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit local alias, if the source renames the package.
    pub alias: Option<String>,
    /// Workspace-relative or built-in import path, `/`-separated.
    pub path: String,
    pub rank: Rank,
}

impl ImportSpec {
    /// The name this import binds in scope: the explicit alias when present,
    /// otherwise the path's base segment.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => base_segment(&self.path),
        }
    }
}

/// A grouping node holding an ordered run of import specs. Renders as a
/// parenthesized block when it carries more than one spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportDecl {
    pub specs: Vec<SpecId>,
    pub parenthesized: bool,
}

/// A named top-level declaration with the expressions of its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub body: Vec<Expr>,
}

/// Top-level declaration of a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Import(ImportDecl),
    Item(Item),
}

/// Expression forms relevant to import repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A bare identifier.
    Ident(String),
    /// Member selection `base.member`. The base is a full expression;
    /// only selections whose base is a bare identifier name a package.
    Qualified { base: Box<Expr>, member: String },
    /// A call, carrying its callee and arguments.
    Call { callee: Box<Expr>, args: Vec<Expr> },
}

/// The in-memory syntax tree of one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationUnit {
    pub package_name: String,
    /// Top-level declarations in source order.
    pub decls: Vec<Decl>,
    /// Denormalized list of import specs across all import declarations,
    /// in source order.
    pub imports: Vec<SpecId>,
    specs: Vec<ImportSpec>,
}

impl CompilationUnit {
    pub fn new(package_name: impl Into<String>) -> Self {
        CompilationUnit {
            package_name: package_name.into(),
            ..CompilationUnit::default()
        }
    }

    /// Resolves a spec handle. The id must come from this unit.
    pub fn spec(&self, id: SpecId) -> &ImportSpec {
        &self.specs[id.0 as usize]
    }

    pub fn spec_mut(&mut self, id: SpecId) -> &mut ImportSpec {
        &mut self.specs[id.0 as usize]
    }

    /// Stores a spec in the arena without attaching it to any declaration.
    pub(crate) fn alloc_spec(&mut self, spec: ImportSpec) -> SpecId {
        let id = SpecId(self.specs.len() as u32);
        self.specs.push(spec);
        id
    }

    /// Appends an import spec to the import declaration at `decl_index`,
    /// registering it in the flat import list with the next source rank and
    /// deriving the declaration's block-ness from its spec count.
    ///
    /// This is the builder entry point for parsers. Panics if `decl_index`
    /// does not name an import declaration.
    pub fn push_import(&mut self, decl_index: usize, alias: Option<&str>, path: &str) -> SpecId {
        let rank = self.imports.len() as Rank;
        let id = self.alloc_spec(ImportSpec {
            alias: alias.map(str::to_string),
            path: path.to_string(),
            rank,
        });
        let Decl::Import(decl) = &mut self.decls[decl_index] else {
            panic!("push_import: decls[{decl_index}] is not an import declaration");
        };
        decl.specs.push(id);
        if decl.specs.len() > 1 {
            decl.parenthesized = true;
        }
        self.imports.push(id);
        id
    }

    /// Names of the unit's top-level items, in source order.
    pub fn top_level_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Item(item) => Some(item.name.as_str()),
            Decl::Import(_) => None,
        })
    }

    /// Import paths in render order: declaration by declaration, spec by
    /// spec.
    pub fn import_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.decls.iter().flat_map(move |decl| {
            let specs: &[SpecId] = match decl {
                Decl::Import(import) => &import.specs,
                Decl::Item(_) => &[],
            };
            specs.iter().map(move |id| self.spec(*id).path.as_str())
        })
    }
}

/// Last `/`-separated segment of an import path; the whole path when it has
/// no separator.
pub fn base_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// External parse capability. The embedding application supplies an
/// implementation; the index builder drives it over every source file in the
/// workspace. The inverse printing step has no footprint in this crate.
pub trait UnitParser {
    /// Extension (without the dot) of the source files this parser accepts.
    fn extension(&self) -> &str;

    /// Parses one source file into a compilation unit.
    fn parse(&self, source: &str) -> Result<CompilationUnit>;
}
