//! importfix: repair a compilation unit's import list against a workspace
//! symbol index.
//!
//! The core workflow involves two phases:
//!
//! 1. **Indexing**: walk a source root, mapping every exported top-level
//!    symbol to its package's import path. The mapping is cached on disk
//!    next to the workspace and reused until it goes stale.
//! 2. **Fixing**: traverse one parsed compilation unit, insert imports for
//!    qualified references that resolve through the index, and drop imports
//!    nothing references, keeping group ordering intact.
//!
//! Parsing and printing source text stay with the embedding application,
//! reached through the [`UnitParser`] trait; this crate only consumes and
//! mutates the resulting syntax trees.
//!
//! # Example
//!
//! ```
//! use importfix::ast::{CompilationUnit, Decl, Expr, Item};
//! use importfix::{WorkspaceIndex, fix};
//!
//! // Normally loaded via WorkspaceIndex::load(root, false, &parser).
//! let mut index = WorkspaceIndex::default();
//! index.insert("bytes.Buffer", "bytes");
//! index.insert("foo.Widget", "mylib/foo");
//!
//! let mut unit = CompilationUnit::new("app");
//! unit.decls.push(Decl::Item(Item {
//!     name: "Build".to_string(),
//!     body: vec![
//!         Expr::Qualified {
//!             base: Box::new(Expr::Ident("bytes".to_string())),
//!             member: "Buffer".to_string(),
//!         },
//!         Expr::Qualified {
//!             base: Box::new(Expr::Ident("foo".to_string())),
//!             member: "Widget".to_string(),
//!         },
//!     ],
//! }));
//!
//! fix(&mut unit, &index);
//!
//! let paths: Vec<_> = unit.import_paths().collect();
//! assert_eq!(paths, ["bytes", "mylib/foo"]);
//! ```

pub mod ast;
pub mod fixer;
pub mod index;
pub mod stdlib;
pub mod visit;

// Re-export commonly used types at crate root
pub use ast::{CompilationUnit, ImportSpec, UnitParser};
pub use fixer::fix;
pub use index::WorkspaceIndex;
