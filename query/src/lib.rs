//! SQL front-end: the parse-tree model, the resolved query model and the
//! semantic analyzer that bridges the two.
//!
//! The grammar driver that builds the parse tree and the planner that
//! consumes the resolved [`resolved_tree::Query`] live outside this crate;
//! everything between them - name resolution, type inference and coercion,
//! aggregate and group-by validation, expression rewriting - lives here.

pub mod analyzer;
pub mod ast;
pub mod operators;
pub mod resolved_tree;
