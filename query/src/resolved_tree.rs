//! Resolved query model - the output of semantic analysis.
//!
//! Every node carries a fully determined [`SqlType`]; widening and
//! conversion are explicit cast wrappers injected by the analyzer, never
//! implicit. Nodes own their children exclusively, so the structural
//! [`Clone`] doubles as the deep copy the `BETWEEN` rewrite needs.

use metadata::catalog::{ColumnDescriptor, SchemaCatalog, TableDescriptor};
use metadata::types::{Encoding, SqlType, TypeKind};

use crate::operators::{AggKind, OpType, Qualifier};

/// A literal value, owned by its enclosing [`ResolvedExpr::Constant`].
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    String(String),
}

/// Statement kind of a resolved [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmtType {
    Select,
    Insert,
    Update,
    Delete,
}

/// Expression nodes after analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedExpr {
    Constant {
        ty: SqlType,
        is_null: bool,
        value: Datum,
    },
    ColumnVar {
        ty: SqlType,
        table_id: i32,
        column_id: i32,
        /// Position of the owning range-table entry in the enclosing query.
        rte_idx: usize,
        compression: Encoding,
        comp_param: i32,
    },
    UOper {
        ty: SqlType,
        op: OpType,
        operand: Box<ResolvedExpr>,
    },
    BinOper {
        ty: SqlType,
        op: OpType,
        qualifier: Qualifier,
        left: Box<ResolvedExpr>,
        right: Box<ResolvedExpr>,
    },
    InValues {
        arg: Box<ResolvedExpr>,
        values: Vec<ResolvedExpr>,
    },
    Like {
        arg: Box<ResolvedExpr>,
        like: Box<ResolvedExpr>,
        escape: Option<Box<ResolvedExpr>>,
    },
    Agg {
        ty: SqlType,
        kind: AggKind,
        arg: Option<Box<ResolvedExpr>>,
        is_distinct: bool,
    },
    Case {
        ty: SqlType,
        when_then: Vec<(ResolvedExpr, ResolvedExpr)>,
        else_expr: Option<Box<ResolvedExpr>>,
    },
}

impl ResolvedExpr {
    /// The type of this expression. `InValues` and `Like` are predicates and
    /// are boolean by construction.
    pub fn ty(&self) -> SqlType {
        match self {
            ResolvedExpr::Constant { ty, .. }
            | ResolvedExpr::ColumnVar { ty, .. }
            | ResolvedExpr::UOper { ty, .. }
            | ResolvedExpr::BinOper { ty, .. }
            | ResolvedExpr::Agg { ty, .. }
            | ResolvedExpr::Case { ty, .. } => *ty,
            ResolvedExpr::InValues { .. } | ResolvedExpr::Like { .. } => {
                SqlType::new(TypeKind::Boolean)
            }
        }
    }

    /// Wraps this expression in an explicit cast to `target`.
    ///
    /// A null constant adopts the target type directly (the null wildcard);
    /// an expression that already has the target type is returned unchanged;
    /// an existing cast wrapper is fused by retargeting it instead of
    /// stacking another one.
    pub fn add_cast(self, target: &SqlType) -> ResolvedExpr {
        match self {
            ResolvedExpr::Constant {
                is_null: true,
                value,
                ..
            } => ResolvedExpr::Constant {
                ty: *target,
                is_null: true,
                value,
            },
            expr if expr.ty() == *target => expr,
            ResolvedExpr::UOper {
                op: OpType::Cast,
                operand,
                ..
            } => ResolvedExpr::UOper {
                ty: *target,
                op: OpType::Cast,
                operand,
            },
            expr => ResolvedExpr::UOper {
                ty: *target,
                op: OpType::Cast,
                operand: Box::new(expr),
            },
        }
    }

    /// Structural deep copy.
    pub fn deep_copy(&self) -> ResolvedExpr {
        self.clone()
    }
}

/// One entry of a query's range table: a named table binding.
#[derive(Debug, Clone)]
pub struct RangeTblEntry {
    pub range_var: String,
    pub table: TableDescriptor,
}

impl RangeTblEntry {
    pub fn new(range_var: impl Into<String>, table: TableDescriptor) -> Self {
        RangeTblEntry {
            range_var: range_var.into(),
            table,
        }
    }

    pub fn table_id(&self) -> i32 {
        self.table.table_id
    }

    /// Looks up a column of the bound table.
    pub fn column_desc<C: SchemaCatalog>(
        &self,
        catalog: &C,
        column_name: &str,
    ) -> Option<ColumnDescriptor> {
        catalog.column(self.table.table_id, column_name)
    }

    /// Appends one target entry per column of the bound table, in catalog
    /// order. Used to expand `*` and `t.*`.
    pub fn expand_star_in_targetlist<C: SchemaCatalog>(
        &self,
        catalog: &C,
        tlist: &mut Vec<TargetEntry>,
        rte_idx: usize,
    ) {
        for cd in catalog.table_columns(self.table.table_id) {
            tlist.push(TargetEntry {
                resname: cd.column_name.clone(),
                expr: ResolvedExpr::ColumnVar {
                    ty: cd.column_type,
                    table_id: cd.table_id,
                    column_id: cd.column_id,
                    rte_idx,
                    compression: cd.compression,
                    comp_param: cd.comp_param,
                },
            });
        }
    }
}

/// One entry of the resolved select list (or INSERT value list).
#[derive(Debug, Clone)]
pub struct TargetEntry {
    pub resname: String,
    pub expr: ResolvedExpr,
}

/// One resolved ORDER BY entry; `tle_no` is a 1-based target-list position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEntry {
    pub tle_no: usize,
    pub is_desc: bool,
    pub nulls_first: bool,
}

/// A fully resolved query, ready for the planner.
#[derive(Debug, Clone)]
pub struct Query {
    pub stmt_type: StmtType,
    pub is_distinct: bool,
    pub rangetable: Vec<RangeTblEntry>,
    pub targetlist: Vec<TargetEntry>,
    pub where_predicate: Option<ResolvedExpr>,
    pub group_by: Option<Vec<ResolvedExpr>>,
    pub having_predicate: Option<ResolvedExpr>,
    pub order_by: Option<Vec<OrderEntry>>,
    pub limit: i64,
    pub offset: i64,
    /// Number of aggregate expressions analyzed into this query.
    pub num_aggs: usize,
    /// Target table of an INSERT.
    pub result_table_id: Option<i32>,
    /// Column ids the INSERT value list maps to, positionally.
    pub result_col_list: Vec<i32>,
    /// Right-hand side of a UNION chain.
    pub next_query: Option<Box<Query>>,
    pub is_unionall: bool,
}

impl Query {
    pub fn new() -> Self {
        Query {
            stmt_type: StmtType::Select,
            is_distinct: false,
            rangetable: Vec::new(),
            targetlist: Vec::new(),
            where_predicate: None,
            group_by: None,
            having_predicate: None,
            order_by: None,
            limit: 0,
            offset: 0,
            num_aggs: 0,
            result_table_id: None,
            result_col_list: Vec::new(),
            next_query: None,
            is_unionall: false,
        }
    }

    /// Appends a range-table entry and returns its index.
    pub fn add_rte(&mut self, rte: RangeTblEntry) -> usize {
        self.rangetable.push(rte);
        self.rangetable.len() - 1
    }

    /// Index of the range-table entry bound to the given range variable.
    pub fn rte_idx(&self, range_var: &str) -> Option<usize> {
        self.rangetable
            .iter()
            .position(|rte| rte.range_var == range_var)
    }

    pub fn rte(&self, idx: usize) -> &RangeTblEntry {
        &self.rangetable[idx]
    }
}

impl Default for Query {
    fn default() -> Self {
        Query::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_const(v: i32) -> ResolvedExpr {
        ResolvedExpr::Constant {
            ty: SqlType::new(TypeKind::Int),
            is_null: false,
            value: Datum::Int(v),
        }
    }

    #[test]
    fn add_cast_is_identity_for_matching_type() {
        // given an INT constant
        let c = int_const(7);

        // when casting to INT
        let cast = c.clone().add_cast(&SqlType::new(TypeKind::Int));

        // then no wrapper is added
        assert_eq!(cast, c);
    }

    #[test]
    fn add_cast_wraps_differing_type() {
        // when casting an INT constant to BIGINT
        let cast = int_const(7).add_cast(&SqlType::new(TypeKind::BigInt));

        // then a cast wrapper with the target type is produced
        match cast {
            ResolvedExpr::UOper { ty, op, operand } => {
                assert_eq!(op, OpType::Cast);
                assert_eq!(ty.kind, TypeKind::BigInt);
                assert_eq!(*operand, int_const(7));
            }
            other => panic!("expected cast wrapper, got: {other:?}"),
        }
    }

    #[test]
    fn add_cast_fuses_existing_wrapper() {
        // given an INT constant already cast to BIGINT
        let once = int_const(7).add_cast(&SqlType::new(TypeKind::BigInt));

        // when casting again to DOUBLE
        let twice = once.add_cast(&SqlType::new(TypeKind::Double));

        // then the wrapper is retargeted instead of stacked
        match twice {
            ResolvedExpr::UOper { ty, op, operand } => {
                assert_eq!(op, OpType::Cast);
                assert_eq!(ty.kind, TypeKind::Double);
                assert_eq!(*operand, int_const(7));
            }
            other => panic!("expected fused cast wrapper, got: {other:?}"),
        }
    }

    #[test]
    fn add_cast_retypes_null_constant_without_wrapping() {
        // given an untyped null constant
        let null = ResolvedExpr::Constant {
            ty: SqlType::new(TypeKind::Null),
            is_null: true,
            value: Datum::Null,
        };

        // when casting to VARCHAR(8)
        let cast = null.add_cast(&SqlType::varchar(8));

        // then the constant itself adopts the type
        match cast {
            ResolvedExpr::Constant { ty, is_null, .. } => {
                assert_eq!(ty, SqlType::varchar(8));
                assert!(is_null);
            }
            other => panic!("expected constant, got: {other:?}"),
        }
    }

    #[test]
    fn deep_copy_is_structural() {
        let expr = ResolvedExpr::BinOper {
            ty: SqlType::new(TypeKind::Boolean),
            op: OpType::Ge,
            qualifier: Qualifier::One,
            left: Box::new(int_const(1)),
            right: Box::new(int_const(2)),
        };
        assert_eq!(expr.deep_copy(), expr);
    }

    #[test]
    fn rte_idx_finds_entries_in_order() {
        let mut query = Query::new();
        let td = TableDescriptor {
            table_id: 1,
            table_name: "t".into(),
            n_columns: 0,
            is_view: false,
            is_materialized: false,
            view_sql: String::new(),
            storage: metadata::catalog::StorageOption::Disk,
            refresh: metadata::catalog::RefreshOption::Manual,
            check_option: false,
            is_ready: true,
            frag_type: metadata::catalog::FragmenterType::InsertOrder,
            max_frag_rows: 0,
            frag_page_size: 0,
        };
        assert_eq!(query.add_rte(RangeTblEntry::new("t", td.clone())), 0);
        assert_eq!(query.add_rte(RangeTblEntry::new("u", td)), 1);
        assert_eq!(query.rte_idx("u"), Some(1));
        assert_eq!(query.rte_idx("missing"), None);
    }
}
