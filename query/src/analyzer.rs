//! Semantic analysis: binds names against the catalog, infers and coerces
//! types, validates aggregate and group-by usage, and rewrites syntactic
//! sugar (`BETWEEN`, `CASE`) into the resolved expression forms.
//!
//! Clause order inside one SELECT block is load-bearing: FROM populates the
//! range table that SELECT and WHERE resolve against, and the group-by check
//! needs both the target list and the group-by list resolved.

use std::sync::Arc;

use metadata::catalog::SchemaCatalog;
use metadata::types::{SqlType, TypeKind};
use parking_lot::RwLock;
use thiserror::Error;

use crate::ast::{
    ColumnRef, DmlStmt, Expr, InsertQueryStmt, InsertStmt, InsertValuesStmt, Literal, QueryExpr,
    QuerySpec, SelectStmt, UnionQuery,
};
use crate::operators::{AggKind, OpType, Qualifier};
use crate::resolved_tree::{
    Datum, OrderEntry, Query, RangeTblEntry, ResolvedExpr, StmtType, TargetEntry,
};

/// Error for semantic analysis. Any failure abandons the in-progress
/// [`Query`]; no partial result escapes.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Subqueries are not supported yet.")]
    SubqueriesNotSupported,
    #[error("USER literal not supported yet.")]
    UserLiteralNotSupported,
    #[error("UPDATE statement not supported yet.")]
    UpdateNotSupported,
    #[error("DELETE statement not supported yet.")]
    DeleteNotSupported,
    #[error("invalid column name *.")]
    InvalidStarColumn,
    #[error("range variable or table name {0} does not exist.")]
    RangeVarNotFound(String),
    #[error("Column name {0} does not exist.")]
    ColumnNotFound(String),
    #[error("Column name {0} is ambiguous.")]
    ColumnAmbiguous(String),
    #[error("invalid function name: {0}")]
    InvalidFunctionName(String),
    #[error("aggregate function {0} requires an argument.")]
    AggregateRequiresArgument(String),
    #[error("invalid numeric literal: {0}")]
    InvalidNumericLiteral(String),
    #[error("Only boolean expressions can be used after WHEN.")]
    NonBooleanWhen,
    #[error("expressions in THEN clause must be of the same or compatible types.")]
    IncompatibleThenTypes,
    #[error("expressions in ELSE clause must be of the same or compatible types as those in the THEN clauses.")]
    IncompatibleElseType,
    #[error("expression before LIKE must be of a string type.")]
    LikeArgNotString,
    #[error("expression after LIKE must be of a string type.")]
    LikePatternNotString,
    #[error("expression after ESCAPE must be of a string type.")]
    LikeEscapeNotString,
    #[error("Only boolean expressions can be in WHERE clause.")]
    NonBooleanWhere,
    #[error("Only boolean expressions can be in HAVING clause.")]
    NonBooleanHaving,
    #[error("invalid range variable name: {0}")]
    InvalidRangeVar(String),
    #[error("invalid name in order by: {0}")]
    InvalidOrderByName(String),
    #[error("Table {0} does not exist.")]
    TableNotFound(String),
    #[error("Non-materialized view {0} is not supported yet.")]
    NonMaterializedView(String),
    #[error("Insert to views is not supported yet.")]
    InsertToView,
    #[error("Column {0} does not exist.")]
    InsertColumnNotFound(String),
    #[error("Number of values does not match the number of target columns.")]
    ValuesColumnsMismatch,
    #[error("Cannot compare {0} and {1}.")]
    CannotCompare(SqlType, SqlType),
    #[error("Cannot do arithmetic on {0} and {1}.")]
    CannotDoArithmetic(SqlType, SqlType),
    #[error("Operands of {0} must be of boolean type.")]
    NonBooleanLogicOperand(OpType),
    #[error("expressions in SELECT or HAVING clause must be either aggregate functions or columns in GROUP BY clause.")]
    NotInGroupBy,
}

/// [`Analyzer`] turns a parsed DML statement into a resolved [`Query`].
///
/// One `analyze` call holds a single read guard on the catalog, so every
/// lookup inside the statement observes one consistent schema snapshot.
pub struct Analyzer<C: SchemaCatalog> {
    catalog: Arc<RwLock<C>>,
}

impl<C: SchemaCatalog> Analyzer<C> {
    pub fn new(catalog: Arc<RwLock<C>>) -> Self {
        Analyzer { catalog }
    }

    /// Analyzes a DML statement into a resolved [`Query`].
    pub fn analyze(&self, stmt: &DmlStmt) -> Result<Query, AnalyzerError> {
        let catalog = self.catalog.read();
        let mut query = Query::new();
        match stmt {
            DmlStmt::Select(select) => Self::analyze_select(&*catalog, select, &mut query)?,
            DmlStmt::InsertValues(insert) => {
                Self::analyze_insert_values(&*catalog, insert, &mut query)?
            }
            DmlStmt::InsertQuery(insert) => {
                Self::analyze_insert_query(&*catalog, insert, &mut query)?
            }
            DmlStmt::Update(_) => return Err(AnalyzerError::UpdateNotSupported),
            DmlStmt::Delete(_) => return Err(AnalyzerError::DeleteNotSupported),
        }
        Ok(query)
    }

    /// Analyzes a bare SELECT block outside of a full statement. Used for
    /// view definitions, which carry a query spec without ORDER BY or LIMIT.
    pub fn analyze_view_query(&self, spec: &QuerySpec) -> Result<Query, AnalyzerError> {
        let catalog = self.catalog.read();
        let mut query = Query::new();
        Self::analyze_query_spec(&*catalog, spec, &mut query)?;
        Ok(query)
    }

    fn analyze_select(
        catalog: &C,
        stmt: &SelectStmt,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        query.stmt_type = StmtType::Select;
        query.limit = stmt.limit;
        query.offset = stmt.offset;
        Self::analyze_query_expr(catalog, &stmt.query_expr, query)?;
        let Some(orderby) = &stmt.orderby else {
            return Ok(());
        };
        let mut order_by = Vec::with_capacity(orderby.len());
        for spec in orderby {
            let mut tle_no = spec.colno;
            if tle_no == 0 {
                // resolve by name against the target-list result names
                let name = spec
                    .column
                    .as_ref()
                    .and_then(|cr| cr.column.clone())
                    .unwrap_or_default();
                tle_no = query
                    .targetlist
                    .iter()
                    .position(|tle| tle.resname == name)
                    .map(|pos| pos + 1)
                    .ok_or_else(|| AnalyzerError::InvalidOrderByName(name))?;
            }
            order_by.push(OrderEntry {
                tle_no,
                is_desc: spec.is_desc,
                nulls_first: spec.nulls_first,
            });
        }
        query.order_by = Some(order_by);
        Ok(())
    }

    fn analyze_query_expr(
        catalog: &C,
        query_expr: &QueryExpr,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        match query_expr {
            QueryExpr::Spec(spec) => Self::analyze_query_spec(catalog, spec, query),
            QueryExpr::Union(union) => Self::analyze_union(catalog, union, query),
        }
    }

    fn analyze_union(
        catalog: &C,
        union: &UnionQuery,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        Self::analyze_query_expr(catalog, &union.left, query)?;
        let mut right_query = Query::new();
        Self::analyze_query_expr(catalog, &union.right, &mut right_query)?;
        query.next_query = Some(Box::new(right_query));
        query.is_unionall = union.is_unionall;
        Ok(())
    }

    fn analyze_query_spec(
        catalog: &C,
        spec: &QuerySpec,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        query.is_distinct = spec.is_distinct;
        Self::analyze_from_clause(catalog, spec, query)?;
        Self::analyze_select_clause(catalog, spec, query)?;
        Self::analyze_where_clause(catalog, spec, query)?;
        Self::analyze_group_by(catalog, spec, query)?;
        Self::analyze_having_clause(catalog, spec, query)
    }

    fn analyze_from_clause(
        catalog: &C,
        spec: &QuerySpec,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        for table_ref in &spec.from_clause {
            let td = catalog
                .table(&table_ref.table_name)
                .ok_or_else(|| AnalyzerError::TableNotFound(table_ref.table_name.clone()))?;
            if td.is_view && !td.is_materialized {
                return Err(AnalyzerError::NonMaterializedView(
                    table_ref.table_name.clone(),
                ));
            }
            let range_var = table_ref
                .range_var
                .clone()
                .unwrap_or_else(|| table_ref.table_name.clone());
            query.add_rte(RangeTblEntry::new(range_var, td));
        }
        Ok(())
    }

    fn analyze_select_clause(
        catalog: &C,
        spec: &QuerySpec,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        let mut tlist = Vec::new();
        match &spec.select_clause {
            // SELECT *
            None => {
                for rte_idx in 0..query.rangetable.len() {
                    query
                        .rte(rte_idx)
                        .expand_star_in_targetlist(catalog, &mut tlist, rte_idx);
                }
            }
            Some(entries) => {
                for entry in entries {
                    // range_var.* expands that entry only
                    if let Expr::ColumnRef(ColumnRef {
                        table: Some(range_var),
                        column: None,
                    }) = &entry.expr
                    {
                        let rte_idx = query
                            .rte_idx(range_var)
                            .ok_or_else(|| AnalyzerError::InvalidRangeVar(range_var.clone()))?;
                        query
                            .rte(rte_idx)
                            .expand_star_in_targetlist(catalog, &mut tlist, rte_idx);
                        continue;
                    }
                    let e = Self::analyze_expr(catalog, &entry.expr, query)?;
                    let resname = if let Some(alias) = &entry.alias {
                        alias.clone()
                    } else if let ResolvedExpr::ColumnVar {
                        table_id,
                        column_id,
                        ..
                    } = &e
                    {
                        catalog
                            .column_by_id(*table_id, *column_id)
                            .map(|cd| cd.column_name)
                            .unwrap_or_default()
                    } else {
                        String::new()
                    };
                    tlist.push(TargetEntry { resname, expr: e });
                }
            }
        }
        query.targetlist = tlist;
        Ok(())
    }

    fn analyze_where_clause(
        catalog: &C,
        spec: &QuerySpec,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        let Some(where_clause) = &spec.where_clause else {
            return Ok(());
        };
        let p = Self::analyze_expr(catalog, where_clause, query)?;
        if p.ty().kind != TypeKind::Boolean {
            return Err(AnalyzerError::NonBooleanWhere);
        }
        query.where_predicate = Some(p);
        Ok(())
    }

    fn analyze_group_by(
        catalog: &C,
        spec: &QuerySpec,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        let mut groupby = None;
        if let Some(exprs) = &spec.groupby_clause {
            let mut resolved = Vec::with_capacity(exprs.len());
            for e in exprs {
                resolved.push(Self::analyze_expr(catalog, e, query)?);
            }
            groupby = Some(resolved);
        }
        if query.num_aggs > 0 || groupby.is_some() {
            for tle in &query.targetlist {
                if !matches!(tle.expr, ResolvedExpr::Agg { .. }) {
                    check_group_by(&tle.expr, groupby.as_deref())?;
                }
            }
        }
        query.group_by = groupby;
        Ok(())
    }

    fn analyze_having_clause(
        catalog: &C,
        spec: &QuerySpec,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        let Some(having) = &spec.having_clause else {
            return Ok(());
        };
        let p = Self::analyze_expr(catalog, having, query)?;
        if p.ty().kind != TypeKind::Boolean {
            return Err(AnalyzerError::NonBooleanHaving);
        }
        check_group_by(&p, query.group_by.as_deref())?;
        query.having_predicate = Some(p);
        Ok(())
    }

    fn analyze_insert(
        catalog: &C,
        insert: &InsertStmt,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        query.stmt_type = StmtType::Insert;
        let td = catalog
            .table(&insert.table)
            .ok_or_else(|| AnalyzerError::TableNotFound(insert.table.clone()))?;
        if td.is_view && !td.is_materialized {
            return Err(AnalyzerError::InsertToView);
        }
        query.result_table_id = Some(td.table_id);
        query.result_col_list = match &insert.column_list {
            None => catalog
                .table_columns(td.table_id)
                .iter()
                .map(|cd| cd.column_id)
                .collect(),
            Some(columns) => {
                let mut col_list = Vec::with_capacity(columns.len());
                for c in columns {
                    let cd = catalog
                        .column(td.table_id, c)
                        .ok_or_else(|| AnalyzerError::InsertColumnNotFound(c.clone()))?;
                    col_list.push(cd.column_id);
                }
                col_list
            }
        };
        Ok(())
    }

    fn analyze_insert_values(
        catalog: &C,
        stmt: &InsertValuesStmt,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        Self::analyze_insert(catalog, &stmt.insert, query)?;
        if stmt.values.len() != query.result_col_list.len() {
            return Err(AnalyzerError::ValuesColumnsMismatch);
        }
        let table_id = query
            .result_table_id
            .expect("insert analysis left no result table");
        let col_list = query.result_col_list.clone();
        for (value, column_id) in stmt.values.iter().zip(col_list) {
            let e = Self::analyze_expr(catalog, value, query)?;
            let cd = catalog
                .column_by_id(table_id, column_id)
                .expect("result column list out of sync with catalog");
            query.targetlist.push(TargetEntry {
                resname: String::new(),
                expr: e.add_cast(&cd.column_type),
            });
        }
        Ok(())
    }

    fn analyze_insert_query(
        catalog: &C,
        stmt: &InsertQueryStmt,
        query: &mut Query,
    ) -> Result<(), AnalyzerError> {
        Self::analyze_insert(catalog, &stmt.insert, query)?;
        Self::analyze_query_spec(catalog, &stmt.query, query)
    }

    fn analyze_expr(
        catalog: &C,
        expr: &Expr,
        query: &mut Query,
    ) -> Result<ResolvedExpr, AnalyzerError> {
        match expr {
            Expr::Literal(literal) => Self::analyze_literal(literal),
            Expr::Oper { op, left, right } => {
                Self::analyze_oper(catalog, *op, left, right.as_deref(), query)
            }
            Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. } => {
                Err(AnalyzerError::SubqueriesNotSupported)
            }
            Expr::IsNull { is_not, arg } => {
                let arg_expr = Self::analyze_expr(catalog, arg, query)?;
                let result = ResolvedExpr::UOper {
                    ty: SqlType::new(TypeKind::Boolean),
                    op: OpType::IsNull,
                    operand: Box::new(arg_expr),
                };
                Ok(negate_if(result, *is_not))
            }
            Expr::InValues {
                is_not,
                arg,
                values,
            } => Self::analyze_in_values(catalog, *is_not, arg, values, query),
            Expr::Between {
                is_not,
                arg,
                lower,
                upper,
            } => Self::analyze_between(catalog, *is_not, arg, lower, upper, query),
            Expr::Like {
                is_not,
                arg,
                like,
                escape,
            } => Self::analyze_like(catalog, *is_not, arg, like, escape.as_deref(), query),
            Expr::ColumnRef(cr) => Self::analyze_column_ref(catalog, cr, query),
            Expr::FunctionRef {
                name,
                distinct,
                arg,
            } => Self::analyze_function_ref(catalog, name, *distinct, arg.as_deref(), query),
            Expr::Cast { arg, target } => {
                let arg_expr = Self::analyze_expr(catalog, arg, query)?;
                let ti = target.with_notnull(arg_expr.ty().notnull);
                Ok(arg_expr.add_cast(&ti))
            }
            Expr::Case {
                when_then,
                else_expr,
            } => Self::analyze_case(catalog, when_then, else_expr.as_deref(), query),
        }
    }

    fn analyze_literal(literal: &Literal) -> Result<ResolvedExpr, AnalyzerError> {
        match literal {
            Literal::Null => Ok(ResolvedExpr::Constant {
                ty: SqlType::new(TypeKind::Null),
                is_null: true,
                value: Datum::Null,
            }),
            Literal::String(s) => Ok(ResolvedExpr::Constant {
                ty: SqlType::varchar(s.len() as i32),
                is_null: false,
                value: Datum::String(s.clone()),
            }),
            Literal::Int(v) => Ok(Self::analyze_int_literal(*v)),
            Literal::FixedPt(text) => Self::analyze_fixedpt_literal(text),
            Literal::Float(v) => Ok(ResolvedExpr::Constant {
                ty: SqlType::new(TypeKind::Float),
                is_null: false,
                value: Datum::Float(*v),
            }),
            Literal::Double(v) => Ok(ResolvedExpr::Constant {
                ty: SqlType::new(TypeKind::Double),
                is_null: false,
                value: Datum::Double(*v),
            }),
            Literal::User => Err(AnalyzerError::UserLiteralNotSupported),
        }
    }

    /// Picks the narrowest integer type that fits the value.
    fn analyze_int_literal(v: i64) -> ResolvedExpr {
        if v >= i16::MIN as i64 && v <= i16::MAX as i64 {
            ResolvedExpr::Constant {
                ty: SqlType::new(TypeKind::SmallInt),
                is_null: false,
                value: Datum::SmallInt(v as i16),
            }
        } else if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
            ResolvedExpr::Constant {
                ty: SqlType::new(TypeKind::Int),
                is_null: false,
                value: Datum::Int(v as i32),
            }
        } else {
            ResolvedExpr::Constant {
                ty: SqlType::new(TypeKind::BigInt),
                is_null: false,
                value: Datum::BigInt(v),
            }
        }
    }

    /// Parses `"<integral>.<fraction>"` into a NUMERIC constant whose scale
    /// is the fraction length and whose value is `integral*10^scale +
    /// fraction`, stored in a 64-bit datum.
    fn analyze_fixedpt_literal(text: &str) -> Result<ResolvedExpr, AnalyzerError> {
        let invalid = || AnalyzerError::InvalidNumericLiteral(text.into());
        let (integral, fraction) = text.split_once('.').unwrap_or((text, ""));
        let scale = fraction.len() as i32;
        let dimension = integral.len() as i32 + scale;
        let mut value: i64 = integral.parse().map_err(|_| invalid())?;
        for _ in 0..scale {
            value = value.checked_mul(10).ok_or_else(invalid)?;
        }
        if !fraction.is_empty() {
            let fraction: i64 = fraction.parse().map_err(|_| invalid())?;
            value = value.checked_add(fraction).ok_or_else(invalid)?;
        }
        Ok(ResolvedExpr::Constant {
            ty: SqlType::numeric(dimension, scale),
            is_null: false,
            value: Datum::BigInt(value),
        })
    }

    fn analyze_oper(
        catalog: &C,
        op: OpType,
        left: &Expr,
        right: Option<&Expr>,
        query: &mut Query,
    ) -> Result<ResolvedExpr, AnalyzerError> {
        let left_expr = Self::analyze_expr(catalog, left, query)?;
        let left_type = left_expr.ty();
        let Some(right) = right else {
            return Ok(ResolvedExpr::UOper {
                ty: left_type,
                op,
                operand: Box::new(left_expr),
            });
        };
        let qualifier = match right {
            Expr::Subquery(subquery) => subquery.qualifier,
            _ => Qualifier::One,
        };
        let right_expr = Self::analyze_expr(catalog, right, query)?;
        let right_type = right_expr.ty();
        let (result_type, new_left, new_right) = analyze_binop_types(op, &left_type, &right_type)?;
        let left_expr = if left_type != new_left {
            left_expr.add_cast(&new_left)
        } else {
            left_expr
        };
        let right_expr = if right_type != new_right {
            right_expr.add_cast(&new_right)
        } else {
            right_expr
        };
        Ok(ResolvedExpr::BinOper {
            ty: result_type,
            op,
            qualifier,
            left: Box::new(left_expr),
            right: Box::new(right_expr),
        })
    }

    fn analyze_in_values(
        catalog: &C,
        is_not: bool,
        arg: &Expr,
        values: &[Expr],
        query: &mut Query,
    ) -> Result<ResolvedExpr, AnalyzerError> {
        let arg_expr = Self::analyze_expr(catalog, arg, query)?;
        let arg_type = arg_expr.ty();
        let mut value_exprs = Vec::with_capacity(values.len());
        for value in values {
            let e = Self::analyze_expr(catalog, value, query)?;
            value_exprs.push(e.add_cast(&arg_type));
        }
        let result = ResolvedExpr::InValues {
            arg: Box::new(arg_expr),
            values: value_exprs,
        };
        Ok(negate_if(result, is_not))
    }

    /// Rewrites `arg BETWEEN lower AND upper` into `arg >= lower AND arg <=
    /// upper`. The argument appears in both predicates, so the upper one
    /// works on a deep copy.
    fn analyze_between(
        catalog: &C,
        is_not: bool,
        arg: &Expr,
        lower: &Expr,
        upper: &Expr,
        query: &mut Query,
    ) -> Result<ResolvedExpr, AnalyzerError> {
        let arg_expr = Self::analyze_expr(catalog, arg, query)?;
        let lower_expr = Self::analyze_expr(catalog, lower, query)?;
        let upper_expr = Self::analyze_expr(catalog, upper, query)?;
        let arg_type = arg_expr.ty();
        let lower_type = lower_expr.ty();
        let boolean = SqlType::new(TypeKind::Boolean);

        let (_, new_left, new_right) = analyze_binop_types(OpType::Ge, &arg_type, &lower_type)?;
        let arg_copy = arg_expr.deep_copy();
        let lower_pred = ResolvedExpr::BinOper {
            ty: boolean,
            op: OpType::Ge,
            qualifier: Qualifier::One,
            left: Box::new(arg_expr.add_cast(&new_left)),
            right: Box::new(lower_expr.add_cast(&new_right)),
        };
        // TODO: the upper bound's coercion is derived from the lower bound's
        // type; it should be computed against upper_expr's type instead.
        let (_, new_left, new_right) = analyze_binop_types(OpType::Le, &arg_type, &lower_type)?;
        let upper_pred = ResolvedExpr::BinOper {
            ty: boolean,
            op: OpType::Le,
            qualifier: Qualifier::One,
            left: Box::new(arg_copy.add_cast(&new_left)),
            right: Box::new(upper_expr.add_cast(&new_right)),
        };
        let result = ResolvedExpr::BinOper {
            ty: boolean,
            op: OpType::And,
            qualifier: Qualifier::One,
            left: Box::new(lower_pred),
            right: Box::new(upper_pred),
        };
        Ok(negate_if(result, is_not))
    }

    fn analyze_like(
        catalog: &C,
        is_not: bool,
        arg: &Expr,
        like: &Expr,
        escape: Option<&Expr>,
        query: &mut Query,
    ) -> Result<ResolvedExpr, AnalyzerError> {
        let arg_expr = Self::analyze_expr(catalog, arg, query)?;
        let like_expr = Self::analyze_expr(catalog, like, query)?;
        let escape_expr = escape
            .map(|e| Self::analyze_expr(catalog, e, query))
            .transpose()?;
        if !arg_expr.ty().is_string() {
            return Err(AnalyzerError::LikeArgNotString);
        }
        if !like_expr.ty().is_string() {
            return Err(AnalyzerError::LikePatternNotString);
        }
        if let Some(escape_expr) = &escape_expr {
            if !escape_expr.ty().is_string() {
                return Err(AnalyzerError::LikeEscapeNotString);
            }
        }
        let result = ResolvedExpr::Like {
            arg: Box::new(arg_expr),
            like: Box::new(like_expr),
            escape: escape_expr.map(Box::new),
        };
        Ok(negate_if(result, is_not))
    }

    fn analyze_column_ref(
        catalog: &C,
        cr: &ColumnRef,
        query: &mut Query,
    ) -> Result<ResolvedExpr, AnalyzerError> {
        // the `*` marker is only legal in select-list position, which is
        // handled before expression analysis
        let Some(column) = &cr.column else {
            return Err(AnalyzerError::InvalidStarColumn);
        };
        let (cd, rte_idx, table_id) = if let Some(table) = &cr.table {
            let rte_idx = query
                .rte_idx(table)
                .ok_or_else(|| AnalyzerError::RangeVarNotFound(table.clone()))?;
            let rte = query.rte(rte_idx);
            let cd = rte
                .column_desc(catalog, column)
                .ok_or_else(|| AnalyzerError::ColumnNotFound(column.clone()))?;
            (cd, rte_idx, rte.table_id())
        } else {
            // exactly one range-table entry may contain the column
            let mut found: Option<(_, usize, i32)> = None;
            for (idx, rte) in query.rangetable.iter().enumerate() {
                if let Some(cd) = rte.column_desc(catalog, column) {
                    if found.is_some() {
                        return Err(AnalyzerError::ColumnAmbiguous(column.clone()));
                    }
                    found = Some((cd, idx, rte.table_id()));
                }
            }
            found.ok_or_else(|| AnalyzerError::ColumnNotFound(column.clone()))?
        };
        Ok(ResolvedExpr::ColumnVar {
            ty: cd.column_type,
            table_id,
            column_id: cd.column_id,
            rte_idx,
            compression: cd.compression,
            comp_param: cd.comp_param,
        })
    }

    fn analyze_function_ref(
        catalog: &C,
        name: &str,
        distinct: bool,
        arg: Option<&Expr>,
        query: &mut Query,
    ) -> Result<ResolvedExpr, AnalyzerError> {
        let mut is_distinct = false;
        let (kind, result_type, arg_expr) = match name.to_ascii_lowercase().as_str() {
            "count" => {
                let arg_expr = arg
                    .map(|a| Self::analyze_expr(catalog, a, query))
                    .transpose()?;
                is_distinct = distinct;
                (AggKind::Count, SqlType::new(TypeKind::BigInt), arg_expr)
            }
            "min" | "max" | "avg" | "sum" => {
                let kind = match name.to_ascii_lowercase().as_str() {
                    "min" => AggKind::Min,
                    "max" => AggKind::Max,
                    "avg" => AggKind::Avg,
                    _ => AggKind::Sum,
                };
                let arg = arg.ok_or_else(|| {
                    AnalyzerError::AggregateRequiresArgument(name.to_string())
                })?;
                let arg_expr = Self::analyze_expr(catalog, arg, query)?;
                let result_type = arg_expr.ty();
                (kind, result_type, Some(arg_expr))
            }
            _ => return Err(AnalyzerError::InvalidFunctionName(name.to_string())),
        };
        query.num_aggs += 1;
        Ok(ResolvedExpr::Agg {
            ty: result_type,
            kind,
            arg: arg_expr.map(Box::new),
            is_distinct,
        })
    }

    fn analyze_case(
        catalog: &C,
        when_then: &[(Expr, Expr)],
        else_expr: Option<&Expr>,
        query: &mut Query,
    ) -> Result<ResolvedExpr, AnalyzerError> {
        let mut ti = SqlType::new(TypeKind::Null);
        let mut pairs = Vec::with_capacity(when_then.len());
        for (when, then) in when_then {
            let e1 = Self::analyze_expr(catalog, when, query)?;
            if e1.ty().kind != TypeKind::Boolean {
                return Err(AnalyzerError::NonBooleanWhen);
            }
            let e2 = Self::analyze_expr(catalog, then, query)?;
            let then_ty = e2.ty();
            if ti.is_null() {
                ti = then_ty;
            } else if then_ty.is_null() {
                // the null branch adopts the running type in the cast pass
            } else if ti != then_ty {
                if ti.is_string() && then_ty.is_string() {
                    ti = SqlType::common_string(&ti, &then_ty);
                } else if ti.is_number() && then_ty.is_number() {
                    ti = SqlType::common_numeric(&ti, &then_ty);
                } else {
                    return Err(AnalyzerError::IncompatibleThenTypes);
                }
            }
            pairs.push((e1, e2));
        }
        let mut else_e = None;
        if let Some(else_expr) = else_expr {
            let e = Self::analyze_expr(catalog, else_expr, query)?;
            let else_ty = e.ty();
            if !else_ty.is_null() && ti != else_ty {
                if ti.is_string() && else_ty.is_string() {
                    ti = SqlType::common_string(&ti, &else_ty);
                } else if ti.is_number() && else_ty.is_number() {
                    ti = SqlType::common_numeric(&ti, &else_ty);
                } else {
                    return Err(AnalyzerError::IncompatibleElseType);
                }
            }
            else_e = Some(e);
        }
        // final pass: every branch ends up with the common type
        let pairs = pairs
            .into_iter()
            .map(|(when, then)| (when, then.add_cast(&ti)))
            .collect();
        let else_e = else_e.map(|e| e.add_cast(&ti));
        Ok(ResolvedExpr::Case {
            ty: ti,
            when_then: pairs,
            else_expr: else_e.map(Box::new),
        })
    }
}

/// Wraps a boolean predicate in `NOT` when `is_not` is set.
fn negate_if(expr: ResolvedExpr, is_not: bool) -> ResolvedExpr {
    if is_not {
        ResolvedExpr::UOper {
            ty: SqlType::new(TypeKind::Boolean),
            op: OpType::Not,
            operand: Box::new(expr),
        }
    } else {
        expr
    }
}

/// Computes `(result type, left target type, right target type)` for a
/// binary operator. The caller casts either operand whose current type
/// differs from its target.
fn analyze_binop_types(
    op: OpType,
    left: &SqlType,
    right: &SqlType,
) -> Result<(SqlType, SqlType, SqlType), AnalyzerError> {
    if op.is_logic() {
        if left.kind != TypeKind::Boolean || right.kind != TypeKind::Boolean {
            return Err(AnalyzerError::NonBooleanLogicOperand(op));
        }
        let result = SqlType::new(TypeKind::Boolean).with_notnull(left.notnull && right.notnull);
        return Ok((result, *left, *right));
    }
    if op.is_comparison() {
        let (new_left, new_right) = coerce_pair(left, right)
            .ok_or(AnalyzerError::CannotCompare(*left, *right))?;
        let result =
            SqlType::new(TypeKind::Boolean).with_notnull(new_left.notnull && new_right.notnull);
        return Ok((result, new_left, new_right));
    }
    debug_assert!(op.is_arithmetic());
    let (new_left, new_right) = if left.is_null() {
        (right.with_notnull(false), *right)
    } else if right.is_null() {
        (*left, left.with_notnull(false))
    } else if left.is_number() && right.is_number() {
        let common = SqlType::common_numeric(left, right);
        (common, common)
    } else {
        return Err(AnalyzerError::CannotDoArithmetic(*left, *right));
    };
    let result = if new_left.notnull && new_right.notnull {
        new_left
    } else {
        new_left.with_notnull(false)
    };
    Ok((result, new_left, new_right))
}

/// Coercion targets for comparing two types; `None` when they are not
/// comparable. The null wildcard adopts the other side.
fn coerce_pair(left: &SqlType, right: &SqlType) -> Option<(SqlType, SqlType)> {
    if left.is_null() && right.is_null() {
        return None;
    }
    if left.is_null() {
        return Some((right.with_notnull(false), *right));
    }
    if right.is_null() {
        return Some((*left, left.with_notnull(false)));
    }
    if left.is_number() && right.is_number() {
        let common = SqlType::common_numeric(left, right);
        return Some((common, common));
    }
    if left.is_string() && right.is_string() {
        let common = SqlType::common_string(left, right);
        return Some((common, common));
    }
    if left.kind == right.kind {
        return Some((*left, *right));
    }
    None
}

/// Demands that every column variable reachable from `expr` either appears
/// verbatim in the group-by list or sits inside an aggregate.
fn check_group_by(
    expr: &ResolvedExpr,
    group_by: Option<&[ResolvedExpr]>,
) -> Result<(), AnalyzerError> {
    match expr {
        ResolvedExpr::ColumnVar { .. } => {
            let grouped = group_by.is_some_and(|g| g.iter().any(|e| e == expr));
            if grouped {
                Ok(())
            } else {
                Err(AnalyzerError::NotInGroupBy)
            }
        }
        // aggregates shield their arguments
        ResolvedExpr::Agg { .. } => Ok(()),
        ResolvedExpr::Constant { .. } => Ok(()),
        ResolvedExpr::UOper { operand, .. } => check_group_by(operand, group_by),
        ResolvedExpr::BinOper { left, right, .. } => {
            check_group_by(left, group_by)?;
            check_group_by(right, group_by)
        }
        ResolvedExpr::InValues { arg, values } => {
            check_group_by(arg, group_by)?;
            values.iter().try_for_each(|v| check_group_by(v, group_by))
        }
        ResolvedExpr::Like { arg, like, escape } => {
            check_group_by(arg, group_by)?;
            check_group_by(like, group_by)?;
            escape
                .as_deref()
                .map_or(Ok(()), |e| check_group_by(e, group_by))
        }
        ResolvedExpr::Case {
            when_then,
            else_expr,
            ..
        } => {
            for (when, then) in when_then {
                check_group_by(when, group_by)?;
                check_group_by(then, group_by)?;
            }
            else_expr
                .as_deref()
                .map_or(Ok(()), |e| check_group_by(e, group_by))
        }
    }
}
