//! AST module - definition of the parse-tree node families and their
//! canonical SQL stringification.
//!
//! Every node exclusively owns its children; dropping a statement drops the
//! whole tree. The grammar driver builds these nodes; the analyzer consumes
//! them without mutating them.

use std::fmt;

use itertools::Itertools;
use metadata::types::SqlType;

use crate::operators::{OpType, Qualifier};

/// Literal constants as they appear in the parse tree. `FixedPt` keeps the
/// raw digit string so the analyzer can derive precision and scale from it.
#[derive(Debug, Clone)]
pub enum Literal {
    Null,
    String(String),
    Int(i64),
    FixedPt(String),
    Float(f32),
    Double(f64),
    User,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::String(s) => write!(f, "'{s}'"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::FixedPt(s) => write!(f, "{s}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Double(v) => write!(f, "{v}"),
            Literal::User => write!(f, "USER"),
        }
    }
}

/// A column reference. `column == None` is the structural `*` / `t.*` marker,
/// legal only in select-list position.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: Option<String>,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.table, &self.column) {
            (None, Some(c)) => write!(f, "{c}"),
            (Some(t), None) => write!(f, "{t}.*"),
            (Some(t), Some(c)) => write!(f, "{t}.{c}"),
            (None, None) => write!(f, "*"),
        }
    }
}

/// A subquery with its comparison qualifier.
#[derive(Debug, Clone)]
pub struct SubqueryExpr {
    pub qualifier: Qualifier,
    pub query: Box<QuerySpec>,
}

impl fmt::Display for SubqueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier {
            Qualifier::Any => write!(f, "ANY ({})", self.query),
            Qualifier::All => write!(f, "ALL ({})", self.query),
            Qualifier::One => write!(f, "({})", self.query),
        }
    }
}

/// Expression nodes of the parse tree.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    /// Unary when `right` is `None`.
    Oper {
        op: OpType,
        left: Box<Expr>,
        right: Option<Box<Expr>>,
    },
    Subquery(SubqueryExpr),
    IsNull {
        is_not: bool,
        arg: Box<Expr>,
    },
    InValues {
        is_not: bool,
        arg: Box<Expr>,
        values: Vec<Expr>,
    },
    InSubquery {
        is_not: bool,
        arg: Box<Expr>,
        subquery: Box<SubqueryExpr>,
    },
    Between {
        is_not: bool,
        arg: Box<Expr>,
        lower: Box<Expr>,
        upper: Box<Expr>,
    },
    Like {
        is_not: bool,
        arg: Box<Expr>,
        like: Box<Expr>,
        escape: Option<Box<Expr>>,
    },
    Exists {
        query: Box<QuerySpec>,
    },
    ColumnRef(ColumnRef),
    FunctionRef {
        name: String,
        distinct: bool,
        arg: Option<Box<Expr>>,
    },
    Cast {
        arg: Box<Expr>,
        target: SqlType,
    },
    Case {
        when_then: Vec<(Expr, Expr)>,
        else_expr: Option<Box<Expr>>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(l) => write!(f, "{l}"),
            Expr::Oper { op, left, right } => match (op, right) {
                (OpType::UMinus, _) => write!(f, "-({left})"),
                (OpType::Not, _) => write!(f, "NOT ({left})"),
                (op, Some(right)) if op.is_logic() => write!(f, "({left} {op} {right})"),
                (op, Some(right)) => write!(f, "({left}{op}{right})"),
                (op, None) => write!(f, "{op}({left})"),
            },
            Expr::Subquery(sq) => write!(f, "{sq}"),
            Expr::IsNull { is_not, arg } => {
                let not = if *is_not { " NOT" } else { "" };
                write!(f, "{arg} IS{not} NULL")
            }
            Expr::InValues {
                is_not,
                arg,
                values,
            } => {
                let not = if *is_not { " NOT" } else { "" };
                write!(f, "{arg}{not} IN ({})", values.iter().join(", "))
            }
            Expr::InSubquery {
                is_not,
                arg,
                subquery,
            } => {
                let not = if *is_not { " NOT" } else { "" };
                write!(f, "{arg}{not} IN {subquery}")
            }
            Expr::Between {
                is_not,
                arg,
                lower,
                upper,
            } => {
                let not = if *is_not { " NOT" } else { "" };
                write!(f, "{arg}{not} BETWEEN {lower} AND {upper}")
            }
            Expr::Like {
                is_not,
                arg,
                like,
                escape,
            } => {
                let not = if *is_not { " NOT" } else { "" };
                write!(f, "{arg}{not} LIKE {like}")?;
                if let Some(escape) = escape {
                    write!(f, " ESCAPE {escape}")?;
                }
                Ok(())
            }
            Expr::Exists { query } => write!(f, "EXISTS ({query})"),
            Expr::ColumnRef(cr) => write!(f, "{cr}"),
            Expr::FunctionRef {
                name,
                distinct,
                arg,
            } => {
                write!(f, "{name}(")?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                match arg {
                    Some(arg) => write!(f, "{arg})"),
                    None => write!(f, "*)"),
                }
            }
            Expr::Cast { arg, target } => write!(f, "CAST({arg} AS {target})"),
            Expr::Case {
                when_then,
                else_expr,
            } => {
                write!(f, "CASE ")?;
                for (when, then) in when_then {
                    write!(f, "WHEN {when} THEN {then} ")?;
                }
                if let Some(else_expr) = else_expr {
                    write!(f, "ELSE {else_expr}")?;
                }
                write!(f, " END")
            }
        }
    }
}

/// One entry of the FROM clause. A missing range variable means the table
/// name doubles as the range-variable name.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub table_name: String,
    pub range_var: Option<String>,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_name)?;
        if let Some(rv) = &self.range_var {
            write!(f, " {rv}")?;
        }
        Ok(())
    }
}

/// One entry of an explicit select list.
#[derive(Debug, Clone)]
pub struct SelectEntry {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl fmt::Display for SelectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

/// The clause bundle of one SELECT block. A `None` select list means
/// `SELECT *`.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub is_distinct: bool,
    pub select_clause: Option<Vec<SelectEntry>>,
    pub from_clause: Vec<TableRef>,
    pub where_clause: Option<Box<Expr>>,
    pub groupby_clause: Option<Vec<Expr>>,
    pub having_clause: Option<Box<Expr>>,
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.is_distinct {
            write!(f, "DISTINCT ")?;
        }
        match &self.select_clause {
            None => write!(f, "*")?,
            Some(entries) => write!(f, "{}", entries.iter().join(", "))?,
        }
        write!(f, " FROM {}", self.from_clause.iter().join(", "))?;
        if let Some(where_clause) = &self.where_clause {
            write!(f, " WHERE {where_clause}")?;
        }
        if let Some(groupby) = &self.groupby_clause {
            write!(f, " GROUP BY {}", groupby.iter().join(", "))?;
        }
        if let Some(having) = &self.having_clause {
            write!(f, " HAVING {having}")?;
        }
        write!(f, ";")
    }
}

/// A query expression: a single SELECT block or a UNION chain.
#[derive(Debug, Clone)]
pub enum QueryExpr {
    Spec(QuerySpec),
    Union(UnionQuery),
}

#[derive(Debug, Clone)]
pub struct UnionQuery {
    pub is_unionall: bool,
    pub left: Box<QueryExpr>,
    pub right: Box<QueryExpr>,
}

/// One ORDER BY entry. `colno == 0` means the target is named by `column`
/// and must be resolved against the select-list result names; a non-zero
/// `colno` is a 1-based target-list position.
#[derive(Debug, Clone)]
pub struct OrderSpec {
    pub colno: usize,
    pub column: Option<ColumnRef>,
    pub is_desc: bool,
    pub nulls_first: bool,
}

#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub query_expr: QueryExpr,
    pub orderby: Option<Vec<OrderSpec>>,
    pub limit: i64,
    pub offset: i64,
}

/// The table-and-columns part shared by both INSERT forms.
#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table: String,
    pub column_list: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct InsertValuesStmt {
    pub insert: InsertStmt,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct InsertQueryStmt {
    pub insert: InsertStmt,
    pub query: QuerySpec,
}

#[derive(Debug, Clone)]
pub struct UpdateStmt {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<Box<Expr>>,
}

#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub table: String,
    pub where_clause: Option<Box<Expr>>,
}

/// Column compression clause of a column definition.
#[derive(Debug, Clone)]
pub struct CompressDef {
    pub encoding_name: String,
    pub encoding_param: i32,
}

/// Column-level constraint. Only NOT NULL reaches the catalog.
#[derive(Debug, Clone)]
pub struct ColumnConstraintDef {
    pub not_null: bool,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub ty: SqlType,
    pub constraint: Option<ColumnConstraintDef>,
    pub compression: Option<CompressDef>,
}

/// Table-level constraints are parsed but not supported by the executor.
#[derive(Debug, Clone)]
pub enum TableConstraintDef {
    Unique { columns: Vec<String> },
    ForeignKey {
        columns: Vec<String>,
        foreign_table: String,
        foreign_columns: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub enum TableElement {
    ColumnDef(ColumnDef),
    Constraint(TableConstraintDef),
}

/// A `name = value` option as it appears in WITH-style option lists.
#[derive(Debug, Clone)]
pub struct NameValueAssign {
    pub name: String,
    pub value: Literal,
}

#[derive(Debug, Clone)]
pub struct CreateTableStmt {
    pub table: String,
    pub elements: Vec<TableElement>,
    pub if_not_exists: bool,
    pub storage_options: Option<Vec<NameValueAssign>>,
}

#[derive(Debug, Clone)]
pub struct DropTableStmt {
    pub table: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone)]
pub struct CreateViewStmt {
    pub view_name: String,
    pub column_list: Option<Vec<String>>,
    pub query: QuerySpec,
    pub is_materialized: bool,
    pub checkoption: bool,
    pub if_not_exists: bool,
    pub matview_options: Option<Vec<NameValueAssign>>,
}

#[derive(Debug, Clone)]
pub struct RefreshViewStmt {
    pub view_name: String,
}

#[derive(Debug, Clone)]
pub struct DropViewStmt {
    pub view_name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone)]
pub struct CreateDbStmt {
    pub db_name: String,
    pub options: Option<Vec<NameValueAssign>>,
}

#[derive(Debug, Clone)]
pub struct DropDbStmt {
    pub db_name: String,
}

#[derive(Debug, Clone)]
pub struct CreateUserStmt {
    pub user_name: String,
    pub options: Vec<NameValueAssign>,
}

#[derive(Debug, Clone)]
pub struct AlterUserStmt {
    pub user_name: String,
    pub options: Vec<NameValueAssign>,
}

#[derive(Debug, Clone)]
pub struct DropUserStmt {
    pub user_name: String,
}

/// Data-manipulation statements; these analyze into a resolved
/// [`crate::resolved_tree::Query`].
#[derive(Debug, Clone)]
pub enum DmlStmt {
    Select(SelectStmt),
    InsertValues(InsertValuesStmt),
    InsertQuery(InsertQueryStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
}

/// Data-definition and administrative statements; these execute directly
/// against the catalog.
#[derive(Debug, Clone)]
pub enum DdlStmt {
    CreateTable(CreateTableStmt),
    DropTable(DropTableStmt),
    CreateView(CreateViewStmt),
    RefreshView(RefreshViewStmt),
    DropView(DropViewStmt),
    CreateDatabase(CreateDbStmt),
    DropDatabase(DropDbStmt),
    CreateUser(CreateUserStmt),
    AlterUser(AlterUserStmt),
    DropUser(DropUserStmt),
}

/// Root of one parsed statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    Dml(DmlStmt),
    Ddl(DdlStmt),
}
