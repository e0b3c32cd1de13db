//! Statement dispatch and DDL/DCL execution.
//!
//! DML statements are handed to the analyzer and come back as resolved
//! queries for the planner; DDL and administrative statements mutate the
//! catalog directly. The grammar driver and the planner are collaborators
//! behind the [`StatementParser`] and [`Planner`] traits.

mod statement_executor;

pub use statement_executor::{StatementExecutor, StatementOutcome};

use metadata::catalog::CatalogError;
use query::analyzer::AnalyzerError;
use query::ast::Stmt;
use query::resolved_tree::Query;
use thiserror::Error;

/// Outcome of a failed parse: the fragment the grammar driver choked on.
#[derive(Debug)]
pub struct ParseFailure {
    pub last_parsed: String,
}

/// The grammar driver. `REFRESH` re-parses the persisted view SQL through
/// this interface.
pub trait StatementParser {
    fn parse(&self, sql: &str) -> Result<Vec<Stmt>, ParseFailure>;
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct PlannerError(pub String);

/// The plan builder consuming fully resolved queries.
pub trait Planner {
    type Plan;

    fn optimize(&self, query: &Query) -> Result<Self::Plan, PlannerError>;
}

/// Error for statement execution. Wraps analysis and catalog failures and
/// adds the DDL/DCL validation failures.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("{0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("{0}")]
    Catalog(#[from] CatalogError),
    #[error("{0}")]
    Planner(#[from] PlannerError),
    #[error("Table {0} already exists.")]
    TableAlreadyExists(String),
    #[error("Table {0} does not exist.")]
    TableNotFound(String),
    #[error("Table constraints are not supported yet.")]
    TableConstraintsNotSupported,
    #[error("Must specify number of bits as 8, 16, 24, 32 or 48 as the parameter to fixed-bits encoding.")]
    InvalidFixedEncodingParam,
    #[error("Cannot do sparse column encoding on a NOT NULL column.")]
    SparseOnNotNullColumn,
    #[error("Must specify number of bits as 8, 16, 24, 32 or 48 as the parameter to sparse-column encoding.")]
    InvalidSparseEncodingParam,
    #[error("Invalid column compression scheme {0}")]
    InvalidCompressionScheme(String),
    #[error("FRAGMENT_SIZE must be an integer literal.")]
    FragmentSizeNotInt,
    #[error("FRAGMENT_SIZE must be a positive number.")]
    FragmentSizeNotPositive,
    #[error("PAGE_SIZE must be an integer literal.")]
    PageSizeNotInt,
    #[error("PAGE_SIZE must be a positive number.")]
    PageSizeNotPositive,
    #[error("Invalid CREATE TABLE option {0}.  Should be FRAGMENT_SIZE or PAGE_SIZE.")]
    InvalidCreateTableOption(String),
    #[error("{0} is a view.  Use DROP VIEW.")]
    DropTableOnView(String),
    #[error("Table or View {0} already exists.")]
    TableOrViewAlreadyExists(String),
    #[error("Storage option must be a string literal.")]
    StorageOptionNotString,
    #[error("Invalid storage option {0}. Should be GPU, MIC, CPU or DISK.")]
    InvalidStorageOption(String),
    #[error("Refresh option must be a string literal.")]
    RefreshOptionNotString,
    #[error("Invalid refresh option {0}. Should be AUTO, MANUAL or IMMEDIATE.")]
    InvalidRefreshOption(String),
    #[error("Invalid CREATE MATERIALIZED VIEW option {0}.  Should be STORAGE or REFRESH.")]
    InvalidMatViewOption(String),
    #[error("Number of column names does not match the number of expressions in SELECT clause.")]
    ViewColumnCountMismatch,
    #[error("Must specify a column name for expression.")]
    ViewColumnNameMissing,
    #[error("Materialized view {0} does not exist.")]
    MaterializedViewNotFound(String),
    #[error("{0} is a table not a materialized view.")]
    RefreshOnTable(String),
    #[error("{0} is not a materialized view.")]
    RefreshOnNonMaterialized(String),
    #[error("View {0} does not exist.")]
    ViewNotFound(String),
    #[error("{0} is a table.  Use DROP TABLE.")]
    DropViewOnTable(String),
    #[error("Must be in the system database to {0}.")]
    NotInSystemDb(&'static str),
    #[error("Owner name must be a string literal.")]
    OwnerNotString,
    #[error("User {0} does not exist.")]
    UserNotFound(String),
    #[error("Invalid CREATE DATABASE option {0}. Only OWNER supported.")]
    InvalidCreateDbOption(String),
    #[error("Password must be a string literal.")]
    PasswordNotString,
    #[error("IS_SUPER option must be a string literal.")]
    IsSuperNotString,
    #[error("Value to IS_SUPER must be TRUE or FALSE.")]
    InvalidIsSuperValue,
    #[error("Invalid CREATE USER option {0}.  Should be PASSWORD or IS_SUPER.")]
    InvalidCreateUserOption(String),
    #[error("Invalid ALTER USER option {0}.  Should be PASSWORD or IS_SUPER.")]
    InvalidAlterUserOption(String),
    #[error("Must have a password for CREATE USER.")]
    PasswordRequired,
    #[error("Internal Error: syntax error at: {0}")]
    InternalSyntaxError(String),
    #[error("Internal Error: view query is not a DML statement.")]
    InternalViewNotDml,
    #[error("Internal Error: system catalog interface not available.")]
    InternalNoSystemInterface,
}
