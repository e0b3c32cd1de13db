//! Executes a single parsed statement: DML through the analyzer, DDL and
//! administrative statements against the catalog.

use std::sync::Arc;

use log::{debug, info};
use metadata::catalog::{
    CatalogError, ColumnDescriptor, FragmenterType, RefreshOption, SchemaCatalog, StorageOption,
    TableDescriptor,
};
use metadata::consts::{DEFAULT_FRAGMENT_SIZE, DEFAULT_PAGE_SIZE, SYSTEM_DB_NAME};
use metadata::types::Encoding;
use parking_lot::RwLock;
use query::analyzer::Analyzer;
use query::ast::{
    AlterUserStmt, CompressDef, CreateDbStmt, CreateTableStmt, CreateUserStmt, CreateViewStmt,
    DdlStmt, DropDbStmt, DropTableStmt, DropUserStmt, DropViewStmt, Literal, RefreshViewStmt,
    Stmt, TableElement,
};
use query::resolved_tree::Query;

use crate::{ExecutorError, Planner, StatementParser};

/// Result of dispatching one statement.
pub enum StatementOutcome {
    /// A DML statement analyzed into a resolved query for the planner.
    Resolved(Query),
    /// A DDL or administrative statement that mutated the catalog.
    Done,
}

/// Dispatches parsed statements. One instance serves one session; the
/// catalog is shared, the parser and planner are the session's collaborators.
pub struct StatementExecutor<C, P, L>
where
    C: SchemaCatalog,
    P: StatementParser,
    L: Planner,
{
    catalog: Arc<RwLock<C>>,
    analyzer: Analyzer<C>,
    parser: P,
    planner: L,
}

impl<C, P, L> StatementExecutor<C, P, L>
where
    C: SchemaCatalog,
    P: StatementParser,
    L: Planner,
{
    pub fn new(catalog: Arc<RwLock<C>>, parser: P, planner: L) -> Self {
        let analyzer = Analyzer::new(catalog.clone());
        StatementExecutor {
            catalog,
            analyzer,
            parser,
            planner,
        }
    }

    /// Runs one statement to completion.
    pub fn run(&self, stmt: &Stmt) -> Result<StatementOutcome, ExecutorError> {
        match stmt {
            Stmt::Dml(dml) => Ok(StatementOutcome::Resolved(self.analyzer.analyze(dml)?)),
            Stmt::Ddl(ddl) => {
                self.execute(ddl)?;
                Ok(StatementOutcome::Done)
            }
        }
    }

    /// Executes a DDL or administrative statement against the catalog.
    pub fn execute(&self, stmt: &DdlStmt) -> Result<(), ExecutorError> {
        match stmt {
            DdlStmt::CreateTable(s) => self.create_table(s),
            DdlStmt::DropTable(s) => self.drop_table(s),
            DdlStmt::CreateView(s) => self.create_view(s),
            DdlStmt::RefreshView(s) => self.refresh_view(s),
            DdlStmt::DropView(s) => self.drop_view(s),
            DdlStmt::CreateDatabase(s) => self.create_database(s),
            DdlStmt::DropDatabase(s) => self.drop_database(s),
            DdlStmt::CreateUser(s) => self.create_user(s),
            DdlStmt::AlterUser(s) => self.alter_user(s),
            DdlStmt::DropUser(s) => self.drop_user(s),
        }
    }

    fn create_table(&self, stmt: &CreateTableStmt) -> Result<(), ExecutorError> {
        {
            let catalog = self.catalog.read();
            if catalog.table(&stmt.table).is_some() {
                if stmt.if_not_exists {
                    return Ok(());
                }
                return Err(ExecutorError::TableAlreadyExists(stmt.table.clone()));
            }
        }
        let mut columns = Vec::with_capacity(stmt.elements.len());
        for element in &stmt.elements {
            let TableElement::ColumnDef(coldef) = element else {
                return Err(ExecutorError::TableConstraintsNotSupported);
            };
            let notnull = coldef.constraint.as_ref().is_some_and(|c| c.not_null);
            let (compression, comp_param) = match &coldef.compression {
                None => (Encoding::None, 0),
                Some(compress) => resolve_encoding(compress, notnull)?,
            };
            columns.push(ColumnDescriptor {
                table_id: 0,
                column_id: 0,
                column_name: coldef.name.clone(),
                column_type: coldef.ty.with_notnull(notnull),
                compression,
                comp_param,
            });
        }
        let mut td = base_table_descriptor(&stmt.table);
        if let Some(options) = &stmt.storage_options {
            for opt in options {
                if opt.name.eq_ignore_ascii_case("fragment_size") {
                    let &Literal::Int(frag_size) = &opt.value else {
                        return Err(ExecutorError::FragmentSizeNotInt);
                    };
                    if frag_size <= 0 {
                        return Err(ExecutorError::FragmentSizeNotPositive);
                    }
                    td.max_frag_rows = frag_size;
                } else if opt.name.eq_ignore_ascii_case("page_size") {
                    let &Literal::Int(page_size) = &opt.value else {
                        return Err(ExecutorError::PageSizeNotInt);
                    };
                    if page_size <= 0 {
                        return Err(ExecutorError::PageSizeNotPositive);
                    }
                    td.frag_page_size = page_size;
                } else {
                    return Err(ExecutorError::InvalidCreateTableOption(opt.name.clone()));
                }
            }
        }
        self.catalog.write().create_table(td, columns)?;
        info!("created table '{}'", stmt.table);
        Ok(())
    }

    fn drop_table(&self, stmt: &DropTableStmt) -> Result<(), ExecutorError> {
        let td = self.catalog.read().table(&stmt.table);
        let Some(td) = td else {
            if stmt.if_exists {
                return Ok(());
            }
            return Err(ExecutorError::TableNotFound(stmt.table.clone()));
        };
        if td.is_view {
            return Err(ExecutorError::DropTableOnView(stmt.table.clone()));
        }
        self.catalog.write().drop_table(&stmt.table)?;
        info!("dropped table '{}'", stmt.table);
        Ok(())
    }

    fn create_view(&self, stmt: &CreateViewStmt) -> Result<(), ExecutorError> {
        {
            let catalog = self.catalog.read();
            if catalog.table(&stmt.view_name).is_some() {
                if stmt.if_not_exists {
                    return Ok(());
                }
                return Err(ExecutorError::TableOrViewAlreadyExists(
                    stmt.view_name.clone(),
                ));
            }
        }
        let mut storage = StorageOption::Disk;
        let mut refresh = RefreshOption::Manual;
        if let Some(options) = &stmt.matview_options {
            for opt in options {
                if opt.name.eq_ignore_ascii_case("storage") {
                    let Literal::String(value) = &opt.value else {
                        return Err(ExecutorError::StorageOptionNotString);
                    };
                    storage = match value.to_ascii_lowercase().as_str() {
                        // the accelerator tiers share one storage class
                        "gpu" | "mic" => StorageOption::Gpu,
                        "cpu" => StorageOption::Cpu,
                        "disk" => StorageOption::Disk,
                        _ => return Err(ExecutorError::InvalidStorageOption(value.clone())),
                    };
                } else if opt.name.eq_ignore_ascii_case("refresh") {
                    let Literal::String(value) = &opt.value else {
                        return Err(ExecutorError::RefreshOptionNotString);
                    };
                    refresh = match value.to_ascii_lowercase().as_str() {
                        "auto" => RefreshOption::Auto,
                        "manual" => RefreshOption::Manual,
                        "immediate" => RefreshOption::Immediate,
                        _ => return Err(ExecutorError::InvalidRefreshOption(value.clone())),
                    };
                } else {
                    return Err(ExecutorError::InvalidMatViewOption(opt.name.clone()));
                }
            }
        }
        let analyzed = self.analyzer.analyze_view_query(&stmt.query)?;
        let mut tlist = analyzed.targetlist;
        if let Some(column_list) = &stmt.column_list {
            if column_list.len() != tlist.len() {
                return Err(ExecutorError::ViewColumnCountMismatch);
            }
            for (tle, name) in tlist.iter_mut().zip(column_list) {
                tle.resname = name.clone();
            }
        }
        let mut columns = Vec::with_capacity(tlist.len());
        for tle in &tlist {
            if tle.resname.is_empty() {
                return Err(ExecutorError::ViewColumnNameMissing);
            }
            columns.push(ColumnDescriptor {
                table_id: 0,
                column_id: 0,
                column_name: tle.resname.clone(),
                column_type: tle.expr.ty(),
                compression: Encoding::None,
                comp_param: 0,
            });
        }
        let mut td = base_table_descriptor(&stmt.view_name);
        td.is_view = true;
        td.is_materialized = stmt.is_materialized;
        td.view_sql = stmt.query.to_string();
        td.check_option = stmt.checkoption;
        td.storage = storage;
        td.refresh = refresh;
        // a materialized view has no contents until its first refresh
        td.is_ready = !stmt.is_materialized;
        self.catalog.write().create_table(td, columns)?;
        info!(
            "created {}view '{}'",
            if stmt.is_materialized { "materialized " } else { "" },
            stmt.view_name
        );
        Ok(())
    }

    fn refresh_view(&self, stmt: &RefreshViewStmt) -> Result<(), ExecutorError> {
        let td = self.catalog.read().table(&stmt.view_name);
        let Some(td) = td else {
            return Err(ExecutorError::MaterializedViewNotFound(
                stmt.view_name.clone(),
            ));
        };
        if !td.is_view {
            return Err(ExecutorError::RefreshOnTable(stmt.view_name.clone()));
        }
        if !td.is_materialized {
            return Err(ExecutorError::RefreshOnNonMaterialized(
                stmt.view_name.clone(),
            ));
        }
        let refresh_sql = format!("INSERT INTO {} {}", stmt.view_name, td.view_sql);
        let statements = self
            .parser
            .parse(&refresh_sql)
            .map_err(|failure| ExecutorError::InternalSyntaxError(failure.last_parsed))?;
        let Some(Stmt::Dml(dml)) = statements.into_iter().next() else {
            return Err(ExecutorError::InternalViewNotDml);
        };
        let query = self.analyzer.analyze(&dml)?;
        let _plan = self.planner.optimize(&query)?;
        debug!("planned refresh of materialized view '{}'", stmt.view_name);
        // TODO: run the materialization plan and mark the view ready once
        // plan execution lands
        Ok(())
    }

    fn drop_view(&self, stmt: &DropViewStmt) -> Result<(), ExecutorError> {
        let td = self.catalog.read().table(&stmt.view_name);
        let Some(td) = td else {
            if stmt.if_exists {
                return Ok(());
            }
            return Err(ExecutorError::ViewNotFound(stmt.view_name.clone()));
        };
        if !td.is_view {
            return Err(ExecutorError::DropViewOnTable(stmt.view_name.clone()));
        }
        self.catalog.write().drop_table(&stmt.view_name)?;
        info!("dropped view '{}'", stmt.view_name);
        Ok(())
    }

    fn create_database(&self, stmt: &CreateDbStmt) -> Result<(), ExecutorError> {
        let mut catalog = self.catalog.write();
        if catalog.current_database().db_name != SYSTEM_DB_NAME {
            return Err(ExecutorError::NotInSystemDb("create databases"));
        }
        let mut owner_id = catalog.current_user().user_id;
        let system = catalog
            .as_system()
            .ok_or(ExecutorError::InternalNoSystemInterface)?;
        if let Some(options) = &stmt.options {
            for opt in options {
                if opt.name.eq_ignore_ascii_case("owner") {
                    let Literal::String(owner) = &opt.value else {
                        return Err(ExecutorError::OwnerNotString);
                    };
                    let user = system
                        .user(owner)
                        .ok_or_else(|| ExecutorError::UserNotFound(owner.clone()))?;
                    owner_id = user.user_id;
                } else {
                    return Err(ExecutorError::InvalidCreateDbOption(opt.name.clone()));
                }
            }
        }
        system.create_database(&stmt.db_name, owner_id)?;
        info!("created database '{}'", stmt.db_name);
        Ok(())
    }

    fn drop_database(&self, stmt: &DropDbStmt) -> Result<(), ExecutorError> {
        let mut catalog = self.catalog.write();
        if catalog.current_database().db_name != SYSTEM_DB_NAME {
            return Err(ExecutorError::NotInSystemDb("drop databases"));
        }
        let system = catalog
            .as_system()
            .ok_or(ExecutorError::InternalNoSystemInterface)?;
        system.drop_database(&stmt.db_name)?;
        info!("dropped database '{}'", stmt.db_name);
        Ok(())
    }

    fn create_user(&self, stmt: &CreateUserStmt) -> Result<(), ExecutorError> {
        let mut passwd = None;
        let mut is_super = false;
        for opt in &stmt.options {
            if opt.name.eq_ignore_ascii_case("password") {
                let Literal::String(value) = &opt.value else {
                    return Err(ExecutorError::PasswordNotString);
                };
                passwd = Some(value.clone());
            } else if opt.name.eq_ignore_ascii_case("is_super") {
                is_super = parse_is_super(&opt.value)?;
            } else {
                return Err(ExecutorError::InvalidCreateUserOption(opt.name.clone()));
            }
        }
        let passwd = passwd.ok_or(ExecutorError::PasswordRequired)?;
        let mut catalog = self.catalog.write();
        if catalog.current_database().db_name != SYSTEM_DB_NAME {
            return Err(ExecutorError::NotInSystemDb("create users"));
        }
        let system = catalog
            .as_system()
            .ok_or(ExecutorError::InternalNoSystemInterface)?;
        system.create_user(&stmt.user_name, &passwd, is_super)?;
        info!("created user '{}'", stmt.user_name);
        Ok(())
    }

    fn alter_user(&self, stmt: &AlterUserStmt) -> Result<(), ExecutorError> {
        let mut passwd = None;
        let mut is_super = None;
        for opt in &stmt.options {
            if opt.name.eq_ignore_ascii_case("password") {
                let Literal::String(value) = &opt.value else {
                    return Err(ExecutorError::PasswordNotString);
                };
                passwd = Some(value.clone());
            } else if opt.name.eq_ignore_ascii_case("is_super") {
                is_super = Some(parse_is_super(&opt.value)?);
            } else {
                return Err(ExecutorError::InvalidAlterUserOption(opt.name.clone()));
            }
        }
        let mut catalog = self.catalog.write();
        if catalog.current_database().db_name != SYSTEM_DB_NAME {
            return Err(ExecutorError::NotInSystemDb("alter users"));
        }
        let system = catalog
            .as_system()
            .ok_or(ExecutorError::InternalNoSystemInterface)?;
        system
            .alter_user(&stmt.user_name, passwd.as_deref(), is_super)
            .map_err(map_user_not_found)?;
        info!("altered user '{}'", stmt.user_name);
        Ok(())
    }

    fn drop_user(&self, stmt: &DropUserStmt) -> Result<(), ExecutorError> {
        let mut catalog = self.catalog.write();
        if catalog.current_database().db_name != SYSTEM_DB_NAME {
            return Err(ExecutorError::NotInSystemDb("drop users"));
        }
        let system = catalog
            .as_system()
            .ok_or(ExecutorError::InternalNoSystemInterface)?;
        system
            .drop_user(&stmt.user_name)
            .map_err(map_user_not_found)?;
        info!("dropped user '{}'", stmt.user_name);
        Ok(())
    }
}

/// A table descriptor with the defaults every new table and view starts from.
fn base_table_descriptor(name: &str) -> TableDescriptor {
    TableDescriptor {
        table_id: 0,
        table_name: name.into(),
        n_columns: 0,
        is_view: false,
        is_materialized: false,
        view_sql: String::new(),
        storage: StorageOption::Disk,
        refresh: RefreshOption::Manual,
        check_option: false,
        is_ready: true,
        frag_type: FragmenterType::InsertOrder,
        max_frag_rows: DEFAULT_FRAGMENT_SIZE,
        frag_page_size: DEFAULT_PAGE_SIZE,
    }
}

/// The bit-width parameter of fixed and sparse encodings must be a positive
/// multiple of 8, at most 48.
fn valid_bit_width(param: i32) -> bool {
    param > 0 && param % 8 == 0 && param <= 48
}

fn resolve_encoding(
    compress: &CompressDef,
    notnull: bool,
) -> Result<(Encoding, i32), ExecutorError> {
    match compress.encoding_name.to_ascii_lowercase().as_str() {
        "fixed" => {
            if !valid_bit_width(compress.encoding_param) {
                return Err(ExecutorError::InvalidFixedEncodingParam);
            }
            Ok((Encoding::Fixed, compress.encoding_param))
        }
        "rl" => Ok((Encoding::RL, 0)),
        "diff" => Ok((Encoding::Diff, 0)),
        "dict" => Ok((Encoding::Dict, 0)),
        "sparse" => {
            if notnull {
                return Err(ExecutorError::SparseOnNotNullColumn);
            }
            if !valid_bit_width(compress.encoding_param) {
                return Err(ExecutorError::InvalidSparseEncodingParam);
            }
            Ok((Encoding::Sparse, compress.encoding_param))
        }
        _ => Err(ExecutorError::InvalidCompressionScheme(
            compress.encoding_name.clone(),
        )),
    }
}

fn parse_is_super(value: &Literal) -> Result<bool, ExecutorError> {
    let Literal::String(value) = value else {
        return Err(ExecutorError::IsSuperNotString);
    };
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ExecutorError::InvalidIsSuperValue)
    }
}

fn map_user_not_found(err: CatalogError) -> ExecutorError {
    match err {
        CatalogError::UserNotFound(name) => ExecutorError::UserNotFound(name),
        other => ExecutorError::Catalog(other),
    }
}
