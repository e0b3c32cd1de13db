//! System catalog - user and database administration on top of the
//! distinguished system database.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{
    Catalog, CatalogError, ColumnDescriptor, SchemaCatalog, TableDescriptor,
};
use crate::consts::SYSTEM_DB_NAME;

/// Metadata of one database user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub user_id: i32,
    pub user_name: String,
    pub passwd: String,
    pub is_super: bool,
}

/// Metadata of one database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub db_id: i32,
    pub db_name: String,
    /// User id of the owner.
    pub owner: i32,
}

/// Administration of users and databases. Only the system catalog provides
/// this interface; sessions connected to an ordinary database cannot reach it.
pub trait SystemCatalog {
    fn create_database(&mut self, db_name: &str, owner_id: i32) -> Result<(), CatalogError>;

    fn drop_database(&mut self, db_name: &str) -> Result<(), CatalogError>;

    fn create_user(
        &mut self,
        user_name: &str,
        passwd: &str,
        is_super: bool,
    ) -> Result<(), CatalogError>;

    /// Updates the given attributes of a user; `None` leaves an attribute
    /// unchanged.
    fn alter_user(
        &mut self,
        user_name: &str,
        passwd: Option<&str>,
        is_super: Option<bool>,
    ) -> Result<(), CatalogError>;

    fn drop_user(&mut self, user_name: &str) -> Result<(), CatalogError>;

    fn user(&self, user_name: &str) -> Option<UserMetadata>;

    fn database(&self, db_name: &str) -> Option<DatabaseMetadata>;
}

/// Catalog of the system database. Wraps the plain schema catalog of the
/// system database itself and adds the user and database registries.
#[derive(Debug)]
pub struct SysCatalog {
    base: Catalog,
    users: HashMap<String, UserMetadata>,
    databases: HashMap<String, DatabaseMetadata>,
    next_user_id: i32,
    next_db_id: i32,
}

impl SysCatalog {
    /// Creates a system catalog whose only user is the given superuser and
    /// whose only database is the system database itself.
    pub fn new(root: UserMetadata) -> Self {
        let system_db = DatabaseMetadata {
            db_id: 1,
            db_name: SYSTEM_DB_NAME.into(),
            owner: root.user_id,
        };
        let next_user_id = root.user_id + 1;
        let mut users = HashMap::new();
        users.insert(root.user_name.clone(), root.clone());
        let mut databases = HashMap::new();
        databases.insert(system_db.db_name.clone(), system_db.clone());
        SysCatalog {
            base: Catalog::new(system_db, root),
            users,
            databases,
            next_user_id,
            next_db_id: 2,
        }
    }
}

impl SchemaCatalog for SysCatalog {
    fn table(&self, table_name: &str) -> Option<TableDescriptor> {
        self.base.table(table_name)
    }

    fn column(&self, table_id: i32, column_name: &str) -> Option<ColumnDescriptor> {
        self.base.column(table_id, column_name)
    }

    fn column_by_id(&self, table_id: i32, column_id: i32) -> Option<ColumnDescriptor> {
        self.base.column_by_id(table_id, column_id)
    }

    fn table_columns(&self, table_id: i32) -> Vec<ColumnDescriptor> {
        self.base.table_columns(table_id)
    }

    fn create_table(
        &mut self,
        td: TableDescriptor,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<(), CatalogError> {
        self.base.create_table(td, columns)
    }

    fn drop_table(&mut self, table_name: &str) -> Result<(), CatalogError> {
        self.base.drop_table(table_name)
    }

    fn current_database(&self) -> &DatabaseMetadata {
        self.base.current_database()
    }

    fn current_user(&self) -> &UserMetadata {
        self.base.current_user()
    }

    fn as_system(&mut self) -> Option<&mut dyn SystemCatalog> {
        Some(self)
    }
}

impl SystemCatalog for SysCatalog {
    fn create_database(&mut self, db_name: &str, owner_id: i32) -> Result<(), CatalogError> {
        if self.databases.contains_key(db_name) {
            return Err(CatalogError::DatabaseAlreadyExists(db_name.into()));
        }
        let db = DatabaseMetadata {
            db_id: self.next_db_id,
            db_name: db_name.into(),
            owner: owner_id,
        };
        self.next_db_id += 1;
        self.databases.insert(db_name.into(), db);
        Ok(())
    }

    fn drop_database(&mut self, db_name: &str) -> Result<(), CatalogError> {
        self.databases
            .remove(db_name)
            .ok_or_else(|| CatalogError::DatabaseNotFound(db_name.into()))
            .map(|_| ())
    }

    fn create_user(
        &mut self,
        user_name: &str,
        passwd: &str,
        is_super: bool,
    ) -> Result<(), CatalogError> {
        if self.users.contains_key(user_name) {
            return Err(CatalogError::UserAlreadyExists(user_name.into()));
        }
        let user = UserMetadata {
            user_id: self.next_user_id,
            user_name: user_name.into(),
            passwd: passwd.into(),
            is_super,
        };
        self.next_user_id += 1;
        self.users.insert(user_name.into(), user);
        Ok(())
    }

    fn alter_user(
        &mut self,
        user_name: &str,
        passwd: Option<&str>,
        is_super: Option<bool>,
    ) -> Result<(), CatalogError> {
        let user = self
            .users
            .get_mut(user_name)
            .ok_or_else(|| CatalogError::UserNotFound(user_name.into()))?;
        if let Some(passwd) = passwd {
            user.passwd = passwd.into();
        }
        if let Some(is_super) = is_super {
            user.is_super = is_super;
        }
        Ok(())
    }

    fn drop_user(&mut self, user_name: &str) -> Result<(), CatalogError> {
        self.users
            .remove(user_name)
            .ok_or_else(|| CatalogError::UserNotFound(user_name.into()))
            .map(|_| ())
    }

    fn user(&self, user_name: &str) -> Option<UserMetadata> {
        self.users.get(user_name).cloned()
    }

    fn database(&self, db_name: &str) -> Option<DatabaseMetadata> {
        self.databases.get(db_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_user() -> UserMetadata {
        UserMetadata {
            user_id: 1,
            user_name: "root".into(),
            passwd: "root".into(),
            is_super: true,
        }
    }

    #[test]
    fn new_sys_catalog_knows_its_own_database_and_user() {
        // given a fresh system catalog
        let syscat = SysCatalog::new(root_user());

        // then the session database is the system database owned by root
        assert_eq!(syscat.current_database().db_name, SYSTEM_DB_NAME);
        assert_eq!(syscat.current_user().user_name, "root");
        assert!(syscat.database(SYSTEM_DB_NAME).is_some());
        assert!(syscat.user("root").is_some());
    }

    #[test]
    fn create_and_drop_database() {
        // given a system catalog
        let mut syscat = SysCatalog::new(root_user());

        // when creating and then dropping a database
        syscat.create_database("sales", 1).unwrap();
        assert_eq!(syscat.database("sales").unwrap().owner, 1);
        syscat.drop_database("sales").unwrap();

        // then it is gone and a second drop fails
        assert!(syscat.database("sales").is_none());
        assert!(matches!(
            syscat.drop_database("sales").unwrap_err(),
            CatalogError::DatabaseNotFound(_)
        ));
    }

    #[test]
    fn duplicate_database_is_rejected() {
        let mut syscat = SysCatalog::new(root_user());
        syscat.create_database("sales", 1).unwrap();
        assert!(matches!(
            syscat.create_database("sales", 1).unwrap_err(),
            CatalogError::DatabaseAlreadyExists(_)
        ));
    }

    #[test]
    fn create_alter_and_drop_user() {
        // given a system catalog
        let mut syscat = SysCatalog::new(root_user());

        // when creating a user and altering only the password
        syscat.create_user("bob", "hunter2", false).unwrap();
        syscat.alter_user("bob", Some("hunter3"), None).unwrap();

        // then the password changed and the super flag did not
        let bob = syscat.user("bob").unwrap();
        assert_eq!(bob.passwd, "hunter3");
        assert!(!bob.is_super);

        // and altering only the super flag keeps the password
        syscat.alter_user("bob", None, Some(true)).unwrap();
        let bob = syscat.user("bob").unwrap();
        assert_eq!(bob.passwd, "hunter3");
        assert!(bob.is_super);

        syscat.drop_user("bob").unwrap();
        assert!(syscat.user("bob").is_none());
    }

    #[test]
    fn duplicate_user_is_rejected() {
        let mut syscat = SysCatalog::new(root_user());
        syscat.create_user("bob", "pw", false).unwrap();
        assert!(matches!(
            syscat.create_user("bob", "pw", false).unwrap_err(),
            CatalogError::UserAlreadyExists(_)
        ));
    }

    #[test]
    fn alter_unknown_user_fails() {
        let mut syscat = SysCatalog::new(root_user());
        assert!(matches!(
            syscat.alter_user("ghost", Some("x"), None).unwrap_err(),
            CatalogError::UserNotFound(_)
        ));
    }

    #[test]
    fn as_system_exposes_the_admin_interface() {
        // given a system catalog behind the schema interface
        let mut syscat = SysCatalog::new(root_user());
        let schema: &mut dyn SchemaCatalog = &mut syscat;

        // then the admin interface is reachable
        assert!(schema.as_system().is_some());
    }
}
