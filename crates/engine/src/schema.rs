//! Schema evolution
//!
//! The primary table starts with only the `date` identity column. A field
//! seen for the first time gets a column whose declared type is the storage
//! type the registry associates with the value's kind. Columns are never
//! altered or dropped afterwards; only [`SchemaManager::recreate_table`]
//! starts over.

use crate::registry::TypeRegistry;
use juntdb_core::{Error, Record, Result, SemanticKind, Value, IDENTITY_FIELD};
use rusqlite::Connection;
use tracing::info;

/// One column of the primary table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name as declared
    pub name: String,
    /// Declared storage type
    pub storage_type: String,
    /// Kind the registry maps the storage type to, if any
    pub kind: Option<SemanticKind>,
}

impl Column {
    /// True for the `date` identity column
    pub fn is_identity(&self) -> bool {
        self.name.eq_ignore_ascii_case(IDENTITY_FIELD)
    }
}

/// A column that must be added before a record can be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAddition {
    /// New column name
    pub name: String,
    /// Storage type it will be declared with
    pub storage_type: String,
}

/// Reads and evolves the primary table's columns
#[derive(Debug, Clone, Copy)]
pub struct SchemaManager<'a> {
    registry: &'a TypeRegistry,
    table: &'a str,
}

impl<'a> SchemaManager<'a> {
    /// Manager for `table`, typed through `registry`
    pub fn new(registry: &'a TypeRegistry, table: &'a str) -> Self {
        SchemaManager { registry, table }
    }

    /// Create the primary table if missing
    pub fn ensure_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY)",
            quote_ident(self.table),
            quote_ident(IDENTITY_FIELD)
        ))
        .map_err(Error::storage)
    }

    /// Drop the primary table and recreate it with only the identity column
    pub fn recreate_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(self.table)))
            .map_err(Error::storage)?;
        self.ensure_table(conn)
    }

    /// Current columns in declaration order
    pub fn columns(&self, conn: &Connection) -> Result<Vec<Column>> {
        let mut stmt = conn
            .prepare_cached("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(Error::storage)?;
        let rows = stmt
            .query_map([self.table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(Error::storage)?;

        let mut columns = Vec::new();
        for row in rows {
            let (name, storage_type) = row.map_err(Error::storage)?;
            let kind = self.registry.kind_for_storage(&storage_type);
            columns.push(Column {
                name,
                storage_type,
                kind,
            });
        }
        Ok(columns)
    }

    /// Column additions needed before `record` can be written
    ///
    /// Every new column is resolved before anything is returned, so an
    /// unsupported field fails the whole record. Values headed for existing
    /// columns must match the column's kind; `Null` fits any column and
    /// integers fit floating columns.
    pub fn reconcile(&self, existing: &[Column], record: &Record) -> Result<Vec<ColumnAddition>> {
        let mut additions: Vec<ColumnAddition> = Vec::new();
        for (name, value) in record.data_fields() {
            if name.is_empty() {
                return Err(Error::invalid_input("field names must not be empty"));
            }
            match existing.iter().find(|c| c.name.eq_ignore_ascii_case(name)) {
                Some(column) => check_fits(column, value)?,
                None => {
                    let storage_type = self.registry.resolve(name, value)?;
                    additions.push(ColumnAddition {
                        name: name.to_string(),
                        storage_type: storage_type.to_string(),
                    });
                }
            }
        }
        Ok(additions)
    }

    /// Issue `ALTER TABLE ... ADD COLUMN` for each addition
    pub fn apply(&self, conn: &Connection, additions: &[ColumnAddition]) -> Result<()> {
        for addition in additions {
            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                quote_ident(self.table),
                quote_ident(&addition.name),
                addition.storage_type
            ))
            .map_err(Error::storage)?;
            info!(
                target: "juntdb::schema",
                table = self.table,
                column = %addition.name,
                storage_type = %addition.storage_type,
                "added column"
            );
        }
        Ok(())
    }
}

fn check_fits(column: &Column, value: &Value) -> Result<()> {
    let Some(kind) = column.kind else {
        return Ok(());
    };
    let fits = match value.kind() {
        SemanticKind::Null => true,
        SemanticKind::Integer => matches!(
            kind,
            SemanticKind::Integer | SemanticKind::Real | SemanticKind::Float64
        ),
        other => other == kind,
    };
    if fits {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "column '{}' stores {} values, got {}",
            column.name,
            kind,
            value.kind()
        )))
    }
}

/// Quote an SQL identifier, doubling embedded quotes
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
