//! Record store: upsert, delete, compact, reset
//!
//! ## Write protocol
//!
//! 1. Validate the record's identity
//! 2. Encode every value through the registry
//! 3. `BEGIN IMMEDIATE` (retried while another writer holds the lock)
//! 4. Reconcile the schema and issue any `ADD COLUMN`
//! 5. Insert, regenerating the identity on primary-key collision, or
//!    update in place
//! 6. `COMMIT` (retried on transient failure)
//!
//! Steps 3 to 6 are one transaction, so a failure anywhere leaves neither
//! new columns nor a partial row behind.

use crate::database::transactions::{is_identity_collision, retry_transient, WriteTxn};
use crate::schema::quote_ident;
use crate::session::Session;
use juntdb_core::{Error, Identity, Record, Result, IDENTITY_FIELD};
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use tracing::{debug, info, trace};

/// Identities bound per `DELETE ... IN (...)` statement
const DELETE_CHUNK: usize = 500;

impl Session {
    /// Write a record and return the identity it was stored under
    ///
    /// With `is_new` the record is inserted; if its identity is taken, a
    /// fresh one is generated until the insert succeeds or
    /// `max_identity_attempts` is reached. Without `is_new` the row with the
    /// record's identity is updated in place, and nothing happens if no such
    /// row exists. Either way the record's `date` field ends up holding the
    /// returned identity.
    pub fn write(&mut self, record: &mut Record, is_new: bool) -> Result<Identity> {
        let mut identity = record.identity()?;
        let registry = &self.shared.registry;
        let mut names = Vec::with_capacity(record.len());
        let mut values = Vec::with_capacity(record.len());
        for (name, value) in record.data_fields() {
            names.push(quote_ident(name));
            values.push(registry.encode(value)?);
        }

        let retry = &self.shared.config.retry;
        let table = quote_ident(&self.shared.config.table);
        let schema = self.schema();

        let txn = WriteTxn::begin(&self.conn, retry)?;
        let existing = schema.columns(&self.conn)?;
        let additions = schema.reconcile(&existing, record)?;
        schema.apply(&self.conn, &additions)?;

        if is_new {
            identity = self.insert_unique(&table, &names, values, identity)?;
        } else if !names.is_empty() {
            let assignments: Vec<String> = names
                .iter()
                .enumerate()
                .map(|(i, name)| format!("{} = ?{}", name, i + 1))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?{}",
                table,
                assignments.join(", "),
                quote_ident(IDENTITY_FIELD),
                names.len() + 1
            );
            values.push(SqlValue::Integer(identity.as_i64()));
            self.conn
                .execute(&sql, params_from_iter(values.iter()))
                .map_err(Error::storage)?;
        }

        txn.commit(retry)?;
        record.set_identity(identity);
        trace!(
            target: "juntdb::store",
            identity = %identity,
            is_new,
            new_columns = additions.len(),
            "write committed"
        );
        Ok(identity)
    }

    fn insert_unique(
        &self,
        table: &str,
        names: &[String],
        values: Vec<SqlValue>,
        mut identity: Identity,
    ) -> Result<Identity> {
        let mut columns = vec![quote_ident(IDENTITY_FIELD)];
        columns.extend(names.iter().cloned());
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql).map_err(Error::storage)?;

        let mut params = Vec::with_capacity(values.len() + 1);
        params.push(SqlValue::Integer(identity.as_i64()));
        params.extend(values);

        let max_attempts = self.shared.config.max_identity_attempts;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match stmt.execute(params_from_iter(params.iter())) {
                Ok(_) => return Ok(identity),
                Err(e) if is_identity_collision(&e) => {
                    if attempt >= max_attempts {
                        return Err(Error::IdentityExhausted {
                            attempts: attempt,
                            last: identity.to_string(),
                        });
                    }
                    let fresh = self.shared.generator.next_after(identity);
                    debug!(
                        target: "juntdb::store",
                        taken = %identity,
                        fresh = %fresh,
                        attempt,
                        "identity collision, regenerating"
                    );
                    identity = fresh;
                    params[0] = SqlValue::Integer(identity.as_i64());
                }
                Err(e) => return Err(Error::storage(e)),
            }
        }
    }

    /// Delete every row whose identity is listed; returns rows removed
    ///
    /// Absent identities are ignored. An empty list is a no-op.
    pub fn delete(&mut self, identities: &[Identity]) -> Result<usize> {
        if identities.is_empty() {
            return Ok(0);
        }
        let retry = &self.shared.config.retry;
        let table = quote_ident(&self.shared.config.table);

        let txn = WriteTxn::begin(&self.conn, retry)?;
        let mut removed = 0;
        for chunk in identities.chunks(DELETE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "DELETE FROM {} WHERE {} IN ({})",
                table,
                quote_ident(IDENTITY_FIELD),
                placeholders
            );
            removed += self
                .conn
                .execute(&sql, params_from_iter(chunk.iter().map(Identity::as_i64)))
                .map_err(Error::storage)?;
        }
        txn.commit(retry)?;
        debug!(target: "juntdb::store", requested = identities.len(), removed, "deleted rows");
        Ok(removed)
    }

    /// Reclaim free pages (`VACUUM`)
    pub fn compact(&mut self) -> Result<()> {
        retry_transient(&self.shared.config.retry, "vacuum", || {
            self.conn.execute_batch("VACUUM")
        })?;
        info!(target: "juntdb::store", path = ?self.shared.path, "compacted");
        Ok(())
    }

    /// Drop every row and every value column
    ///
    /// The table is recreated with only the identity column. Persisted type
    /// associations are kept.
    pub fn reset(&mut self) -> Result<()> {
        let retry = &self.shared.config.retry;
        let txn = WriteTxn::begin(&self.conn, retry)?;
        self.schema().recreate_table(&self.conn)?;
        txn.commit(retry)?;
        info!(
            target: "juntdb::store",
            table = %self.shared.config.table,
            "table reset"
        );
        Ok(())
    }
}
