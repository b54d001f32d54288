//! Connection manager and statement layer.
//!
//! [`Database`] owns one backend connection plus the dialect selected for it.
//! All methods take `&mut self`, so use of the connection is serialized by
//! the borrow checker; schema management, introspection and sequences are
//! reached through borrowed views ([`Database::manager`],
//! [`Database::reverse`], [`Database::sequences`]).

use crate::config::ConnectionConfig;
use crate::dialect::{self, Dialect};
use crate::driver::{self, Driver, DriverError, Fetched};
use crate::error::{SchemaKitError, redact_database_url};
use crate::models::{DatabaseType, Feature, FieldValue, PortableType, TableLock, Value};
use crate::query_utils::QueryUtils;
use crate::quoting::{self, Quoter};
use crate::schema::{Introspector, SchemaManager};
use crate::sequence::SequenceEmulator;
use crate::statement::{ResultSet, Row};
use crate::Result;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

/// A database handle: configuration, dialect and (once connected) a live
/// connection.
pub struct Database {
    config: ConnectionConfig,
    dialect: Box<dyn Dialect>,
    dsn: Option<String>,
    driver: Option<Box<dyn Driver>>,
    pending_limit: Option<(u64, u64)>,
    last_error_code: Option<String>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("dialect", &self.dialect)
            .field("connected", &self.driver.is_some())
            .field("pending_limit", &self.pending_limit)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates an unconnected handle and selects the dialect for
    /// `config.backend`.
    ///
    /// # Errors
    /// Returns a configuration error when `config` does not validate.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let dialect = dialect::for_backend(config.backend);
        Ok(Self {
            config,
            dialect,
            dsn: None,
            driver: None,
            pending_limit: None,
            last_error_code: None,
        })
    }

    /// Replaces the configuration. Any live connection is closed and the
    /// cached DSN is discarded.
    ///
    /// # Errors
    /// Returns a configuration error when `config` does not validate.
    pub async fn reconfigure(&mut self, config: ConnectionConfig) -> Result<()> {
        config.validate()?;
        self.disconnect().await?;
        self.dialect = dialect::for_backend(config.backend);
        self.config = config;
        self.dsn = None;
        self.pending_limit = None;
        Ok(())
    }

    /// Active configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Dialect selected for this handle.
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Backend of this handle.
    pub fn database_type(&self) -> DatabaseType {
        self.dialect.database_type()
    }

    /// Connection descriptor derived from the configuration.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::Connection`] when the configuration does
    /// not form a well-formed DSN.
    pub fn generate_dsn(&self) -> Result<String> {
        self.dialect.generate_dsn(&self.config)
    }

    /// DSN used by the current or last connection attempt.
    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref()
    }

    /// Opens the connection if it is not open yet.
    ///
    /// With `suppress_errors` a failure is logged, its error code recorded,
    /// and `Ok(false)` returned instead of an error.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::Connection`] for a malformed DSN or a
    /// failed connection when errors are not suppressed.
    pub async fn connect(&mut self, suppress_errors: bool) -> Result<bool> {
        if self.driver.is_some() {
            return Ok(true);
        }

        let dsn = match &self.dsn {
            Some(dsn) => dsn.clone(),
            None => match self.generate_dsn() {
                Ok(dsn) => {
                    self.dsn = Some(dsn.clone());
                    dsn
                }
                Err(e) if suppress_errors => {
                    warn!("Cannot build DSN for {}: {}", self.config, e);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            },
        };

        debug!("Opening connection to {}", redact_database_url(&dsn));
        let opened = driver::open(&self.config, &dsn).await;
        match opened {
            Ok(driver) => {
                info!("Connected to {}", self.config);
                self.driver = Some(driver);
                self.last_error_code = None;
                Ok(true)
            }
            Err(e) => {
                self.last_error_code = e.code.clone();
                if suppress_errors {
                    warn!("Connection to {} failed: {}", self.config, e);
                    return Ok(false);
                }
                let code = e.code.clone();
                Err(SchemaKitError::connection_failed(
                    format!("Failed to connect to {}", self.config),
                    code,
                    e,
                ))
            }
        }
    }

    /// Closes the connection, if any.
    ///
    /// # Errors
    /// Returns a connection error when the backend reports a failure while
    /// closing; the handle is disconnected either way.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(driver) = self.driver.take() else {
            return Ok(());
        };
        debug!("Disconnecting from {}", self.config);
        driver.close().await.map_err(|e| {
            let code = e.code.clone();
            SchemaKitError::connection_failed("Failed to close connection", code, e)
        })
    }

    /// True while a connection is open.
    pub fn is_connected(&self) -> bool {
        self.driver.is_some()
    }

    /// Backend error code of the last failed connect or statement.
    pub fn last_error_code(&self) -> Option<&str> {
        self.last_error_code.as_deref()
    }

    /// Capability predicate of the active dialect.
    pub fn supports(&self, feature: Feature) -> bool {
        self.dialect.supports(feature)
    }

    /// Starts a transaction.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::UnsupportedFeature`] when the dialect has no
    /// transactions, or a query error from the backend.
    pub async fn begin_transaction(&mut self) -> Result<()> {
        self.dialect.require(Feature::Transactions)?;
        let sql = self.dialect.begin_sql();
        self.exec(sql).await.map(|_| ())
    }

    /// Commits the current transaction.
    ///
    /// # Errors
    /// Same as [`begin_transaction`](Self::begin_transaction).
    pub async fn commit(&mut self) -> Result<()> {
        self.dialect.require(Feature::Transactions)?;
        self.exec("COMMIT").await.map(|_| ())
    }

    /// Rolls back the current transaction.
    ///
    /// # Errors
    /// Same as [`begin_transaction`](Self::begin_transaction).
    pub async fn rollback(&mut self) -> Result<()> {
        self.dialect.require(Feature::Transactions)?;
        self.exec("ROLLBACK").await.map(|_| ())
    }

    /// Stores a one-shot limit applied to the next [`query`](Self::query)
    /// only. A later call replaces a limit that was never consumed.
    #[deprecated(note = "put the LIMIT clause in the statement text")]
    pub fn set_limit(&mut self, limit: u64, offset: u64) {
        self.pending_limit = Some((limit, offset));
    }

    /// Runs a row-producing statement, consuming any pending limit.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::Query`] carrying the backend message and
    /// the executed SQL, or [`SchemaKitError::NotConnected`].
    pub async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        let statement = match self.pending_limit.take() {
            Some((limit, offset)) => format!(
                "{}{}",
                sql.trim_end().trim_end_matches(';'),
                self.dialect.limit_clause(limit, offset)
            ),
            None => sql.to_string(),
        };
        let (columns, rows) = self.fetch(&statement).await?;
        Ok(ResultSet::new(columns, rows))
    }

    /// Runs a statement that produces no rows and returns the affected-row
    /// count.
    ///
    /// # Errors
    /// Same as [`query`](Self::query).
    pub async fn manipulate(&mut self, sql: &str) -> Result<u64> {
        self.exec(sql).await
    }

    /// Quotes `values` per `types`, substitutes them for the `%s`
    /// placeholders of `template`, and runs the result with
    /// [`query`](Self::query).
    ///
    /// # Errors
    /// Returns [`SchemaKitError::ArgumentMismatch`] when the arrays or the
    /// placeholder count disagree, otherwise as [`query`](Self::query).
    pub async fn query_f(
        &mut self,
        template: &str,
        types: &[PortableType],
        values: &[Value],
    ) -> Result<ResultSet> {
        let sql = self.format_statement(template, types, values)?;
        self.query(&sql).await
    }

    /// [`manipulate`](Self::manipulate) counterpart of
    /// [`query_f`](Self::query_f).
    ///
    /// # Errors
    /// Same as [`query_f`](Self::query_f).
    pub async fn manipulate_f(
        &mut self,
        template: &str,
        types: &[PortableType],
        values: &[Value],
    ) -> Result<u64> {
        let sql = self.format_statement(template, types, values)?;
        self.manipulate(&sql).await
    }

    /// SQL text that [`query_f`](Self::query_f) would execute.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::ArgumentMismatch`] on length mismatches.
    pub fn format_statement(
        &self,
        template: &str,
        types: &[PortableType],
        values: &[Value],
    ) -> Result<String> {
        let quoted = self.quoter().quote_all(types, values)?;
        quoting::substitute(template, &quoted)
    }

    /// Quoter bound to this handle's dialect and quote options.
    pub fn quoter(&self) -> Quoter<'_> {
        Quoter::new(self.dialect.as_ref(), self.config.quote)
    }

    /// Quotes a value as a literal of `column_type`.
    pub fn quote(&self, value: &Value, column_type: PortableType) -> String {
        self.quoter().quote(value, column_type)
    }

    /// Quotes an identifier.
    pub fn quote_identifier(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    /// Inserts one row.
    ///
    /// # Errors
    /// Returns a schema error for an empty field list, otherwise as
    /// [`manipulate`](Self::manipulate).
    pub async fn insert(&mut self, table: &str, fields: &[FieldValue]) -> Result<u64> {
        let sql = self.insert_sql("INSERT", table, fields)?;
        self.manipulate(&sql).await
    }

    /// Updates the rows matching every `conditions` equality.
    ///
    /// # Errors
    /// Returns a schema error when `fields` or `conditions` is empty,
    /// otherwise as [`manipulate`](Self::manipulate).
    pub async fn update(
        &mut self,
        table: &str,
        fields: &[FieldValue],
        conditions: &[FieldValue],
    ) -> Result<u64> {
        if fields.is_empty() {
            return Err(SchemaKitError::schema(format!(
                "update of '{}' needs at least one field",
                table
            )));
        }
        if conditions.is_empty() {
            return Err(SchemaKitError::schema(format!(
                "update of '{}' needs at least one condition",
                table
            )));
        }
        let quoter = self.quoter();
        let assignments = fields
            .iter()
            .map(|f| {
                format!(
                    "{} = {}",
                    quoter.quote_identifier(&f.name),
                    quoter.quote(&f.value, f.column_type)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let filter = conditions
            .iter()
            .map(|f| {
                let column = quoter.quote_identifier(&f.name);
                if f.value.is_null() {
                    format!("{} IS NULL", column)
                } else {
                    format!("{} = {}", column, quoter.quote(&f.value, f.column_type))
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quoter.quote_identifier(table),
            assignments,
            filter
        );
        self.manipulate(&sql).await
    }

    /// Inserts a row, replacing any row with the same `key` values.
    ///
    /// # Errors
    /// Returns a schema error when `key` is empty, otherwise as
    /// [`manipulate`](Self::manipulate).
    pub async fn replace(
        &mut self,
        table: &str,
        key: &[FieldValue],
        fields: &[FieldValue],
    ) -> Result<u64> {
        if key.is_empty() {
            return Err(SchemaKitError::schema(format!(
                "replace into '{}' needs at least one key field",
                table
            )));
        }
        let all: Vec<FieldValue> = key.iter().chain(fields).cloned().collect();
        let sql = self.insert_sql("REPLACE", table, &all)?;
        self.manipulate(&sql).await
    }

    fn insert_sql(&self, verb: &str, table: &str, fields: &[FieldValue]) -> Result<String> {
        if fields.is_empty() {
            return Err(SchemaKitError::schema(format!(
                "{} into '{}' needs at least one field",
                verb.to_ascii_lowercase(),
                table
            )));
        }
        let quoter = self.quoter();
        let names = fields
            .iter()
            .map(|f| quoter.quote_identifier(&f.name))
            .collect::<Vec<_>>()
            .join(", ");
        let values = fields
            .iter()
            .map(|f| quoter.quote(&f.value, f.column_type))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "{} INTO {} ({}) VALUES ({})",
            verb,
            quoter.quote_identifier(table),
            names,
            values
        ))
    }

    /// Acquires table locks. The caller must call
    /// [`unlock_tables`](Self::unlock_tables) on every exit path; prefer
    /// [`with_locked_tables`](Self::with_locked_tables).
    ///
    /// # Errors
    /// Returns a schema error for an empty lock list, otherwise as
    /// [`manipulate`](Self::manipulate).
    pub async fn lock_tables(&mut self, locks: &[TableLock]) -> Result<()> {
        if locks.is_empty() {
            return Err(SchemaKitError::schema("no tables to lock"));
        }
        let sql = self.dialect.lock_tables_sql(locks);
        info!("Locking tables: {}", sql);
        self.exec(&sql).await.map(|_| ())
    }

    /// Releases all table locks held by this connection.
    ///
    /// # Errors
    /// As [`manipulate`](Self::manipulate).
    pub async fn unlock_tables(&mut self) -> Result<()> {
        let sql = self.dialect.unlock_tables_sql();
        info!("Unlocking tables: {}", sql);
        self.exec(&sql).await.map(|_| ())
    }

    /// Runs `f` with `locks` held and always releases them afterwards.
    ///
    /// An error from `f` takes precedence over an unlock error.
    ///
    /// # Errors
    /// Returns the lock error, the error of `f`, or the unlock error.
    pub async fn with_locked_tables<T, F>(&mut self, locks: &[TableLock], f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut Database) -> BoxFuture<'c, Result<T>>,
        T: Send + 'static,
    {
        self.lock_tables(locks).await?;
        let outcome = f(self).await;
        let unlocked = self.unlock_tables().await;
        match (outcome, unlocked) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(unlock)) => {
                warn!("Unlocking tables after a failure also failed: {}", unlock);
                Err(e)
            }
            (Ok(_), Err(unlock)) => Err(unlock),
        }
    }

    /// Creates a database; `charset` defaults to the configured one.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::UnsupportedFeature`] on backends without
    /// databases, otherwise as [`manipulate`](Self::manipulate).
    pub async fn create_database(
        &mut self,
        name: &str,
        charset: Option<&str>,
        collation: Option<&str>,
    ) -> Result<()> {
        let charset = charset.unwrap_or(&self.config.charset).to_string();
        let sql = self
            .dialect
            .create_database_sql(name, &charset, collation)?;
        self.exec(&sql).await?;
        info!("Created database {}", name);
        Ok(())
    }

    /// Reclaims storage of a table.
    ///
    /// # Errors
    /// As [`query`](Self::query).
    pub async fn optimize_table(&mut self, table: &str) -> Result<()> {
        let sql = self.dialect.optimize_table_sql(table);
        // OPTIMIZE TABLE answers with a status row set
        self.fetch(&sql).await?;
        debug!("Optimized table {}", table);
        Ok(())
    }

    /// Read replica routing is not implemented; always reports `false`.
    pub fn use_read_replica(&mut self, enable: bool) -> bool {
        if enable {
            debug!(
                "Read replica routing requested but not available for {}",
                self.database_type()
            );
        }
        false
    }

    /// Next identifier of `table` via the sequence emulator.
    ///
    /// # Errors
    /// As [`SequenceEmulator::next_id`].
    pub async fn next_id(&mut self, table: &str) -> Result<i64> {
        self.sequences().next_id(table).await
    }

    /// Schema manager view.
    pub fn manager(&mut self) -> SchemaManager<'_> {
        SchemaManager::new(self)
    }

    /// Introspector view.
    pub fn reverse(&mut self) -> Introspector<'_> {
        Introspector::new(self)
    }

    /// Sequence emulator view.
    pub fn sequences(&mut self) -> SequenceEmulator<'_> {
        SequenceEmulator::new(self)
    }

    /// SQL expression helpers.
    pub fn query_utils(&self) -> QueryUtils<'_> {
        QueryUtils::new(self.dialect.as_ref(), self.quoter())
    }

    /// Runs a row-producing statement without touching the pending limit.
    pub(crate) async fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.fetch(sql).await.map(|(_, rows)| rows)
    }

    async fn fetch(&mut self, sql: &str) -> Result<Fetched> {
        debug!("Executing query: {}", sql);
        let driver = self.driver.as_mut().ok_or(SchemaKitError::NotConnected)?;
        let outcome = driver.fetch(sql).await;
        outcome.map_err(|e| self.statement_failed(e, sql))
    }

    pub(crate) async fn exec(&mut self, sql: &str) -> Result<u64> {
        debug!("Executing statement: {}", sql);
        let driver = self.driver.as_mut().ok_or(SchemaKitError::NotConnected)?;
        let outcome = driver.execute(sql).await;
        outcome.map_err(|e| self.statement_failed(e, sql))
    }

    fn statement_failed(&mut self, error: DriverError, sql: &str) -> SchemaKitError {
        self.last_error_code = error.code.clone();
        SchemaKitError::query_failed(error.message, sql, error.code)
    }
}
