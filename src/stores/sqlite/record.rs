//! Implements a SQLite backed record store.

use std::{
    path::Path,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicI64, Ordering},
    },
};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlResult, Null, ToSqlOutput, ValueRef},
};

use crate::{
    Error,
    record::{Amount, ExpenseRecord, RawRecord, RecordDraft, RecordId},
    stores::{RecordStore, Subscribers, Subscription},
};

/// Stores records in a SQLite database.
///
/// The `amount` column has no declared type, so whatever a writer stored
/// (a number, text or NULL) is read back unchanged.
///
/// Writes through this store notify subscribers straight away. Writes by
/// other connections to the same file are picked up by
/// [SQLiteRecordStore::check_for_external_changes].
#[derive(Debug, Clone)]
pub struct SQLiteRecordStore {
    connection: Arc<Mutex<Connection>>,
    subscribers: Subscribers,
    /// The last `PRAGMA data_version` seen on `connection`.
    data_version: Arc<AtomicI64>,
}

impl SQLiteRecordStore {
    /// Create a new store for the SQLite `connection`, creating the record
    /// table if needed.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the table cannot be created.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        create_record_table(&connection)?;
        let data_version = get_data_version(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            subscribers: Subscribers::default(),
            data_version: Arc::new(AtomicI64::new(data_version)),
        })
    }

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the file cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::new(Connection::open(path)?)
    }

    /// Create a store backed by a fresh in-memory database.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the database cannot be initialized.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Load the whole collection, newest record first.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is a SQL error.
    pub fn records(&self) -> Result<Vec<ExpenseRecord>, Error> {
        let connection = self.lock()?;
        select_records(&connection)
    }

    /// Notify subscribers if another connection has committed to the
    /// database since the last check.
    ///
    /// SQLite bumps `PRAGMA data_version` only for commits made by other
    /// connections, so writes through this store never trigger a second
    /// snapshot here. Returns whether subscribers were notified.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::DatabaseLockError] if the connection lock is poisoned,
    /// - or [Error::SqlError] if the version or the records cannot be read.
    pub fn check_for_external_changes(&self) -> Result<bool, Error> {
        let connection = self.lock()?;
        let data_version = get_data_version(&connection)?;

        if self.data_version.swap(data_version, Ordering::SeqCst) == data_version {
            return Ok(false);
        }

        tracing::debug!("Another connection changed the records (data version {data_version})");
        let records = select_records(&connection)?;
        self.subscribers.notify(&records);

        Ok(true)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|_| Error::DatabaseLockError)
    }

    /// Send the current collection to subscribers.
    ///
    /// Called while the connection lock is still held so that snapshots go
    /// out in the same order as the writes. The write has already been
    /// committed at this point, so a failed read is logged rather than
    /// reported to the writer.
    fn notify(&self, connection: &Connection) {
        match select_records(connection) {
            Ok(records) => self.subscribers.notify(&records),
            Err(error) => tracing::error!("Could not send records to subscribers: {error}"),
        }
    }
}

impl RecordStore for SQLiteRecordStore {
    /// Insert a new row and return its ID.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::DatabaseLockError] if the connection lock is poisoned,
    /// - or [Error::SqlError] if there is some other SQL error.
    async fn create(&self, draft: RecordDraft) -> Result<RecordId, Error> {
        let connection = self.lock()?;

        let id: i64 = connection
            .prepare(
                "INSERT INTO expense_record (name, date, item, amount)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id",
            )?
            .query_row(
                (
                    &draft.name,
                    draft.date.as_str(),
                    &draft.item,
                    &draft.amount,
                ),
                |row| row.get(0),
            )?;

        self.notify(&connection);

        Ok(RecordId::new(id.to_string()))
    }

    /// Replace the row `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::UpdateMissingRecord] if `id` does not refer to a row,
    /// - [Error::DatabaseLockError] if the connection lock is poisoned,
    /// - or [Error::SqlError] if there is some other SQL error.
    async fn update(&self, id: &RecordId, draft: RecordDraft) -> Result<(), Error> {
        let Some(row_id) = parse_row_id(id) else {
            return Err(Error::UpdateMissingRecord);
        };

        let connection = self.lock()?;

        let rows_affected = connection.execute(
            "UPDATE expense_record SET name = ?1, date = ?2, item = ?3, amount = ?4 WHERE id = ?5",
            (
                &draft.name,
                draft.date.as_str(),
                &draft.item,
                &draft.amount,
                row_id,
            ),
        )?;

        if rows_affected == 0 {
            return Err(Error::UpdateMissingRecord);
        }

        self.notify(&connection);

        Ok(())
    }

    /// Delete the row `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::DatabaseLockError] if the connection lock is poisoned,
    /// - or [Error::SqlError] if there is some other SQL error.
    async fn delete(&self, id: &RecordId) -> Result<bool, Error> {
        let Some(row_id) = parse_row_id(id) else {
            return Ok(false);
        };

        let connection = self.lock()?;

        let rows_affected = connection.execute(
            "DELETE FROM expense_record WHERE id = :id",
            &[(":id", &row_id)],
        )?;

        if rows_affected == 0 {
            return Ok(false);
        }

        self.notify(&connection);

        Ok(true)
    }

    fn subscribe(&self) -> Result<Subscription, Error> {
        let connection = self.lock()?;
        let records = select_records(&connection)?;

        Ok(self.subscribers.subscribe(records))
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.count()
    }
}

/// Create the record table in the database.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_record_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    // AUTOINCREMENT stops SQLite from reusing the IDs of deleted rows.
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense_record (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                date TEXT,
                item TEXT,
                amount
                )",
        (),
    )?;

    Ok(())
}

fn get_data_version(connection: &Connection) -> Result<i64, rusqlite::Error> {
    connection.pragma_query_value(None, "data_version", |row| row.get(0))
}

fn select_records(connection: &Connection) -> Result<Vec<ExpenseRecord>, Error> {
    let raw_records = connection
        .prepare("SELECT id, name, date, item, amount FROM expense_record ORDER BY id DESC")?
        .query_map([], map_raw_record_row)?
        .collect::<Result<Vec<_>, rusqlite::Error>>()?;

    Ok(raw_records.into_iter().filter_map(RawRecord::decode).collect())
}

fn map_raw_record_row(row: &Row) -> Result<RawRecord, rusqlite::Error> {
    let id: i64 = row.get(0)?;

    Ok(RawRecord {
        id: Some(id.to_string()),
        name: text_column(row, 1)?,
        date: text_column(row, 2)?,
        item: text_column(row, 3)?,
        amount: row.get(4)?,
    })
}

/// Read a text column whatever other writers put in it.
///
/// Numbers are read as their decimal form, invalid UTF-8 is replaced and
/// blobs count as missing.
fn text_column(row: &Row, index: usize) -> Result<Option<String>, rusqlite::Error> {
    Ok(match row.get_ref(index)? {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(integer) => Some(integer.to_string()),
        ValueRef::Real(real) => Some(real.to_string()),
        ValueRef::Text(text) => Some(String::from_utf8_lossy(text).into_owned()),
    })
}

/// IDs from this store are always integers, so anything else cannot match a row.
fn parse_row_id(id: &RecordId) -> Option<i64> {
    id.as_str().parse().ok()
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Amount::Number(number) => ToSqlOutput::from(*number),
            Amount::Text(text) => ToSqlOutput::from(text.as_str()),
            Amount::Missing => ToSqlOutput::from(Null),
        })
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Amount::Missing,
            ValueRef::Integer(integer) => Amount::Number(integer as f64),
            ValueRef::Real(real) => Amount::Number(real),
            ValueRef::Text(text) => Amount::Text(String::from_utf8_lossy(text).into_owned()),
            ValueRef::Blob(_) => Amount::Missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs, path::PathBuf, process, sync::Arc};

    use rusqlite::Connection;

    use crate::{
        Error, LedgerConfig, RecordCache,
        record::{Amount, ExpenseRecord, RecordDate, RecordId},
        stores::{RecordStore, SQLiteRecordStore},
    };

    fn get_test_store() -> SQLiteRecordStore {
        SQLiteRecordStore::open_in_memory().expect("Could not open in-memory SQLite database")
    }

    /// A database file in the system temp directory, deleted on drop.
    struct TestDatabaseFile(PathBuf);

    impl TestDatabaseFile {
        fn new(name: &str) -> Self {
            let path = env::temp_dir().join(format!("kakeibo-{name}-{}.db", process::id()));
            let _ = fs::remove_file(&path);
            Self(path)
        }
    }

    impl Drop for TestDatabaseFile {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    /// Two stores with their own connections to the same database file.
    fn get_shared_file_stores(
        name: &str,
    ) -> (TestDatabaseFile, SQLiteRecordStore, SQLiteRecordStore) {
        let file = TestDatabaseFile::new(name);
        let first = SQLiteRecordStore::open(&file.0).expect("Could not open database");
        let second = SQLiteRecordStore::open(&file.0).expect("Could not open database");

        (file, first, second)
    }

    #[tokio::test]
    async fn create_succeeds() {
        let store = get_test_store();
        let draft = ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000);

        let id = store.create(draft.clone()).await.unwrap();

        assert_eq!(
            store.records().unwrap(),
            vec![ExpenseRecord::from_draft(id, draft)]
        );
    }

    #[tokio::test]
    async fn amounts_keep_their_stored_form() {
        let store = get_test_store();
        store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "a", 12.5))
            .await
            .unwrap();
        store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "b", "300"))
            .await
            .unwrap();
        store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "c", Amount::Missing))
            .await
            .unwrap();

        let amounts: Vec<_> = store
            .records()
            .unwrap()
            .into_iter()
            .map(|record| record.amount)
            .collect();

        assert_eq!(
            amounts,
            vec![
                Amount::Missing,
                Amount::Text("300".to_owned()),
                Amount::Number(12.5)
            ]
        );
    }

    #[tokio::test]
    async fn update_replaces_every_field() {
        let store = get_test_store();
        let id = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();

        store
            .update(&id, ExpenseRecord::build("パパ", "2024-02-01", "本", 800))
            .await
            .unwrap();

        let record = store.records().unwrap().remove(0);
        assert_eq!(record.id, id);
        assert_eq!(record.name, "パパ");
        assert_eq!(record.date, RecordDate::new("2024-02-01"));
        assert_eq!(record.item, "本");
        assert_eq!(record.amount, Amount::Number(800.0));
    }

    #[tokio::test]
    async fn update_missing_record_fails() {
        let store = get_test_store();

        let result = store
            .update(
                &RecordId::new("42"),
                ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000),
            )
            .await;

        assert_eq!(result, Err(Error::UpdateMissingRecord));
    }

    #[tokio::test]
    async fn update_with_foreign_id_fails() {
        let store = get_test_store();

        let result = store
            .update(
                &RecordId::new("not-a-row"),
                ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000),
            )
            .await;

        assert_eq!(result, Err(Error::UpdateMissingRecord));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = get_test_store();
        let id = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();

        assert_eq!(store.delete(&id).await, Ok(true));
        assert_eq!(store.delete(&id).await, Ok(false));
        assert!(store.records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = get_test_store();
        let first = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();
        store.delete(&first).await.unwrap();

        let second = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn subscribers_receive_snapshots_in_write_order() {
        let store = get_test_store();
        let mut subscription = store.subscribe().unwrap();

        let first = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();
        let second = store
            .create(ExpenseRecord::build("パパ", "2024-01-20", "交通費", 500))
            .await
            .unwrap();

        assert_eq!(subscription.recv().await, Some(vec![]));
        let snapshot = subscription.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, first);
        let snapshot = subscription.recv().await.unwrap();
        let ids: Vec<_> = snapshot.into_iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn rows_from_other_writers_are_decoded() {
        let connection = Connection::open_in_memory().unwrap();
        super::create_record_table(&connection).unwrap();
        connection
            .execute(
                "INSERT INTO expense_record (name, date, item, amount) VALUES (' ママ ', NULL, '食費', 'abc')",
                (),
            )
            .unwrap();
        let store = SQLiteRecordStore::new(connection).unwrap();

        let records = store.records().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ママ");
        assert_eq!(records[0].date, RecordDate::new(""));
        assert_eq!(records[0].amount, Amount::Text("abc".to_owned()));
    }

    #[tokio::test]
    async fn rows_with_blob_text_do_not_hide_other_rows() {
        let connection = Connection::open_in_memory().unwrap();
        super::create_record_table(&connection).unwrap();
        connection
            .execute(
                "INSERT INTO expense_record (name, date, item, amount) VALUES
                    ('ママ', '2024-01-05', '食費', 1000),
                    (x'e3', '2024-01-06', 42, 200)",
                (),
            )
            .unwrap();
        let store = SQLiteRecordStore::new(connection).unwrap();

        let records = store.records().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "");
        assert_eq!(records[0].item, "42");
        assert_eq!(records[1].name, "ママ");
    }

    #[tokio::test]
    async fn own_writes_are_not_external_changes() {
        let (_file, store, _other) = get_shared_file_stores("own-writes");
        store.check_for_external_changes().unwrap();

        store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();

        assert_eq!(store.check_for_external_changes(), Ok(false));
    }

    #[tokio::test]
    async fn cache_sees_writes_from_another_connection() {
        let (_file, store, other_writer) = get_shared_file_stores("other-writer");
        let store = Arc::new(store);
        let mut cache = RecordCache::new(store.clone(), LedgerConfig::default()).unwrap();
        cache.next_snapshot().await.unwrap();

        let id = other_writer
            .create(ExpenseRecord::build("パパ", "2024-01-20", "交通費", 500))
            .await
            .unwrap();
        assert_eq!(cache.apply_pending(), 0);

        assert_eq!(store.check_for_external_changes(), Ok(true));
        assert_eq!(store.check_for_external_changes(), Ok(false));
        assert_eq!(cache.apply_pending(), 1);
        assert_eq!(cache.records().len(), 1);
        assert_eq!(cache.records()[0].id, id);
    }
}
