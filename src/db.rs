use eyre::Result;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{
    AccountDocument, GradeEvent, GradeKind, GradeTransaction, Network, OutputFlow,
    OutputTransfer, TokenMetadata,
};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS processed_days (
  address TEXT NOT NULL,
  date    INTEGER NOT NULL,
  PRIMARY KEY (address, date)
);

CREATE TABLE IF NOT EXISTS flow_state (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  address          TEXT NOT NULL,
  date             INTEGER NOT NULL,
  start_ts         INTEGER NOT NULL,
  end_ts           INTEGER NOT NULL, -- -1 while open
  sender           TEXT NOT NULL,
  recipient        TEXT NOT NULL,
  network_id       TEXT NOT NULL,
  tx_hash          TEXT NOT NULL,
  amount_token     TEXT NOT NULL, -- base units as decimal string
  amount_fiat      TEXT NOT NULL,
  exchange_rate    TEXT NOT NULL,
  token_id         TEXT NOT NULL,
  token_symbol     TEXT NOT NULL,
  token_name       TEXT NOT NULL,
  token_underlying TEXT
);

CREATE TABLE IF NOT EXISTS transfers (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  address          TEXT NOT NULL,
  date             INTEGER NOT NULL,
  sender           TEXT NOT NULL,
  recipient        TEXT NOT NULL,
  tx_hash          TEXT NOT NULL,
  network_id       TEXT NOT NULL,
  amount_token     TEXT NOT NULL, -- base units as decimal string
  amount_fiat      TEXT NOT NULL,
  exchange_rate    TEXT NOT NULL,
  token_id         TEXT NOT NULL,
  token_symbol     TEXT NOT NULL,
  token_name       TEXT NOT NULL,
  token_underlying TEXT
);

CREATE TABLE IF NOT EXISTS grade_events (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  address          TEXT NOT NULL,
  date             INTEGER NOT NULL,
  event_id         TEXT NOT NULL,
  kind             TEXT NOT NULL, -- upgrade | downgrade
  network_id       TEXT NOT NULL,
  tx_hash          TEXT NOT NULL,
  timestamp        INTEGER NOT NULL,
  amount           TEXT NOT NULL, -- base units as decimal string
  token_id         TEXT NOT NULL,
  token_symbol     TEXT NOT NULL,
  token_name       TEXT NOT NULL,
  token_underlying TEXT
);

CREATE INDEX IF NOT EXISTS flow_state_address_date ON flow_state (address, date);
CREATE INDEX IF NOT EXISTS transfers_address_date ON transfers (address, date);
CREATE INDEX IF NOT EXISTS grade_events_address_date ON grade_events (address, date);
"#;

/// Inclusive filter on the `date` of stored records
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl ToSql for Network {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Network {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: eyre::Report| FromSqlError::Other(e.into()))
    }
}

impl ToSql for GradeKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for GradeKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "upgrade" => Ok(GradeKind::Upgrade),
            "downgrade" => Ok(GradeKind::Downgrade),
            other => Err(FromSqlError::Other(
                format!("unknown grade kind: {other}").into(),
            )),
        }
    }
}

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

pub fn is_day_processed(conn: &Connection, address: &str, date: i64) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM processed_days WHERE address = LOWER(?1) AND date = ?2",
            params![address, date],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Append one day of results for `address` and mark the day processed.
///
/// Returns `false` without writing anything if the day was already recorded.
pub fn record_day(
    conn: &mut Connection,
    address: &str,
    date: i64,
    flows: &[OutputFlow],
    transfers: &[OutputTransfer],
    grade_events: &[GradeEvent],
) -> Result<bool> {
    let address = address.to_lowercase();
    let tx = conn.transaction()?;

    let marked = tx.execute(
        "INSERT OR IGNORE INTO processed_days (address, date) VALUES (?1, ?2)",
        params![address, date],
    )?;
    if marked == 0 {
        return Ok(false); // dropping `tx` rolls back
    }

    {
        let mut insert_flow = tx.prepare(
            r#"
            INSERT INTO flow_state (
                address, date, start_ts, end_ts, sender, recipient, network_id, tx_hash,
                amount_token, amount_fiat, exchange_rate,
                token_id, token_symbol, token_name, token_underlying
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )?;
        for f in flows {
            insert_flow.execute(params![
                address,
                f.date,
                f.start,
                f.end,
                f.sender,
                f.recipient,
                f.network_id,
                f.tx_hash,
                f.amount_token,
                f.amount_fiat,
                f.exchange_rate,
                f.token.id,
                f.token.symbol,
                f.token.name,
                f.token.underlying_address,
            ])?;
        }

        let mut insert_transfer = tx.prepare(
            r#"
            INSERT INTO transfers (
                address, date, sender, recipient, tx_hash, network_id,
                amount_token, amount_fiat, exchange_rate,
                token_id, token_symbol, token_name, token_underlying
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )?;
        for t in transfers {
            insert_transfer.execute(params![
                address,
                t.date,
                t.sender,
                t.recipient,
                t.tx_hash,
                t.network_id,
                t.amount_token,
                t.amount_fiat,
                t.exchange_rate,
                t.token.id,
                t.token.symbol,
                t.token.name,
                t.token.underlying_address,
            ])?;
        }

        let mut insert_grade = tx.prepare(
            r#"
            INSERT INTO grade_events (
                address, date, event_id, kind, network_id, tx_hash, timestamp, amount,
                token_id, token_symbol, token_name, token_underlying
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )?;
        for g in grade_events {
            insert_grade.execute(params![
                address,
                date,
                g.id,
                g.kind,
                g.network_id,
                g.transaction.id,
                g.transaction.timestamp,
                g.amount,
                g.token.id,
                g.token.symbol,
                g.token.name,
                g.token.underlying_address,
            ])?;
        }
    }

    tx.commit()?;
    Ok(true)
}

/// Load the stored document for `address`, optionally limited to a date range.
pub fn load_account(conn: &Connection, address: &str, range: DateRange) -> Result<AccountDocument> {
    let address = address.to_lowercase();

    let mut stmt = conn.prepare(
        "SELECT date, start_ts, end_ts, sender, recipient, network_id, tx_hash,
                amount_token, amount_fiat, exchange_rate,
                token_id, token_symbol, token_name, token_underlying
         FROM flow_state
         WHERE address = ?1
           AND (?2 IS NULL OR date >= ?2)
           AND (?3 IS NULL OR date <= ?3)
         ORDER BY date, id",
    )?;
    let flow_state = stmt
        .query_map(params![address, range.start, range.end], |r| {
            Ok(OutputFlow {
                date: r.get(0)?,
                start: r.get(1)?,
                end: r.get(2)?,
                sender: r.get(3)?,
                recipient: r.get(4)?,
                network_id: r.get(5)?,
                tx_hash: r.get(6)?,
                amount_token: r.get(7)?,
                amount_fiat: r.get(8)?,
                exchange_rate: r.get(9)?,
                token: token_at(r, 10)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT date, sender, recipient, tx_hash, network_id,
                amount_token, amount_fiat, exchange_rate,
                token_id, token_symbol, token_name, token_underlying
         FROM transfers
         WHERE address = ?1
           AND (?2 IS NULL OR date >= ?2)
           AND (?3 IS NULL OR date <= ?3)
         ORDER BY date, id",
    )?;
    let transfers = stmt
        .query_map(params![address, range.start, range.end], |r| {
            Ok(OutputTransfer {
                date: r.get(0)?,
                sender: r.get(1)?,
                recipient: r.get(2)?,
                tx_hash: r.get(3)?,
                network_id: r.get(4)?,
                amount_token: r.get(5)?,
                amount_fiat: r.get(6)?,
                exchange_rate: r.get(7)?,
                token: token_at(r, 8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT event_id, kind, network_id, tx_hash, timestamp, amount,
                token_id, token_symbol, token_name, token_underlying
         FROM grade_events
         WHERE address = ?1
           AND (?2 IS NULL OR date >= ?2)
           AND (?3 IS NULL OR date <= ?3)
         ORDER BY date, id",
    )?;
    let grade_events = stmt
        .query_map(params![address, range.start, range.end], |r| {
            Ok(GradeEvent {
                id: r.get(0)?,
                kind: r.get(1)?,
                network_id: r.get(2)?,
                transaction: GradeTransaction {
                    id: r.get(3)?,
                    timestamp: r.get(4)?,
                },
                amount: r.get(5)?,
                token: token_at(r, 6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(AccountDocument {
        address,
        flow_state,
        transfers,
        grade_events,
    })
}

fn token_at(r: &Row<'_>, first: usize) -> rusqlite::Result<TokenMetadata> {
    Ok(TokenMetadata {
        id: r.get(first)?,
        symbol: r.get(first + 1)?,
        name: r.get(first + 2)?,
        underlying_address: r.get(first + 3)?,
    })
}
