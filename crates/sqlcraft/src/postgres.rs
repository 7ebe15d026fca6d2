//! Built-in postgres driver on top of `tokio-postgres`.

use crate::connection::{Config, Driver};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::handle::DbHandle;
use crate::record::Record;
use crate::value::SqlValue;
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

/// Opens [`PgHandle`]s without TLS.
#[derive(Debug, Clone, Default)]
pub struct PgDriver;

fn pg_config(config: &Config) -> OrmResult<tokio_postgres::Config> {
    let mut pg = tokio_postgres::Config::new();
    pg.host(config.host.as_str())
        .user(config.user.as_str())
        .password(config.password.as_str())
        .dbname(config.database.as_str());
    if !config.port.is_empty() {
        let port = config
            .port
            .parse::<u16>()
            .map_err(|e| OrmError::Config(format!("invalid port `{}`: {e}", config.port)))?;
        pg.port(port);
    }
    Ok(pg)
}

#[async_trait]
impl Driver for PgDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn open(&self, config: &Config) -> OrmResult<Box<dyn DbHandle>> {
        let (client, connection) = pg_config(config)?
            .connect(NoTls)
            .await
            .map_err(|e| OrmError::Connection(format!("{config}: {e}")))?;

        let task = tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::warn!(target: "sqlcraft", error = %err, "postgres connection closed with error");
            }
        });

        Ok(Box::new(PgHandle {
            client,
            task,
            debug: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A single `tokio-postgres` client.
pub struct PgHandle {
    client: Client,
    task: JoinHandle<()>,
    debug: AtomicBool,
    closed: AtomicBool,
}

impl PgHandle {
    fn client(&self) -> OrmResult<&Client> {
        if self.closed.load(Ordering::SeqCst) || self.client.is_closed() {
            return Err(OrmError::driver("sql: database is closed"));
        }
        Ok(&self.client)
    }
}

impl std::fmt::Debug for PgHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgHandle")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Drop for PgHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl DbHandle for PgHandle {
    async fn exec(&self, sql: &str, args: &[SqlValue]) -> OrmResult<u64> {
        let params: Vec<PgParam<'_>> = args.iter().map(PgParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        Ok(self.client()?.execute(sql, &refs).await?)
    }

    async fn query(&self, sql: &str, args: &[SqlValue]) -> OrmResult<Vec<Record>> {
        let params: Vec<PgParam<'_>> = args.iter().map(PgParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = self.client()?.query(sql, &refs).await?;
        rows_to_records(&rows)
    }

    async fn ping(&self) -> OrmResult<()> {
        self.client()?
            .batch_execute("SELECT 1")
            .await
            .map_err(|e| OrmError::Connection(e.to_string()))
    }

    async fn close(&self) -> OrmResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.task.abort();
        Ok(())
    }

    fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }
}

/// Encodes a [`SqlValue`] as whatever type the prepared statement expects.
#[derive(Debug)]
struct PgParam<'a>(&'a SqlValue);

fn is_text(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN)
}

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.0 {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Float(f) if !f.is_finite() => Ok(IsNull::Yes),
            SqlValue::Text(s) => match *ty {
                Type::UUID => Uuid::parse_str(s)?.to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
                _ if is_text(ty) => s.as_str().to_sql(ty, out),
                _ => Err(format!("cannot bind text to {ty}").into()),
            },
            SqlValue::Int(n) => match *ty {
                Type::INT2 => i16::try_from(*n)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*n)?.to_sql(ty, out),
                Type::INT8 => n.to_sql(ty, out),
                Type::FLOAT4 => (*n as f32).to_sql(ty, out),
                Type::FLOAT8 => (*n as f64).to_sql(ty, out),
                Type::BOOL => (*n != 0).to_sql(ty, out),
                _ if is_text(ty) => n.to_string().to_sql(ty, out),
                _ => Err(format!("cannot bind integer to {ty}").into()),
            },
            SqlValue::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                _ if is_text(ty) => f.to_string().to_sql(ty, out),
                _ => Err(format!("cannot bind float to {ty}").into()),
            },
            SqlValue::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ if is_text(ty) => b.to_string().to_sql(ty, out),
                _ => Err(format!("cannot bind boolean to {ty}").into()),
            },
            SqlValue::Timestamp(ts) => match *ty {
                Type::TIMESTAMP => ts.to_sql(ty, out),
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                Type::DATE => ts.date().to_sql(ty, out),
                _ if is_text(ty) => self.0.to_plain().to_sql(ty, out),
                _ => Err(format!("cannot bind timestamp to {ty}").into()),
            },
            SqlValue::Uuid(id) => match *ty {
                Type::UUID => id.to_sql(ty, out),
                _ if is_text(ty) => id.to_string().to_sql(ty, out),
                _ => Err(format!("cannot bind uuid to {ty}").into()),
            },
            SqlValue::List(_) => Err("list parameters must be expanded before binding".into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn rows_to_records(rows: &[Row]) -> OrmResult<Vec<Record>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    rows.iter()
        .map(|row| {
            let values = (0..columns.len())
                .map(|idx| decode_cell(row, idx))
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(Record::new(columns.clone(), values))
        })
        .collect()
}

fn cell<'a, T>(row: &'a Row, idx: usize) -> OrmResult<Option<T>>
where
    T: FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| OrmError::decode(row.columns()[idx].name(), e.to_string()))
}

fn decode_cell(row: &Row, idx: usize) -> OrmResult<SqlValue> {
    let ty = row.columns()[idx].type_().clone();
    let value = match ty {
        Type::BOOL => cell::<bool>(row, idx)?.map(SqlValue::Bool),
        Type::INT2 => cell::<i16>(row, idx)?.map(|n| SqlValue::Int(n.into())),
        Type::INT4 => cell::<i32>(row, idx)?.map(|n| SqlValue::Int(n.into())),
        Type::INT8 => cell::<i64>(row, idx)?.map(SqlValue::Int),
        Type::FLOAT4 => cell::<f32>(row, idx)?.map(|f| SqlValue::Float(f.into())),
        Type::FLOAT8 => cell::<f64>(row, idx)?.map(SqlValue::Float),
        Type::TIMESTAMP => cell::<NaiveDateTime>(row, idx)?.map(SqlValue::Timestamp),
        Type::TIMESTAMPTZ => cell::<DateTime<Utc>>(row, idx)?.map(SqlValue::from),
        Type::DATE => cell::<NaiveDate>(row, idx)?
            .map(|d| SqlValue::Timestamp(d.and_time(chrono::NaiveTime::MIN))),
        Type::UUID => cell::<Uuid>(row, idx)?.map(SqlValue::Uuid),
        Type::JSON | Type::JSONB => {
            cell::<serde_json::Value>(row, idx)?.map(|v| SqlValue::Text(v.to_string()))
        }
        Type::NUMERIC => cell::<PgNumeric>(row, idx)?.map(|n| SqlValue::Text(n.0)),
        _ if <String as FromSql<'_>>::accepts(&ty) => cell::<String>(row, idx)?.map(SqlValue::Text),
        _ => {
            return Err(OrmError::decode(
                row.columns()[idx].name(),
                format!("unsupported column type {ty}"),
            ));
        }
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

/// NUMERIC rendered as its exact decimal text.
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        parse_numeric(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decode the binary NUMERIC layout: ndigits, weight, sign, dscale, then
/// `ndigits` base-10000 groups. Group `i` is worth `10000^(weight - i)`.
fn parse_numeric(raw: &[u8]) -> Result<String, Box<dyn Error + Sync + Send>> {
    let word = |i: usize| -> Result<u16, Box<dyn Error + Sync + Send>> {
        raw.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };
    let ndigits = usize::from(word(0)?);
    let weight = i32::from(word(1)? as i16);
    let sign = word(2)?;
    let dscale = usize::from(word(3)?);

    match sign {
        NUMERIC_POS | NUMERIC_NEG => {}
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        other => return Err(format!("invalid numeric sign {other:#06x}").into()),
    }
    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Result<Vec<_>, _>>()?;
    let group = |i: i32| -> u16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&group(0).to_string());
        for i in 1..=weight {
            out.push_str(&format!("{:04}", group(i)));
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", group(i)));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}
