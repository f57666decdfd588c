//! TDS-backed server handle
//!
//! One authenticated connection, driven by a private single-threaded
//! runtime. Statements from concurrent workers queue on the connection lock.

use anyhow::{Context, Result};
use reconciler::{Cell, Param, RemoteError, Row, ServerHandle, Statement};
use tiberius::{AuthMethod, Client, Config, ToSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::ConnectionSettings;

pub struct TdsServer {
    runtime: Runtime,
    client: Mutex<Client<Compat<TcpStream>>>,
}

impl TdsServer {
    /// Open and authenticate a connection
    pub fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .context("Failed to start I/O runtime")?;

        let mut config = Config::new();
        config.host(&settings.host);
        config.port(settings.port);
        config.database(&settings.database);
        config.authentication(AuthMethod::sql_server(&settings.user, &settings.password));
        if settings.trust_cert {
            config.trust_cert();
        }

        let client = runtime.block_on(async {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .with_context(|| {
                    format!("Failed to connect to {}:{}", settings.host, settings.port)
                })?;
            tcp.set_nodelay(true).ok();

            Client::connect(config, tcp.compat_write())
                .await
                .with_context(|| format!("Failed to authenticate as {}", settings.user))
        })?;

        log::info!(
            "Connected to {}:{} (database {})",
            settings.host,
            settings.port,
            settings.database
        );
        Ok(Self {
            runtime,
            client: Mutex::new(client),
        })
    }
}

impl ServerHandle for TdsServer {
    fn execute(&self, statement: &Statement) -> Result<(), RemoteError> {
        log::debug!("Executing: {statement}");
        let sql = statement.sql();
        let refs = param_refs(statement.params());

        self.runtime.block_on(async {
            let mut client = self.client.lock().await;
            client.execute(sql, &refs).await.map_err(remote)?;
            Ok::<_, RemoteError>(())
        })
    }

    fn query_row(&self, statement: &Statement) -> Result<Option<Row>, RemoteError> {
        log::debug!("Querying: {statement}");
        let sql = statement.sql();
        let refs = param_refs(statement.params());

        self.runtime.block_on(async {
            let mut client = self.client.lock().await;
            let stream = client.query(sql, &refs).await.map_err(remote)?;
            let row = stream.into_row().await.map_err(remote)?;
            Ok::<_, RemoteError>(row.as_ref().map(to_row))
        })
    }
}

fn remote(err: tiberius::error::Error) -> RemoteError {
    RemoteError::new(err.to_string())
}

fn param_refs(params: &[Param]) -> Vec<&dyn ToSql> {
    params
        .iter()
        .map(|p| match p {
            Param::Str(s) => s as &dyn ToSql,
            Param::Int(n) => n as &dyn ToSql,
        })
        .collect()
}

/// Probe typed columns before strings; BIT must not fall through
fn to_cell(row: &tiberius::Row, idx: usize) -> Cell {
    if let Ok(Some(v)) = row.try_get::<bool, _>(idx) {
        return Cell::Bool(v);
    }
    if let Ok(Some(v)) = row.try_get::<u8, _>(idx) {
        return Cell::Int(i64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<i16, _>(idx) {
        return Cell::Int(i64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return Cell::Int(i64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return Cell::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<&str, _>(idx) {
        return Cell::Str(v.to_string());
    }
    Cell::Null
}

fn to_row(row: &tiberius::Row) -> Row {
    (0..row.columns().len()).map(|i| to_cell(row, i)).collect()
}
