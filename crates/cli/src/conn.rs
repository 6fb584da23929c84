use crate::error::CliError;
use connectors::config::{MssqlConfig, OracleConfig};
use serde::Deserialize;
use std::env;

/// Connection document accepted by `--connections`: both endpoints in one
/// JSON file. Individual fields can be overridden from `TRANSORA_*`
/// environment variables so secrets can stay out of the file.
#[derive(Debug, Deserialize)]
pub struct ConnectionsFile {
    pub oracle: OracleConfig,
    pub mssql: MssqlConfig,
}

pub fn load_connections(path: Option<&str>) -> Result<ConnectionsFile, CliError> {
    let mut connections = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<ConnectionsFile>(&raw)?
        }
        None => ConnectionsFile {
            oracle: oracle_from_env()
                .ok_or_else(|| CliError::MissingConfig("oracle (set TRANSORA_ORACLE_*)".into()))?,
            mssql: mssql_from_env()
                .ok_or_else(|| CliError::MissingConfig("mssql (set TRANSORA_MSSQL_*)".into()))?,
        },
    };

    // Environment always wins for secrets.
    if let Ok(password) = env::var("TRANSORA_ORACLE_PASSWORD") {
        connections.oracle.password = password;
    }
    if let Ok(password) = env::var("TRANSORA_MSSQL_PASSWORD") {
        connections.mssql.password = password;
    }
    Ok(connections)
}

fn oracle_from_env() -> Option<OracleConfig> {
    Some(OracleConfig {
        host: env::var("TRANSORA_ORACLE_HOST").ok()?,
        port: env::var("TRANSORA_ORACLE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(1521),
        service: env::var("TRANSORA_ORACLE_SERVICE").ok()?,
        user: env::var("TRANSORA_ORACLE_USER").ok()?,
        password: env::var("TRANSORA_ORACLE_PASSWORD").unwrap_or_default(),
        schema: env::var("TRANSORA_ORACLE_SCHEMA").ok(),
    })
}

fn mssql_from_env() -> Option<MssqlConfig> {
    Some(MssqlConfig {
        host: env::var("TRANSORA_MSSQL_HOST").ok()?,
        port: env::var("TRANSORA_MSSQL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(1433),
        database: env::var("TRANSORA_MSSQL_DATABASE").ok()?,
        user: env::var("TRANSORA_MSSQL_USER").unwrap_or_default(),
        password: env::var("TRANSORA_MSSQL_PASSWORD").unwrap_or_default(),
        trusted: env::var("TRANSORA_MSSQL_TRUSTED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    })
}
