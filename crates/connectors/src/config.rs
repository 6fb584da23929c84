use serde::{Deserialize, Serialize};

/// Validated Oracle connection settings. Secrets arrive from the external
/// credential layer; this type only carries them to the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub host: String,
    #[serde(default = "default_oracle_port")]
    pub port: u16,
    pub service: String,
    pub user: String,
    pub password: String,
    /// Schema whose objects are migrated; defaults to the user.
    #[serde(default)]
    pub schema: Option<String>,
}

fn default_oracle_port() -> u16 {
    1521
}

impl OracleConfig {
    pub fn connect_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service)
    }

    pub fn schema(&self) -> String {
        self.schema
            .clone()
            .unwrap_or_else(|| self.user.to_uppercase())
    }
}

/// Validated SQL Server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MssqlConfig {
    pub host: String,
    #[serde(default = "default_mssql_port")]
    pub port: u16,
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Windows integrated auth; when set, user/password are ignored.
    #[serde(default)]
    pub trusted: bool,
}

fn default_mssql_port() -> u16 {
    1433
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_connect_string_format() {
        let cfg: OracleConfig = serde_json::from_str(
            r#"{"host": "db1", "service": "ORCLPDB1", "user": "hr", "password": "x"}"#,
        )
        .unwrap();
        assert_eq!(cfg.connect_string(), "//db1:1521/ORCLPDB1");
        assert_eq!(cfg.schema(), "HR");
    }
}
