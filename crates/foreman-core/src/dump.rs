//! Database dump strategies.
//!
//! [`ShellDumper`] runs the external `mysqldump` binary; [`InProcessDumper`]
//! rebuilds the dump from schema and row queries. [`FallbackDump`] tries the
//! first and degrades to the second without surfacing the first failure.

use crate::error::DumpError;
use crate::host::{DatabaseEngine, DatabaseHost};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub socket: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpOptions {
    pub connection: ConnectionInfo,
    /// Table names left out of the dump.
    #[serde(default)]
    pub excluded_tables: Vec<String>,
}

#[async_trait]
pub trait DumpStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn dump(&self, path: &Path, options: &DumpOptions) -> Result<(), DumpError>;
}

/// Dump through an external `mysqldump` process.
pub struct ShellDumper {
    program: PathBuf,
    host: Arc<dyn DatabaseHost>,
}

impl ShellDumper {
    pub fn new(program: impl Into<PathBuf>, host: Arc<dyn DatabaseHost>) -> Self {
        Self {
            program: program.into(),
            host,
        }
    }

    /// Arguments passed to `mysqldump`. The password travels in `MYSQL_PWD`
    /// so it never shows up in the process list.
    pub fn arguments(path: &Path, options: &DumpOptions, engine: DatabaseEngine) -> Vec<String> {
        let conn = &options.connection;
        let mut args = vec![
            format!("--user={}", conn.username),
            format!("--host={}", conn.host),
        ];

        if let Some(port) = conn.port.filter(|port| *port != 0) {
            args.push(format!("--port={}", port));
        }
        if let Some(socket) = conn.socket.as_deref().filter(|s| !s.is_empty()) {
            args.push(format!("--socket={}", socket));
        }

        args.push("--skip-comments".to_string());
        args.push("--extended-insert".to_string());

        // MariaDB's mysqldump does not know this variable.
        if engine != DatabaseEngine::MariaDb {
            args.push("--column-statistics=0".to_string());
        }

        for table in &options.excluded_tables {
            args.push(format!("--ignore-table={}.{}", conn.database, table));
        }

        args.push(format!("--result-file={}", path.display()));
        args.push(conn.database.clone());
        args
    }
}

#[async_trait]
impl DumpStrategy for ShellDumper {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn dump(&self, path: &Path, options: &DumpOptions) -> Result<(), DumpError> {
        let engine = DatabaseEngine::detect(&self.host.server_info().await);
        let args = Self::arguments(path, options, engine);
        debug!(program = %self.program.display(), "Running external dump");

        let output = Command::new(&self.program)
            .args(&args)
            .env("MYSQL_PWD", &options.connection.password)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DumpError::Process(format!("{}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DumpError::Process(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Dump built from `SHOW CREATE TABLE` and row queries through the host.
pub struct InProcessDumper {
    host: Arc<dyn DatabaseHost>,
}

impl InProcessDumper {
    pub fn new(host: Arc<dyn DatabaseHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl DumpStrategy for InProcessDumper {
    fn name(&self) -> &'static str {
        "in_process"
    }

    async fn dump(&self, path: &Path, options: &DumpOptions) -> Result<(), DumpError> {
        let tables = self.host.tables().await?;
        let mut out = BufWriter::new(File::create(path).await?);

        out.write_all(b"SET FOREIGN_KEY_CHECKS=0;\n").await?;
        out.write_all(b"SET NAMES utf8mb4;\n\n").await?;

        for table in tables
            .iter()
            .filter(|table| !options.excluded_tables.contains(&table.name))
        {
            let name = quote_identifier(&table.name);
            let create = self.host.create_statement(&table.name).await?;

            out.write_all(format!("DROP TABLE IF EXISTS {};\n", name).as_bytes())
                .await?;
            out.write_all(create.trim_end_matches(';').as_bytes()).await?;
            out.write_all(b";\n\n").await?;

            for row in self.host.table_rows(&table.name).await? {
                out.write_all(insert_statement(&name, &row).as_bytes()).await?;
            }
            out.write_all(b"\n").await?;
        }

        out.write_all(b"SET FOREIGN_KEY_CHECKS=1;\n").await?;
        out.flush().await?;
        Ok(())
    }
}

/// Which strategy produced a dump, and why the preferred one was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpReport {
    pub strategy: &'static str,
    pub fallback_reason: Option<String>,
}

/// Preferred strategy with a silent fallback.
///
/// The fallback runs at most once and the preferred path is never retried.
/// Only the fallback's own error can reach the caller.
pub struct FallbackDump {
    preferred: Option<Arc<dyn DumpStrategy>>,
    fallback: Arc<dyn DumpStrategy>,
}

impl FallbackDump {
    pub fn new(preferred: Option<Arc<dyn DumpStrategy>>, fallback: Arc<dyn DumpStrategy>) -> Self {
        Self {
            preferred,
            fallback,
        }
    }

    pub async fn dump(&self, path: &Path, options: &DumpOptions) -> Result<DumpReport, DumpError> {
        let mut fallback_reason = None;

        if let Some(preferred) = &self.preferred {
            match preferred.dump(path, options).await {
                Ok(()) => {
                    info!(strategy = preferred.name(), path = %path.display(), "Database dumped");
                    return Ok(DumpReport {
                        strategy: preferred.name(),
                        fallback_reason: None,
                    });
                }
                Err(e) => {
                    warn!(
                        strategy = preferred.name(),
                        fallback = self.fallback.name(),
                        "Dump failed, falling back: {}",
                        e
                    );
                    fallback_reason = Some(e.to_string());
                }
            }
        }

        self.fallback.dump(path, options).await?;
        info!(strategy = self.fallback.name(), path = %path.display(), "Database dumped");
        Ok(DumpReport {
            strategy: self.fallback.name(),
            fallback_reason,
        })
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn insert_statement(table: &str, row: &Map<String, Value>) -> String {
    let columns: Vec<String> = row.keys().map(|c| quote_identifier(c)).collect();
    let values: Vec<String> = row.values().map(sql_literal).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({});\n",
        table,
        columns.join(", "),
        values.join(", ")
    )
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_string(s),
        other => quote_string(&other.to_string()),
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryDatabaseHost;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FailingDumper {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl DumpStrategy for FailingDumper {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn dump(&self, _path: &Path, _options: &DumpOptions) -> Result<(), DumpError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DumpError::Process("mysqldump: command not found".to_string()))
        }
    }

    fn options(excluded: &[&str]) -> DumpOptions {
        DumpOptions {
            connection: ConnectionInfo {
                database: "site".to_string(),
                username: "root".to_string(),
                password: "secret".to_string(),
                host: "localhost".to_string(),
                port: Some(3306),
                socket: None,
            },
            excluded_tables: excluded.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn database() -> Arc<MemoryDatabaseHost> {
        let host = Arc::new(MemoryDatabaseHost::new("site", "wp_"));
        host.add_table(
            "wp_options",
            "CREATE TABLE `wp_options` (`id` int, `name` text)",
            vec![json!({"id": 1, "name": "O'Brien"}), json!({"id": 2, "name": null})],
        );
        host.add_table("wp_logs", "CREATE TABLE `wp_logs` (`id` int)", vec![json!({"id": 9})]);
        host
    }

    #[test]
    fn shell_arguments_for_mysql() {
        let path = Path::new("/tmp/site.sql");
        let args = ShellDumper::arguments(path, &options(&["wp_logs"]), DatabaseEngine::MySql);

        assert!(args.contains(&"--port=3306".to_string()));
        assert!(args.contains(&"--column-statistics=0".to_string()));
        assert!(args.contains(&"--ignore-table=site.wp_logs".to_string()));
        assert!(args.contains(&"--result-file=/tmp/site.sql".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("site"));
        assert!(!args.iter().any(|a| a.contains("secret")));
    }

    #[test]
    fn shell_arguments_skip_column_statistics_on_mariadb() {
        let args = ShellDumper::arguments(Path::new("/tmp/x.sql"), &options(&[]), DatabaseEngine::MariaDb);
        assert!(!args.contains(&"--column-statistics=0".to_string()));
    }

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(sql_literal(&json!("O'Brien\n")), "'O\\'Brien\\n'");
        assert_eq!(sql_literal(&json!(null)), "NULL");
        assert_eq!(sql_literal(&json!(true)), "1");
        assert_eq!(sql_literal(&json!(12.5)), "12.5");
    }

    #[tokio::test]
    async fn in_process_dump_writes_statements_and_skips_excluded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.sql");

        InProcessDumper::new(database())
            .dump(&path, &options(&["wp_logs"]))
            .await
            .unwrap();

        let sql = std::fs::read_to_string(&path).unwrap();
        assert!(sql.contains("DROP TABLE IF EXISTS `wp_options`;"));
        assert!(sql.contains("CREATE TABLE `wp_options` (`id` int, `name` text);"));
        assert!(sql.contains("INSERT INTO `wp_options` (`id`, `name`) VALUES (1, 'O\\'Brien');"));
        assert!(sql.contains("VALUES (2, NULL);"));
        assert!(!sql.contains("wp_logs"));
    }

    #[tokio::test]
    async fn fallback_runs_after_preferred_failure_without_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.sql");
        let failing = Arc::new(FailingDumper {
            attempts: AtomicUsize::new(0),
        });

        let policy = FallbackDump::new(
            Some(failing.clone() as Arc<dyn DumpStrategy>),
            Arc::new(InProcessDumper::new(database())),
        );
        let report = policy.dump(&path, &options(&[])).await.unwrap();

        assert_eq!(report.strategy, "in_process");
        assert!(report.fallback_reason.unwrap().contains("command not found"));
        assert_eq!(failing.attempts.load(Ordering::SeqCst), 1);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn missing_binary_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.sql");
        let host = database();

        let policy = FallbackDump::new(
            Some(Arc::new(ShellDumper::new(dir.path().join("no-such-mysqldump"), host.clone()))
                as Arc<dyn DumpStrategy>),
            Arc::new(InProcessDumper::new(host)),
        );
        let report = policy.dump(&path, &options(&[])).await.unwrap();

        assert_eq!(report.strategy, "in_process");
        assert!(report.fallback_reason.is_some());
        assert!(std::fs::read_to_string(&path).unwrap().contains("wp_logs"));
    }

    #[tokio::test]
    async fn without_preferred_strategy_goes_straight_to_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.sql");

        let policy = FallbackDump::new(None, Arc::new(InProcessDumper::new(database())));
        let report = policy.dump(&path, &options(&[])).await.unwrap();

        assert_eq!(
            report,
            DumpReport {
                strategy: "in_process",
                fallback_reason: None
            }
        );
    }
}
