//! Command-line front end over the engine and the in-memory store

mod commands;

pub use commands::{Cli, Commands, ScopeArgs};

use crate::config::{Domain, EngineConfig};
use crate::core::temporal::{TimeWindow, Timestamp};
use crate::engine::{CorrelationEngine, ReportScope};
use crate::error::{Error, Result};
use crate::project::project_macro_steps;
use crate::storage::InMemoryStore;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

impl ScopeArgs {
    /// Reporting window; both bounds are required together
    pub fn window(&self) -> Result<Option<TimeWindow>> {
        match (&self.start, &self.stop) {
            (Some(start), Some(stop)) => Ok(Some(TimeWindow::new(
                Timestamp::parse(start)?,
                Timestamp::parse(stop)?,
            )?)),
            (None, None) => Ok(None),
            _ => Err(Error::Configuration(
                "--start and --stop must be given together".to_string(),
            )),
        }
    }

    fn engine(&self) -> Result<(CorrelationEngine, ReportScope)> {
        let config = EngineConfig::load(self.config.as_deref())?;
        let store = InMemoryStore::load_json(&self.store)?;
        tracing::debug!(events = store.len(), path = %self.store.display(), "store loaded");
        let scope = ReportScope::new(self.window()?, self.satellite.clone());
        Ok((CorrelationEngine::new(Arc::new(store), config), scope))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Execute one parsed command, printing its results as JSON on stdout
pub async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Report { scope, domain } => {
            let domain: Domain = domain.parse()?;
            let (engine, scope) = scope.engine()?;
            print_json(&engine.report(domain, &scope).await?)
        }
        Commands::Timeliness { scope } => {
            let (engine, scope) = scope.engine()?;
            print_json(&engine.timeliness(&scope).await?)
        }
        Commands::Volume { scope } => {
            let (engine, scope) = scope.engine()?;
            print_json(&engine.volume(&scope).await?)
        }
        Commands::MacroSteps { scope } => {
            let (engine, scope) = scope.engine()?;
            print_json(&project_macro_steps(&engine.macro_steps(&scope).await?))
        }
        Commands::CheckConfig { config } => {
            if !config.exists() {
                return Err(Error::Configuration(format!(
                    "{} does not exist",
                    config.display()
                )));
            }
            EngineConfig::load(Some(config.as_path()))?;
            println!("{}: ok", config.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_report_command() {
        let cli = Cli::parse_from([
            "completeness-engine",
            "report",
            "--store",
            "dump.json",
            "--domain",
            "hktm",
            "--start",
            "2018-07-21T00:00:00Z",
            "--stop",
            "2018-07-22T00:00:00Z",
            "--satellite",
            "S2A",
        ]);
        match cli.command {
            Commands::Report { scope, domain } => {
                assert_eq!(domain, "hktm");
                assert_eq!(scope.satellite.as_deref(), Some("S2A"));
                assert!(scope.window().unwrap().is_some());
            }
            _ => panic!("expected report"),
        }
        assert!(!cli.log_json);
    }

    #[test]
    fn test_half_open_window_rejected() {
        let cli = Cli::parse_from([
            "completeness-engine",
            "volume",
            "--store",
            "dump.json",
            "--start",
            "2018-07-21T00:00:00Z",
        ]);
        let Commands::Volume { scope } = cli.command else {
            panic!("expected volume");
        };
        assert!(matches!(scope.window(), Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_check_config() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[hktm]\ntimeliness_threshold_minutes = 90.0\n").unwrap();
        assert!(run(Commands::CheckConfig { config: good }).await.is_ok());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[hktm]\ntimeliness_threshold_minutes = -1.0\n").unwrap();
        assert!(run(Commands::CheckConfig { config: bad }).await.is_err());

        let absent = dir.path().join("absent.toml");
        assert!(run(Commands::CheckConfig { config: absent }).await.is_err());
    }
}
