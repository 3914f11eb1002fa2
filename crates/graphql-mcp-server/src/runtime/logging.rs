//! Logging config and utilities
//!
//! This module is only used by the main binary and provides logging config structures and setup
//! helper functions

mod log_rotation_kind;

use std::path::Path;

use log_rotation_kind::LogRotationKind;
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logging related options
#[derive(Debug, Deserialize, JsonSchema)]
pub struct Logging {
    /// The log level to use for tracing
    #[serde(
        default = "defaults::log_level",
        deserialize_with = "parsers::from_str"
    )]
    #[schemars(schema_with = "level")]
    pub level: Level,

    /// Directory for rolling log files; logs go to stderr when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Log file rotation period to use when log file path provided
    /// [default: Hourly]
    #[serde(default = "defaults::rotation")]
    pub rotation: LogRotationKind,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            path: None,
            rotation: defaults::rotation(),
        }
    }
}

impl Logging {
    /// Install the global subscriber
    ///
    /// The returned guard flushes the file writer and must be held for the
    /// lifetime of the process.
    pub fn setup(&self) -> Result<Option<WorkerGuard>, anyhow::Error> {
        let env_filter = self.env_filter()?;

        match &self.path {
            Some(path) => self.setup_file_logging(path, env_filter),
            None => setup_stderr_logging(env_filter),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, anyhow::Error> {
        let mut env_filter = EnvFilter::from_default_env().add_directive(self.level.into());

        if self.level == Level::INFO {
            env_filter = env_filter
                .add_directive("hyper=warn".parse()?)
                .add_directive("reqwest=warn".parse()?);
        }
        Ok(env_filter)
    }

    /// Sets up rolling file appender logging but falls back to stderr logging on failure
    fn setup_file_logging(
        &self,
        path: &Path,
        env_filter: EnvFilter,
    ) -> Result<Option<WorkerGuard>, anyhow::Error> {
        if let Err(error) = std::fs::create_dir_all(path) {
            eprintln!(
                "Could not build log path {} ({error}) - falling back to stderr",
                path.display()
            );
            return setup_stderr_logging(env_filter);
        }

        let (non_blocking_writer, guard) = match RollingFileAppender::builder()
            .rotation(self.rotation.clone().into())
            .filename_prefix("graphql_mcp_server")
            .filename_suffix("log")
            .build(path)
        {
            Ok(appender) => tracing_appender::non_blocking(appender),
            Err(error) => {
                eprintln!("Log file setup failed ({error}) - falling back to stderr");
                return setup_stderr_logging(env_filter);
            }
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking_writer)
                    .with_ansi(false)
                    .with_target(false),
            )
            .init();

        Ok(Some(guard))
    }
}

/// Sets up stderr logging, leaving stdout to the stdio transport
fn setup_stderr_logging(env_filter: EnvFilter) -> Result<Option<WorkerGuard>, anyhow::Error> {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false),
        )
        .init();

    Ok(None)
}

fn level(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    /// Log level
    #[derive(JsonSchema)]
    #[schemars(rename_all = "lowercase")]
    // This is just an intermediate type to auto create schema information for,
    // so it is OK if it is never used
    #[allow(dead_code)]
    enum Level {
        Trace,
        Debug,
        Info,
        Warn,
        Error,
    }

    Level::json_schema(generator)
}

mod defaults {
    use tracing::Level;

    use super::LogRotationKind;

    pub(super) const fn log_level() -> Level {
        Level::INFO
    }

    pub(super) const fn rotation() -> LogRotationKind {
        LogRotationKind::Hourly
    }
}

mod parsers {
    use std::{fmt::Display, marker::PhantomData, str::FromStr};

    use serde::Deserializer;

    pub(super) fn from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        struct FromStrVisitor<Inner> {
            _phantom: PhantomData<Inner>,
        }
        impl<Inner> serde::de::Visitor<'_> for FromStrVisitor<Inner>
        where
            Inner: FromStr,
            <Inner as FromStr>::Err: Display,
        {
            type Value = Inner;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a log level such as info or debug")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Inner::from_str(v).map_err(|e| serde::de::Error::custom(e.to_string()))
            }
        }

        deserializer.deserialize_str(FromStrVisitor {
            _phantom: PhantomData,
        })
    }
}
