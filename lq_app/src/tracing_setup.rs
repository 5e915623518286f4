use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config_loader::LogRotation;
use crate::config_loader::LoggingConfig;

fn file_appender(app_name: &str, logging: &LoggingConfig) -> RollingFileAppender {
    let file_name = format!("{app_name}.log");
    match logging.rotation {
        LogRotation::Hourly => tracing_appender::rolling::hourly(&logging.dir, file_name),
        LogRotation::Daily => tracing_appender::rolling::daily(&logging.dir, file_name),
        LogRotation::Never => tracing_appender::rolling::never(&logging.dir, file_name),
    }
}

/// Install the global subscriber: non-blocking file output, optionally mirrored to the console
///
/// `RUST_LOG` wins over the configured level. Keep the returned guard alive
/// for the whole run or buffered lines are lost.
pub fn init(app_name: &str, logging: &LoggingConfig) -> WorkerGuard {
    let _ = std::fs::create_dir_all(&logging.dir);

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(app_name, logging));

    let env_filter = EnvFilter::builder().with_default_directive(logging.level().into()).from_env_lossy();

    let file_layer =
        fmt::layer().with_writer(non_blocking).with_target(true).with_thread_ids(true).with_line_number(true).with_ansi(false).compact();

    // Console logs go to stderr so command output on stdout stays parseable
    let console_layer = logging.console.then(|| fmt::layer().with_writer(io::stderr).with_target(false).with_ansi(true).compact());

    tracing_subscriber::registry().with(env_filter).with(file_layer).with(console_layer).init();

    guard
}
