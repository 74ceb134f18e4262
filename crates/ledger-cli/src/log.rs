use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn make_env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var("BUCKETD_LOG")
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive(level.into())
}

/// Initialize a non-blocking, env-filterable subscriber writing to stdout.
/// The returned guard must be held for the process lifetime: dropping it
/// flushes the background writer thread.
pub fn init_logging(verbose: bool) -> WorkerGuard {
    let (stdout, guard) = tracing_appender::non_blocking(std::io::stdout());

    let output = tracing_subscriber::fmt::layer().with_writer(stdout);
    let output = if cfg!(debug_assertions) {
        output.with_file(true).with_line_number(true)
    } else {
        output
    };

    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(make_env_filter(level))
        .with(output)
        .try_init()
        .expect("logging can only be initialized once per process");

    guard
}
