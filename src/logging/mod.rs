//! Console and file logging built on `tracing`.
//!
//! Operations log through the [`Log`] trait.  [`Logger`] forwards to
//! `tracing`, whose subscriber (see [`init_subscriber`]) prints to the
//! console and appends every event, debug included, to a per-command log
//! file.

mod logger;
mod subscriber;
mod types;
mod utils;

pub use logger::Logger;
pub use subscriber::{ConsoleMode, init_subscriber};
pub use types::{Log, StepRecord, StepStatus};

/// Serializes environment changes across parallel test threads.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// A [`Logger`] whose events go to a log file in a temporary directory.
///
/// The subscriber is thread-local and stays installed until the fixture is
/// dropped.
#[cfg(test)]
pub(crate) struct LoggerFixture {
    pub(crate) log: Logger,
    pub(crate) dir: tempfile::TempDir,
    _dispatch: tracing::dispatcher::DefaultGuard,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl LoggerFixture {
    pub(crate) fn new(command: &str) -> Self {
        use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

        let dir = tempfile::tempdir().expect("temp dir");
        let (layer, log) = {
            let _env = TEST_ENV_MUTEX
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            // SAFETY: Protected by TEST_ENV_MUTEX; removed before it is released.
            #[allow(unsafe_code)]
            unsafe {
                std::env::set_var(utils::LOG_DIR_ENV, dir.path());
            }
            let layer = subscriber::FileLayer::new(command).expect("file layer");
            let log = Logger::new(command);
            // SAFETY: as above.
            #[allow(unsafe_code)]
            unsafe {
                std::env::remove_var(utils::LOG_DIR_ENV);
            }
            (layer, log)
        };
        let subscriber =
            tracing_subscriber::registry().with(layer.with_filter(LevelFilter::DEBUG));
        let dispatch = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
        Self {
            log,
            dir,
            _dispatch: dispatch,
        }
    }

    /// Contents of the log file so far.
    pub(crate) fn contents(&self) -> String {
        let path = self.log.log_path().expect("log path");
        std::fs::read_to_string(path).expect("read log file")
    }
}
