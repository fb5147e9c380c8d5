//! Subscriber wiring: console formatter, log-file layer, initialisation.
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::sync::Mutex;

use tracing::field::{Field, Visit};
use tracing::{Event, Level};

use super::utils::{clock, log_file_path, strip_ansi, timestamp};

/// Target for phase headings.
pub(super) const STAGE_TARGET: &str = "smb_zfs::stage";

/// Target for dry-run lines.
pub(super) const DRY_RUN_TARGET: &str = "smb_zfs::dry_run";

/// Where console output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    /// Info on stdout, warnings and errors on stderr.
    Text,
    /// Everything on stderr so stdout carries only the JSON result.
    Json,
}

/// How a line is presented, derived from level and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Stage,
    DryRun,
    Error,
    Warn,
    Info,
    Debug,
}

impl Kind {
    fn of(event: &Event<'_>) -> Self {
        let metadata = event.metadata();
        match (*metadata.level(), metadata.target()) {
            (Level::ERROR, _) => Self::Error,
            (Level::WARN, _) => Self::Warn,
            (Level::INFO, STAGE_TARGET) => Self::Stage,
            (Level::INFO, DRY_RUN_TARGET) => Self::DryRun,
            (Level::INFO, _) => Self::Info,
            _ => Self::Debug,
        }
    }

    /// Tag used in the log file.
    const fn tag(self) -> &'static str {
        match self {
            Self::Stage => "STAGE",
            Self::DryRun => "PLAN ",
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
        }
    }
}

/// The `message` field of an event.
fn message(event: &Event<'_>) -> String {
    #[derive(Default)]
    struct Message(String);

    impl Visit for Message {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "message" {
                value.clone_into(&mut self.0);
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    let mut visitor = Message::default();
    event.record(&mut visitor);
    visitor.0
}

/// Appends every event to the command's log file, without colour codes.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<File>,
}

impl FileLayer {
    /// Open the log file for `command` in append mode and write a run
    /// header.  `None` when the file cannot be opened.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path).ok()?;
        let version =
            option_env!("SMB_ZFS_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        writeln!(
            file,
            "\n## {} smb-zfs {version} {command} (pid {})",
            timestamp(),
            std::process::id()
        )
        .ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let kind = Kind::of(event);
        let line = format!("{} {} {}", clock(), kind.tag(), strip_ansi(&message(event)));
        if let Ok(mut file) = self.file.lock() {
            writeln!(file, "{line}").ok();
        }
    }
}

/// Console formatter: headings in bold, warnings and errors prefixed.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let msg = message(event);
        match Kind::of(event) {
            Kind::Stage => writeln!(writer, "\x1b[1;34m::\x1b[0m \x1b[1m{msg}\x1b[0m"),
            Kind::DryRun => writeln!(writer, "   \x1b[36m(dry run)\x1b[0m {msg}"),
            Kind::Error => writeln!(writer, "\x1b[1;31merror:\x1b[0m {msg}"),
            Kind::Warn => writeln!(writer, "\x1b[1;33mwarning:\x1b[0m {msg}"),
            Kind::Info => writeln!(writer, "   {msg}"),
            Kind::Debug => writeln!(writer, "   \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Install the global subscriber.  Call once, before anything logs.
///
/// The console shows `debug` only when `verbose`; the log file
/// (`<log dir>/<command>.log`) always gets everything.
pub fn init_subscriber(verbose: bool, mode: ConsoleMode, command: &str) {
    use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt as _};
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let writer = match mode {
        ConsoleMode::Text => BoxMakeWriter::new(
            std::io::stderr
                .with_max_level(Level::WARN)
                .and(std::io::stdout.with_min_level(Level::INFO)),
        ),
        ConsoleMode::Json => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .event_format(ConsoleFormatter)
                .with_writer(writer)
                .with_filter(console_level),
        )
        .with(FileLayer::new(command).map(|layer| layer.with_filter(LevelFilter::DEBUG)))
        .init();
}
