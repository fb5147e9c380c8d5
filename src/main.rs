//! `smb-zfs` command-line entry point: parses arguments, installs the
//! logging subscriber and maps the command result to an exit code.
use std::process::ExitCode;

use clap::Parser;
use smb_zfs::cli::Cli;
use smb_zfs::commands;
use smb_zfs::logging::{ConsoleMode, Log as _, Logger, init_subscriber};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let command = args.command.log_name();
    let mode = if args.global.json {
        ConsoleMode::Json
    } else {
        ConsoleMode::Text
    };
    init_subscriber(args.global.verbose, mode, command);
    let log = Logger::new(command);

    match commands::run(&args, &log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = format!("{err:#}");
            log.error(&message);
            if args.global.json {
                println!("{}", serde_json::json!({ "error": message }));
            }
            ExitCode::FAILURE
        }
    }
}
