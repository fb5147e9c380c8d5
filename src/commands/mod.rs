//! Subcommand orchestration: build the adapters, run one operation, render
//! the result.
pub mod prompt;
pub mod render;
pub mod requests;

use std::io::{self, Write as _};

use anyhow::{Context as _, Result, bail};
use clap::CommandFactory as _;
use clap_complete::Shell;

use crate::cli::{Cli, Command, CreateCommand, DeleteCommand, GlobalOpts, ModifyCommand, toggle};
use crate::config::Settings;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log as _, Logger};
use crate::operations::list::{Listing, get_state, list};
use crate::operations::password::{Caller, change_password};
use crate::operations::validate::QuotaSetting;
use crate::operations::{
    AssumeYes, Confirm, Context, Host, Outcome, group, remove, setup, share, user,
};
use crate::platform;
use crate::resources::account::SystemAccounts;
use crate::resources::avahi::AvahiServiceFile;
use crate::resources::dataset::ZfsDatasets;
use crate::resources::service::Systemctl;
use crate::resources::smb_conf::SambaConfigFile;
use crate::resources::smb_passwd::SambaPasswords;
use crate::state::{StateDocument, StateStore};

/// What a command produced.
#[derive(Debug)]
pub enum Output {
    /// Result of a mutating operation.
    Outcome(Outcome),
    /// Result of `list`.
    Listing(Listing),
    /// Result of `get-state`.
    State(StateDocument),
}

/// Write a completion script for `shell`.
pub fn print_completions(shell: Shell, out: &mut dyn io::Write) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, out);
}

/// Run the parsed command line.
///
/// # Errors
///
/// Returns an error if the settings cannot be loaded, a precondition of the
/// invocation fails, or the operation fails.
pub fn run(cli: &Cli, log: &Logger) -> Result<()> {
    if let Command::Completions { shell } = cli.command {
        print_completions(shell, &mut io::stdout());
        return Ok(());
    }

    let global = &cli.global;
    let settings = Settings::load(global.config.as_deref())
        .context("failed to load settings")?
        .with_state_file(global.state.clone());
    log.debug(&format!("ledger: {}", settings.paths.state_file.display()));

    let executor = SystemExecutor;
    let caller = preflight(&cli.command, &settings, &executor, log)?;

    let datasets = ZfsDatasets::new(&executor);
    let accounts = SystemAccounts::new(
        &executor,
        settings.shells.login.clone(),
        settings.shells.nologin.clone(),
    );
    let smb_conf = SambaConfigFile::new(&executor, settings.paths.smb_conf.clone());
    let discovery = AvahiServiceFile::new(settings.paths.avahi_service.clone());
    let services = Systemctl::new(&executor, settings.services.clone());
    let passwords = SambaPasswords::new(&executor);
    let store = StateStore::new(settings.paths.state_file.clone());

    let terminal;
    let confirm: &dyn Confirm = if global.yes {
        &AssumeYes
    } else {
        terminal = prompt::TerminalConfirm::stdin();
        &terminal
    };

    let ctx = Context {
        store: &store,
        host: Host {
            datasets: &datasets,
            accounts: &accounts,
            smb_conf: &smb_conf,
            discovery: &discovery,
            services: &services,
            passwords: &passwords,
        },
        confirm,
        log,
        dry_run: global.dry_run,
    };

    let output = dispatch(&cli.command, &ctx, &caller, &executor)?;
    emit(&output, global, log)
}

/// Identify the caller and check that the invocation may proceed.
fn preflight(
    command: &Command,
    settings: &Settings,
    executor: &dyn Executor,
    log: &Logger,
) -> Result<Caller> {
    let caller = platform::current_caller(executor, std::env::var("SUDO_USER").ok())
        .context("failed to identify the caller")?;
    match &caller.sudo_user {
        Some(invoker) => log.debug(&format!("running as root for {invoker}")),
        None => log.debug(&format!("running as {} (uid {})", caller.name, caller.uid)),
    }
    // the ledger and both password databases are root-only, dry runs included
    platform::require_operator(&caller)?;

    if !matches!(command, Command::GetState) {
        let missing = platform::missing_tools(executor, &settings.required_tools);
        if !missing.is_empty() {
            bail!("required tools not found on PATH: {}", missing.join(", "));
        }
    }
    Ok(caller)
}

fn dispatch(
    command: &Command,
    ctx: &Context<'_>,
    caller: &Caller,
    executor: &dyn Executor,
) -> Result<Output> {
    let outcome = match command {
        Command::Setup(args) => {
            let server_name = match &args.server_name {
                Some(name) => name.clone(),
                None => platform::default_server_name(executor)
                    .context("failed to determine the server name")?,
            };
            setup::setup(ctx, &requests::setup(args, server_name))?
        }
        Command::Create(CreateCommand::User(args)) => {
            let password = prompt::password_or_prompt(args.password.as_deref(), &args.name)?;
            user::create_user(
                ctx,
                &user::CreateUserRequest {
                    name: args.name.clone(),
                    password,
                    shell_access: args.shell,
                    groups: args.groups.clone(),
                },
            )?
        }
        Command::Create(CreateCommand::Share(args)) => {
            share::create_share(ctx, &requests::create_share(args))?
        }
        Command::Create(CreateCommand::Group(args)) => {
            group::create_group(ctx, &requests::create_group(args))?
        }
        Command::Modify(ModifyCommand::Setup(args)) => {
            setup::modify_setup(ctx, &requests::modify_setup(args)?)?
        }
        Command::Modify(ModifyCommand::User(args)) => {
            let shell = toggle(args.shell, args.no_shell);
            let password = args
                .password
                .as_deref()
                .map(|p| prompt::password_or_prompt(Some(p), &args.name))
                .transpose()?;
            user::modify_user(
                ctx,
                &requests::modify_user(
                    &args.name,
                    shell,
                    password,
                    &args.add_groups,
                    &args.remove_groups,
                ),
            )?
        }
        Command::Modify(ModifyCommand::Share(args)) => {
            share::modify_share(ctx, &requests::modify_share(args)?)?
        }
        Command::Modify(ModifyCommand::Group(args)) => {
            group::modify_group(ctx, &requests::modify_group(args))?
        }
        Command::Modify(ModifyCommand::Home(args)) => {
            user::modify_home(ctx, &args.name, &QuotaSetting::parse(&args.quota)?)?
        }
        Command::Delete(DeleteCommand::User { name, delete_data }) => {
            user::delete_user(ctx, name, *delete_data)?
        }
        Command::Delete(DeleteCommand::Share { name, delete_data }) => {
            share::delete_share(ctx, name, *delete_data)?
        }
        Command::Delete(DeleteCommand::Group { name }) => group::delete_group(ctx, name)?,
        Command::Passwd { user } => {
            let password = prompt::new_password(user)?;
            change_password(ctx, caller, user, &password)?
        }
        Command::Remove(args) => remove::remove(ctx, requests::remove(*args))?,
        Command::List { what } => return Ok(Output::Listing(list(ctx, (*what).into())?)),
        Command::GetState => return Ok(Output::State(get_state(ctx)?)),
        Command::Completions { .. } => bail!("completions are handled before dispatch"),
    };
    Ok(Output::Outcome(outcome))
}

fn emit(output: &Output, global: &GlobalOpts, log: &Logger) -> Result<()> {
    let text = match output {
        Output::State(doc) => render::json(doc)?,
        Output::Outcome(outcome) if global.json => render::json(outcome)?,
        Output::Listing(listing) if global.json => render::json(listing)?,
        Output::Outcome(outcome) => {
            if global.verbose || outcome.dry_run {
                log.print_summary();
            }
            render::outcome_text(outcome)
        }
        Output::Listing(listing) => render::listing_text(listing),
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}")?;
    stdout.flush()?;
    Ok(())
}
