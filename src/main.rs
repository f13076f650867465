//! Binary entry point for the vmctl CLI.

use std::error::Error as StdError;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use vmctl::compute::{ComputeApi, TargetError, ZoneScope};
use vmctl::config::{ComputeConfig, ConfigError, TargetOverrides};
use vmctl::control::{ControlError, InstanceController};
use vmctl::report::{self, OutputFormat, ReportError};
use vmctl::session::{Session, SessionError};
use vmctl::telemetry;

mod cli;

use cli::{Cli, Command, Format};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("{0}")]
    Control(#[source] Box<dyn StdError + Send + Sync>),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ComputeConfig::load_without_cli_args()?.with_overrides(&overrides(&cli));

    let cancel = CancellationToken::new();
    let session = Session::open(&config, cancel.clone())?;
    tokio::spawn(cancel_on_interrupt(cancel));

    let rendered = execute(
        session.controller(),
        session.scope(),
        cli.command,
        output_format(cli.format),
    )
    .await?;
    writeln!(io::stdout(), "{rendered}")?;
    Ok(())
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted; abandoning wait");
        cancel.cancel();
    }
}

fn overrides(cli: &Cli) -> TargetOverrides {
    TargetOverrides {
        project_id: cli.project.clone(),
        zone: cli.zone.clone(),
        wait_timeout_secs: cli.timeout,
    }
}

const fn output_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
    }
}

async fn execute<A>(
    controller: &InstanceController<A>,
    scope: &ZoneScope,
    command: Command,
    format: OutputFormat,
) -> Result<String, CliError>
where
    A: ComputeApi,
{
    let control_error = |err: ControlError<A::Error>| CliError::Control(Box::new(err));

    let transition = match command {
        Command::List => {
            let instances = controller.list(scope).await.map_err(control_error)?;
            return Ok(report::render_list(format, scope, &instances)?);
        }
        Command::Get(args) => {
            let target = scope.instance(&args.instance)?;
            let instance = controller.get(&target).await.map_err(control_error)?;
            return Ok(report::render_instance(format, &target.instance, &instance)?);
        }
        Command::Start(args) => controller.start(&scope.instance(&args.instance)?).await,
        Command::Stop(args) => controller.stop(&scope.instance(&args.instance)?).await,
        Command::Suspend(args) => controller.suspend(&scope.instance(&args.instance)?).await,
        Command::Resume(args) => controller.resume(&scope.instance(&args.instance)?).await,
    }
    .map_err(control_error)?;

    Ok(report::render_transition(format, &transition)?)
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}
