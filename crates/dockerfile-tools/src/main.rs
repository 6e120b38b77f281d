mod logging;

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind};
use clap_complete::{
    generate,
    shells::{Bash, Fish, Zsh},
};
use serde::Serialize;
use tracing::debug;

use dockerfile_tools_core::Error;
use dockerfile_tools_core::build_args::{BuildArgs, Platform};
use dockerfile_tools_core::cache_mount::list_cache_mounts;
use dockerfile_tools_core::exit_code::ExitCode;
use dockerfile_tools_core::model::Dockerfile;
use dockerfile_tools_core::parser::parse_dockerfile;
use dockerfile_tools_core::source::Source;
use dockerfile_tools_core::stages::list_stages;

use crate::logging::LogFormat;

const LONG_ABOUT: &str = "Parse a Dockerfile and print its syntax tree, its named build stages, or the cache mounts declared on its RUN instructions.\n\nResults are written to stdout as JSON. Diagnostics and logs go to stderr; set RUST_LOG to control them.";

const AFTER_HELP: &str = "Examples:\n  dockerfile-tools ast --dockerfile Dockerfile\n  dockerfile-tools list-stages --dockerfile Dockerfile\n  dockerfile-tools list-cache-mounts --dockerfile Dockerfile --arg GOCACHE=/root/.cache\n  dockerfile-tools list-cache-mounts --stdin --arg CACHE_ID=web,GOCACHE=/go < Dockerfile\n  cat Dockerfile | dockerfile-tools --compact list-stages --stdin";

const STDIN_LABEL: &str = "<stdin>";

// Serializing an argument chain recurses once per token.
const WORKER_STACK_SIZE: usize = 256 * 1024 * 1024;

fn main() {
    let outcome = std::thread::Builder::new()
        .name("dockerfile-tools".to_string())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(run)
        .map_err(|err| AppError::internal(format!("failed to start worker thread: {err}")))
        .and_then(|worker| {
            worker
                .join()
                .unwrap_or_else(|_| Err(AppError::internal("worker thread panicked")))
        });

    let code = match outcome {
        Ok(()) => ExitCode::Success,
        Err(app_error) => {
            if !app_error.message.is_empty() {
                eprintln!("{}", app_error.message);
            }
            app_error.code
        }
    };
    std::process::exit(code.as_i32());
}

#[derive(Debug)]
struct AppError {
    code: ExitCode,
    message: String,
}

impl AppError {
    fn usage(message: impl Into<String>) -> Self {
        Self {
            code: ExitCode::Usage,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ExitCode::Internal,
            message: message.into(),
        }
    }

    fn output(message: impl Into<String>) -> Self {
        Self {
            code: ExitCode::Output,
            message: message.into(),
        }
    }

    fn in_document(label: &str, error: Error) -> Self {
        Self {
            code: ExitCode::from(&error),
            message: format!("{label}: {error}"),
        }
    }
}

impl From<Error> for AppError {
    fn from(value: Error) -> Self {
        Self {
            code: ExitCode::from(&value),
            message: value.to_string(),
        }
    }
}

#[derive(Debug, Args)]
struct InputArgs {
    #[arg(
        long = "dockerfile",
        value_name = "PATH",
        help = "Path to the Dockerfile",
        long_help = "Path to the Dockerfile to read. If neither --dockerfile nor --stdin is given, ./Dockerfile is used."
    )]
    dockerfile: Option<PathBuf>,

    #[arg(
        long = "stdin",
        help = "Read the Dockerfile from stdin",
        long_help = "Read Dockerfile content from stdin. This conflicts with --dockerfile."
    )]
    stdin: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Print the Dockerfile syntax tree as JSON")]
    Ast {
        #[command(flatten)]
        input: InputArgs,
    },
    #[command(about = "List the named build stages of a Dockerfile")]
    ListStages {
        #[command(flatten)]
        input: InputArgs,
    },
    #[command(about = "List the cache mounts declared on RUN instructions")]
    ListCacheMounts {
        #[command(flatten)]
        input: InputArgs,

        #[arg(
            long = "arg",
            value_name = "NAME=VALUE[,NAME=VALUE...]",
            help = "Build arg substituted into mount options",
            long_help = "Build arg values substituted for $NAME references in cache mount options. Repeat the flag or separate pairs with commas; later values win. BUILDOS, BUILDARCH and BUILDPLATFORM default to the host platform."
        )]
        args: Vec<String>,
    },
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum, value_name = "SHELL")]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Debug, Parser)]
#[command(
    name = "dockerfile-tools",
    version,
    about = "Inspect Dockerfiles: syntax tree, build stages and cache mounts",
    long_about = LONG_ABOUT,
    after_help = AFTER_HELP,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        long = "compact",
        global = true,
        help = "Print JSON on a single line",
        long_help = "Print JSON on a single line instead of indenting it with two spaces."
    )]
    compact: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        help = "Print debug logs to stderr",
        long_help = "Log parsing and extraction details to stderr. RUST_LOG overrides this when set."
    )]
    verbose: bool,

    #[arg(
        long = "log-format",
        global = true,
        value_enum,
        value_name = "FORMAT",
        default_value_t = LogFormat::Text,
        help = "Format of stderr logs"
    )]
    log_format: LogFormat,
}

fn run() -> Result<(), AppError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                print!("{err}");
                return Ok(());
            }
            return Err(AppError::usage(err.to_string()));
        }
    };

    logging::init(cli.verbose, cli.log_format);
    execute(cli)
}

fn execute(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Commands::Ast { input } => {
            let dockerfile = load(&input)?;
            write_json(&dockerfile.ast, cli.compact)
        }
        Commands::ListStages { input } => {
            let dockerfile = load(&input)?;
            write_json(&list_stages(&dockerfile.ast), cli.compact)
        }
        Commands::ListCacheMounts { input, args } => {
            let dockerfile = load(&input)?;
            let platform = Platform::host();
            debug!(os = %platform.os, arch = %platform.arch, "host platform");
            let build_args = BuildArgs::new(&platform, &args);
            let mounts = list_cache_mounts(&dockerfile.ast, &build_args);
            write_json(&mounts, cli.compact)
        }
        Commands::Completion { shell } => write_completion(shell),
    }
}

fn load(input: &InputArgs) -> Result<Dockerfile, AppError> {
    validate_input(input)?;
    let (label, contents) = read_dockerfile(input)?;
    parse_dockerfile(&contents).map_err(|err| AppError::in_document(&label, err))
}

fn validate_input(input: &InputArgs) -> Result<(), AppError> {
    if input.stdin && input.dockerfile.is_some() {
        return Err(AppError::usage(
            "--stdin is mutually exclusive with --dockerfile",
        ));
    }
    Ok(())
}

fn read_dockerfile(input: &InputArgs) -> Result<(String, String), AppError> {
    if input.stdin {
        let mut contents = String::new();
        std::io::stdin()
            .read_to_string(&mut contents)
            .map_err(|err| Error::read(STDIN_LABEL, err))?;
        return Ok((STDIN_LABEL.to_string(), contents));
    }

    let path = input
        .dockerfile
        .clone()
        .unwrap_or_else(|| PathBuf::from("Dockerfile"));
    let source = Source::load(&path)?;
    Ok((source.path.display().to_string(), source.contents))
}

fn write_json<T: Serialize>(value: &T, compact: bool) -> Result<(), AppError> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|err| AppError::output(format!("error converting result to JSON: {err}")))?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .and_then(|()| stdout.write_all(b"\n"))
        .and_then(|()| stdout.flush())
        .map_err(|err| AppError::output(format!("error writing output: {err}")))
}

fn write_completion(shell: CompletionShell) -> Result<(), AppError> {
    let mut command = Cli::command();
    let mut stdout = std::io::stdout().lock();
    match shell {
        CompletionShell::Bash => generate(Bash, &mut command, "dockerfile-tools", &mut stdout),
        CompletionShell::Zsh => generate(Zsh, &mut command, "dockerfile-tools", &mut stdout),
        CompletionShell::Fish => generate(Fish, &mut command, "dockerfile-tools", &mut stdout),
    }
    stdout
        .flush()
        .map_err(|err| AppError::output(format!("error writing output: {err}")))
}
