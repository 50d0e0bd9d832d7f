use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, warn};

use mdscript::cli::{self, Cli, Command, RunArgs};
use mdscript::config::{self, Config};
use mdscript::host::{self, HostOptions, SharedHost};
use mdscript::script::{Interpreter, Script, Value};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mdscript: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Run(args) => run(args, config),
        Command::Check { file } => check(&file),
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

/// An explicit `--config` must be readable; the default file is optional.
fn load_config(cli: &Cli) -> Result<Config> {
    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => match config::find_user_config() {
            Some(path) => (path, false),
            None => return Ok(Config::default()),
        },
    };
    debug!("loading config from {}", path.display());
    let (config, errors) = match Config::load_file(&path) {
        Ok(loaded) => loaded,
        Err(e) if !explicit => {
            warn!("{}: {e}", path.display());
            return Ok(Config::default());
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    for e in &errors {
        warn!("{}: {e}", path.display());
    }
    Ok(config)
}

// ── run ───────────────────────────────────────────────────────────────────────

fn run(args: RunArgs, config: Config) -> Result<()> {
    let name = cli::display_name(&args.file);
    let src = cli::read_source(&args.file).with_context(|| format!("reading {name}"))?;

    let state = SharedHost::default();
    let host_options = HostOptions {
        clipboard_file: args.clipboard.clone(),
    };
    let mut options = config.options();
    if args.max_statements.is_some() {
        options.max_statements = args.max_statements;
    }

    let mut interp = Interpreter::with_options(host::standard(&state, &host_options), options);
    for (var, value) in config.vars.iter().chain(args.vars.iter()) {
        interp.set_global_var(var.as_str(), Value::from_host_text(value));
    }

    let script = interp.load(&src).with_context(|| name.clone())?;
    debug!("{name}: entry is {}", if script.is_async() { "async" } else { "sync" });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;
    let result = runtime.block_on(interp.run(&script));

    // Output produced before a failure is still printed.
    let host = state.borrow();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if !args.no_title {
        if let Some(title) = &host.title {
            writeln!(out, "# {title}")?;
            writeln!(out)?;
        }
    }
    for line in &host.output {
        writeln!(out, "{line}")?;
    }
    out.flush()?;

    result.with_context(|| name)
}

// ── check ─────────────────────────────────────────────────────────────────────

fn check(file: &std::path::Path) -> Result<()> {
    let name = cli::display_name(file);
    let src = cli::read_source(file).with_context(|| format!("reading {name}"))?;
    let state = SharedHost::default();
    let capabilities = host::standard(&state, &HostOptions::default());
    let script = Script::load(&src, &capabilities).with_context(|| name)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (function, is_async) in script.taint().iter() {
        writeln!(out, "{function}: {}", if is_async { "async" } else { "sync" })?;
    }
    Ok(())
}
