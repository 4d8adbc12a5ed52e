//! Delegate Runtime - command-line entry point
//!
//! Builds the backend registry from configuration, then loads, runs and
//! tunes delegates on request.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};

use delegate_runtime::backend::{
    BackendRegistry, CpuReferenceBackend, Delegate, ExecutionContext, InitContext, CPU_REF_NAME,
};
use delegate_runtime::cli::{Cli, Commands, ConfigSubcommand, OptionSubcommand};
use delegate_runtime::config::{self, RuntimeConfig};
use delegate_runtime::error::{Error, Result};
use delegate_runtime::logging;
use delegate_runtime::memory::{ArenaAllocator, MemoryAllocator};
use delegate_runtime::types::{
    BackendOption, BackendOptions, CompileSpec, FreeableBuffer, NamedData, OptionValue, Tensor,
    Value,
};
use delegate_runtime::version;

/// Most options accepted by a single `run`
const MAX_RUN_OPTIONS: usize = 16;

/// Method name reported to backends
const METHOD_NAME: &str = "forward";

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    // Commands that don't need the registry use minimal logging
    match cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { ref subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand, cli.config.as_deref());
        }
        _ => {}
    }

    let config = RuntimeConfig::load(cli.config.as_deref())?;

    // Must stay alive until exit so file logs are flushed
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    debug!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting delegate runtime"
    );

    let registry = build_registry(&config)?;

    match cli.command {
        Commands::Backends => list_backends(&registry),
        Commands::Run {
            program,
            backend,
            specs,
            inputs,
            data,
            options,
            iterations,
        } => {
            let request = RunRequest {
                program: &program,
                backend: &backend,
                specs: &specs,
                inputs: &inputs,
                data: &data,
                options: &options,
                iterations,
            };
            run_program(&registry, &config, &request)
        }
        Commands::Option { subcommand } => handle_option_command(&registry, subcommand),
        Commands::Version | Commands::Config { .. } => Ok(()),
    }
}

/// Register every enabled backend
fn build_registry(config: &RuntimeConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::with_capacity(config.registry.capacity);

    let cpu_ref = &config.backends.cpu_ref;
    if cpu_ref.enabled {
        let threads = cpu_ref.num_threads.unwrap_or_else(num_cpus::get);
        registry.register(
            CPU_REF_NAME,
            Arc::new(CpuReferenceBackend::with_threads(threads)),
        )?;
    }

    info!(
        count = registry.count(),
        capacity = registry.capacity(),
        "Backend registry ready"
    );
    Ok(registry)
}

fn list_backends(registry: &BackendRegistry) -> Result<()> {
    if registry.is_empty() {
        println!("No backends registered.");
        return Ok(());
    }

    println!("{:<6} {:<20} AVAILABLE", "INDEX", "BACKEND");
    for (index, entry) in registry.entries().iter().enumerate() {
        println!(
            "{:<6} {:<20} {}",
            index,
            entry.name,
            if entry.backend.is_available() { "yes" } else { "no" }
        );
    }
    println!();
    println!("{} of {} slots used", registry.count(), registry.capacity());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────

struct RunRequest<'a> {
    program: &'a str,
    backend: &'a str,
    specs: &'a [String],
    inputs: &'a [String],
    data: &'a [String],
    options: &'a [String],
    iterations: u32,
}

fn run_program(registry: &BackendRegistry, config: &RuntimeConfig, req: &RunRequest<'_>) -> Result<()> {
    let mut options = BackendOptions::<MAX_RUN_OPTIONS>::new();
    for raw in req.options {
        let option = BackendOption::parse_assignment(raw)?;
        options.set(&option.key, option.value)?;
    }
    if !options.is_empty() {
        registry.set_option(req.backend, options.view())?;
    }

    let path = Path::new(req.program);
    let bytes = fs::read(path).map_err(|source| Error::IoRead {
        path: path.to_path_buf(),
        source,
    })?;

    let spec_pairs = req
        .specs
        .iter()
        .map(|raw| split_assignment(raw))
        .collect::<Result<Vec<_>>>()?;
    let compile_specs: Vec<CompileSpec<'_>> = spec_pairs
        .iter()
        .map(|(key, value)| CompileSpec::new(key, *value))
        .collect();

    let mut named = NamedData::new();
    for raw in req.data {
        let (name, values) = split_assignment(raw)?;
        named.insert_f32(name, &parse_floats(values)?);
    }

    let runtime_arena = ArenaAllocator::new(config.memory.runtime_arena_bytes);
    let temp_arena = ArenaAllocator::new(config.memory.temp_arena_bytes);

    let mut processed = FreeableBuffer::with_release_hook(
        bytes,
        Box::new(|nbytes: usize| debug!(nbytes, "Compiled unit released")),
    );
    let mut init_ctx = InitContext::new(&runtime_arena)
        .with_method_name(METHOD_NAME)
        .with_named_data(&named);

    let delegate = Delegate::init(
        registry,
        req.backend,
        &mut init_ctx,
        &mut processed,
        &compile_specs,
    )?;
    drop(processed);

    let mut args: Vec<Value> = req
        .inputs
        .iter()
        .map(|raw| parse_floats(raw).map(|v| Value::from(Tensor::from_vec(v))))
        .collect::<Result<_>>()?;
    let num_inputs = args.len();
    args.push(Value::None);

    for iteration in 0..req.iterations {
        let mut ctx = ExecutionContext::new()
            .with_temp_allocator(&temp_arena)
            .with_method_name(METHOD_NAME);
        delegate.execute(&mut ctx, &mut args)?;
        temp_arena.reset();
        debug!(iteration, "Execution complete");
    }

    for (index, value) in args.iter().enumerate().skip(num_inputs) {
        println!("output[{}] = {}", index - num_inputs, value);
    }
    info!(
        backend = %req.backend,
        executions = delegate.executions(),
        runtime_bytes = runtime_arena.used(),
        "Run finished"
    );

    delegate.destroy();
    Ok(())
}

fn split_assignment(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| Error::InvalidArgument(format!("expected key=value, got '{}'", raw)))
}

fn parse_floats(raw: &str) -> Result<Vec<f32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .map_err(|_| Error::InvalidArgument(format!("'{}' is not a number", s)))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────
// option / config
// ─────────────────────────────────────────────────────────────────

fn handle_option_command(registry: &BackendRegistry, subcommand: OptionSubcommand) -> Result<()> {
    match subcommand {
        OptionSubcommand::Get { backend, keys } => {
            let mut options = keys
                .iter()
                .map(BackendOption::query)
                .collect::<Result<Vec<_>>>()?;
            let result = registry.get_option(&backend, &mut options);
            for option in options.iter().filter(|o| o.value != OptionValue::Empty) {
                println!("{}={}", option.key, option.value);
            }
            result
        }
        OptionSubcommand::Set {
            backend,
            assignments,
        } => {
            let options = assignments
                .iter()
                .map(|raw| BackendOption::parse_assignment(raw))
                .collect::<Result<Vec<_>>>()?;
            registry.set_option(&backend, &options)?;
            println!("Updated {} option(s) on '{}'", options.len(), backend);
            Ok(())
        }
    }
}

fn handle_config_command(subcommand: &ConfigSubcommand, config_path: Option<&str>) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let cfg = RuntimeConfig::load(config_path)?;
            println!("{}", cfg.to_toml()?);
        }
        ConfigSubcommand::Init { path, force } => {
            let created = config::init_config(path.as_deref(), *force)?;
            println!("Configuration file created: {}", created.display());
        }
        ConfigSubcommand::Validate => {
            let cfg = RuntimeConfig::load(config_path)?;
            println!("Configuration is valid.");
            println!(
                "  registry capacity: {}, cpu_ref: {}",
                cfg.registry.capacity,
                if cfg.backends.cpu_ref.enabled { "enabled" } else { "disabled" }
            );
        }
    }
    Ok(())
}
