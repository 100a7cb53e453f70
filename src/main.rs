// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey-shell - run scripts inside an embedded execution context
//!
//! Every standard host callable is exposed to scripts through the global
//! `host` object, e.g. `host.upper('hi')` or `host.md5('password')`.

mod repl;

use anyhow::Context as _;
use clap::Parser;
use owo_colors::OwoColorize;
use spacey_embed::config::parse_size;
use spacey_embed::{ContextConfig, ExecutionContext, HostRegistry, HostValue, VERSION};
use std::path::PathBuf;
use std::sync::Arc;

/// Name of the global object carrying the host library
const HOST_OBJECT: &str = "host";

#[derive(Parser)]
#[command(
    name = "spacey-shell",
    about = "Run JavaScript inside an embedded Spacey execution context",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// JavaScript file to execute
    script: Option<PathBuf>,

    /// Evaluate script from command line
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Start interactive REPL
    #[arg(short = 'i', long = "interactive", alias = "repl")]
    interactive: bool,

    /// Heap ceiling, e.g. 10m
    #[arg(long, value_parser = size_arg)]
    memory_limit: Option<usize>,

    /// Call-stack ceiling, e.g. 512k
    #[arg(long, value_parser = size_arg)]
    stack_size: Option<usize>,

    /// TOML file with context settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn size_arg(text: &str) -> Result<usize, String> {
    parse_size(text).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("spacey_embed=debug,spacey_shell=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("spacey_embed=warn,spacey_shell=warn")
            .init();
    }

    let config = load_config(&cli)?;
    let mut context = create_context(&config)?;

    if let Some(code) = cli.eval {
        run_source(&mut context, &code);
    } else if let Some(script_path) = cli.script {
        let source = tokio::fs::read_to_string(&script_path)
            .await
            .with_context(|| format!("failed to read {}", script_path.display()))?;
        run_source(&mut context, &source);
    } else if cli.interactive || atty::is(atty::Stream::Stdin) {
        let mut repl = repl::Repl::new(context)?;
        repl.run()?;
    } else {
        // Read from stdin
        let mut code = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut code)?;
        run_source(&mut context, &code);
    }

    Ok(())
}

/// Resolve settings from the config file, the environment and flags, in that order.
fn load_config(cli: &Cli) -> anyhow::Result<ContextConfig> {
    let mut config = match &cli.config {
        Some(path) => ContextConfig::load(path)
            .with_context(|| format!("invalid config file {}", path.display()))?,
        None => {
            let mut config = ContextConfig::default();
            config.apply_env()?;
            config
        }
    };

    if cli.memory_limit.is_some() {
        config.memory_limit = cli.memory_limit;
    }
    if cli.stack_size.is_some() {
        config.max_stack_size = cli.stack_size;
    }

    tracing::debug!("Context configuration: {:?}", config);
    Ok(config)
}

/// Build a configured context with the host library bound to [`HOST_OBJECT`].
fn create_context(config: &ContextConfig) -> spacey_embed::Result<ExecutionContext> {
    let registry = Arc::new(HostRegistry::with_stdlib());
    let context = ExecutionContext::with_config(Arc::clone(&registry), config)?;

    let mut host = context.new_bag();
    for name in registry.names() {
        host.register_function(name, name)?;
    }
    host.register_property("version", VERSION);
    context.register_object(HOST_OBJECT, &host)?;

    Ok(context)
}

fn run_source(context: &mut ExecutionContext, source: &str) {
    match context.eval(source) {
        Ok(HostValue::Null) => {}
        Ok(result) => println!("{}", result),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}
