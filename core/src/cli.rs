use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::analyzer::rules::RULES;
use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::init::{initialize, InitOptions};
use crate::interpreter::{ChoiceOption, DialogueEvent, DialogueRunner, Interpreter};
use crate::lexer;
use crate::parser::{self, ast::Script};
use crate::runtime::{DialogueContext, PersistedValue, RuntimeValue};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Parley - check and run dialogue scripts", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log filter directive (overrides RUST_LOG and the config file)
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the token stream of a script
    Tokens {
        /// Script file
        file: PathBuf,
    },

    /// Parse a script and summarize its nodes
    Parse {
        /// Script file
        file: PathBuf,

        /// Print the syntax tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and analyze a script; fails when errors are found
    Check {
        /// Script file (not needed with --rules)
        #[arg(required_unless_present = "rules")]
        file: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// List every diagnostic code instead of checking
        #[arg(long)]
        rules: bool,
    },

    /// Run a dialogue in the terminal
    Run {
        /// Script file
        file: PathBuf,

        /// Node to start at (default: runtime.start_node)
        #[arg(short = 's', long = "start")]
        start: Option<String>,

        /// Choice indices to take in order, e.g. 0,1,0 (default: read stdin)
        #[arg(short = 'c', long = "choose", value_delimiter = ',')]
        choose: Vec<usize>,

        /// Preset a variable, e.g. --var gold=10 (repeatable)
        #[arg(long = "var", value_parser = parse_assignment)]
        vars: Vec<(String, PersistedValue)>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn parse_assignment(text: &str) -> std::result::Result<(String, PersistedValue), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", text))?;
    let name = name.trim().trim_start_matches('$');
    if name.is_empty() {
        return Err(format!("missing variable name in '{}'", text));
    }
    Ok((name.to_string(), PersistedValue::parse_literal(value)))
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments (for embedders that filter args)
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration before any command so config errors surface first
    let config = initialize(InitOptions {
        config_path: cli.config.clone(),
        log_filter: cli.log.clone(),
        skip_logging: false,
    })?;

    match cli.command {
        Commands::Tokens { file } => print_tokens(&read_script(&file)?),
        Commands::Parse { file, json } => print_parse(&read_script(&file)?, json),
        Commands::Check { rules: true, .. } => {
            for (code, description) in RULES {
                println!("{:<24} {}", code.to_string(), description);
            }
            Ok(())
        }
        Commands::Check { file, json, .. } => {
            let Some(file) = file else {
                bail!("a script file is required");
            };
            check(&read_script(&file)?, config, json)
        }
        Commands::Run {
            file,
            start,
            choose,
            vars,
        } => run(&read_script(&file)?, config, start, choose, vars).await,
        Commands::Config => {
            print!("{}", config.to_toml().context("Failed to render configuration")?);
            Ok(())
        }
    }
}

fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic);
    }
}

/// Parse or fail with the syntax errors printed
fn parse_or_report(source: &str) -> Result<Script> {
    let parsed = parser::parse_source(source);
    print_diagnostics(&parsed.diagnostics);
    if parsed.has_errors() {
        let errors = parsed.diagnostics.iter().filter(|d| d.is_error()).count();
        bail!("{} syntax error(s)", errors);
    }
    Ok(parsed.script)
}

fn context_for(config: &Config) -> Result<DialogueContext> {
    let ctx = DialogueContext::with_config(config.analyzer.clone());
    ctx.install_builtins()
        .context("Failed to install built-in functions")?;
    Ok(ctx)
}

/* ===================== Commands ===================== */

fn print_tokens(source: &str) -> Result<()> {
    let (tokens, diagnostics) = lexer::tokenize_with_diagnostics(source);
    for token in &tokens {
        println!("{}:{}\t{:?}\t{:?}", token.line, token.column, token.kind, token.lexeme);
    }
    print_diagnostics(&diagnostics);
    Ok(())
}

fn print_parse(source: &str, json: bool) -> Result<()> {
    let script = parse_or_report(source)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&script)?);
        return Ok(());
    }

    println!("{} node(s)", script.nodes.len());
    for node in &script.nodes {
        println!(
            "  {} (line {}, {} item(s))",
            node.name,
            node.span.line,
            node.content.len()
        );
    }
    Ok(())
}

fn check(source: &str, config: &Config, json: bool) -> Result<()> {
    let script = parse_or_report(source)?;
    let ctx = context_for(config)?;
    let report = ctx.analyze(&script);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    if report.has_errors() {
        bail!("{} semantic error(s)", report.error_count());
    }
    Ok(())
}

async fn run(
    source: &str,
    config: &Config,
    start: Option<String>,
    choose: Vec<usize>,
    vars: Vec<(String, PersistedValue)>,
) -> Result<()> {
    let script = parse_or_report(source)?;

    let ctx = Arc::new(context_for(config)?);
    ctx.load_script(&script).context("Failed to load nodes")?;

    let report = ctx.analyze(&script);
    if !report.is_clean() {
        eprintln!("{}", report);
    }
    if report.has_errors() {
        bail!("{} semantic error(s); see `parley check`", report.error_count());
    }

    // Presets win over the script's own `<<var>>` initializers
    for (name, value) in vars {
        debug!(variable = %name, "Presetting variable");
        ctx.variables().declare(&name, RuntimeValue::from(value));
    }

    let interpreter = Interpreter::with_config(Arc::clone(&ctx), config.runtime.clone());
    let token = interpreter.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let start = start.unwrap_or_else(|| config.runtime.start_node.clone());
    let mut runner = DialogueRunner::new(interpreter);
    runner.start(&start)?;

    let mut choices = choose.into_iter();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match runner.next_event().await? {
            DialogueEvent::Line { speaker, text, .. } => match speaker {
                Some(speaker) => println!("{}: {}", speaker, text),
                None => println!("{}", text),
            },
            DialogueEvent::Choices { options } => {
                print_choices(&options);
                let index = match choices.next() {
                    Some(index) => {
                        println!("> {}", index);
                        index
                    }
                    None => read_choice(&mut stdin, &options).await?,
                };
                runner.select(index)?;
            }
            DialogueEvent::Jump { from, to } => debug!(from = %from, to = %to, "Jumped"),
            DialogueEvent::End { node } => {
                debug!(node = %node, "Dialogue ended");
                break;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&ctx.snapshot())?);
    Ok(())
}

fn print_choices(options: &[ChoiceOption]) {
    for option in options {
        if option.available {
            println!("  [{}] {}", option.index, option.text);
        } else {
            println!("  [{}] {} (unavailable)", option.index, option.text);
        }
    }
}

/// Prompt until an available option is entered
async fn read_choice<R>(lines: &mut tokio::io::Lines<R>, options: &[ChoiceOption]) -> Result<usize>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await.context("Failed to read choice")? else {
            bail!("input ended while a choice was pending");
        };
        match line.trim().parse::<usize>() {
            Ok(index) if options.iter().any(|o| o.index == index && o.available) => return Ok(index),
            _ => warn!(input = %line.trim(), "Not an available choice"),
        }
    }
}
