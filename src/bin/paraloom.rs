#![allow(clippy::print_stdout, clippy::print_stderr)]

//! `paraloom` CLI: runs a source file through the pipeline, with flags to
//! inspect each stage, plus an interactive REPL mode. An informative
//! surface around the library, not a product front door (spec §1's
//! Non-goals exclude the latter).

use anyhow::{Context, Result};
use clap::Parser;
use paraloom::error::RuntimeError;
use paraloom::runtime::{
    BufferSink, ChannelConfig, ChannelRole, DirectInputProvider, InputProvider, RunConfig,
    StdoutSink,
};
use paraloom::Pipeline;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

/// Reads one line from process stdin per `input()` call, printing the
/// prompt to stdout first. Used for file-mode runs, where `input()` reads
/// from whatever the caller piped or typed, rather than a fixed replay
/// list.
#[derive(Debug, Default)]
struct StdinInputProvider;

impl InputProvider for StdinInputProvider {
    fn read_line(&self, prompt: Option<&str>) -> Result<String, RuntimeError> {
        if let Some(prompt) = prompt {
            print!("{prompt}");
            let _ = std::io::stdout().flush();
        }
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| RuntimeError::InputProvider(e.to_string()))?;
        if line.is_empty() {
            return Err(RuntimeError::InputProvider("stdin closed".to_string()));
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// `host:port=name` style flags are parsed as `name=value` pairs.
fn parse_key_value(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    Ok((key.to_string(), value.to_string()))
}

#[derive(Parser)]
#[command(name = "paraloom")]
#[command(author, version, about = "Lexer/parser/analyzer/evaluator for a seq/par educational language", long_about = None)]
struct Cli {
    /// Source file to run. Omit to start the interactive REPL.
    file: Option<PathBuf>,

    /// Print the token stream and exit without executing.
    #[arg(long)]
    show_tokens: bool,

    /// Print the parsed AST (debug form) and exit without executing.
    #[arg(long)]
    show_ast: bool,

    /// Print the semantic analyzer's exported symbol table and exit without
    /// executing.
    #[arg(long)]
    show_symbols: bool,

    /// Print the diagnostic three-address listing before executing.
    #[arg(long)]
    emit_tac: bool,

    /// Write the three-address listing to a file instead of stdout.
    #[arg(long, value_name = "FILE")]
    save_tac: Option<PathBuf>,

    /// Bind a `c_channel name` as a TCP listener: `name=host:port`. Repeatable.
    #[arg(long = "channel-bind", value_name = "NAME=HOST:PORT")]
    channel_bind: Vec<String>,

    /// Connect a `c_channel name` out over TCP: `name=host:port`. Repeatable.
    #[arg(long = "channel-connect", value_name = "NAME=HOST:PORT")]
    channel_connect: Vec<String>,

    /// This process's node id, for channels declared with two endpoint ids.
    #[arg(long)]
    node_id: Option<String>,

    /// Endpoint id to address mapping for the implicit channel-upgrade form:
    /// `id=host:port`. Repeatable.
    #[arg(long = "channel-map", value_name = "ID=HOST:PORT")]
    channel_map: Vec<String>,
}

fn build_channel_config(cli: &Cli) -> Result<ChannelConfig> {
    let mut config = ChannelConfig::default();
    for raw in &cli.channel_bind {
        let (name, addr) = parse_key_value(raw)?;
        config.explicit.insert(name, (addr, ChannelRole::Bind));
    }
    for raw in &cli.channel_connect {
        let (name, addr) = parse_key_value(raw)?;
        config.explicit.insert(name, (addr, ChannelRole::Connect));
    }
    for raw in &cli.channel_map {
        let (id, addr) = parse_key_value(raw)?;
        config.endpoint_map.insert(id, addr);
    }
    config.node_id = cli.node_id.clone();
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(path) = cli.file.clone() else {
        return run_repl();
    };

    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("reading source file '{}'", path.display()))?;

    let analysis = Pipeline::analyze(&source)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("parsing '{}'", path.display()))?;

    if cli.show_tokens {
        for token in &analysis.tokens {
            println!("{token:?}");
        }
        return Ok(());
    }
    if cli.show_ast {
        println!("{:#?}", analysis.ast);
        return Ok(());
    }
    if cli.show_symbols {
        println!("{}", serde_json::to_string_pretty(&analysis.semantic_report.symbols)?);
        return Ok(());
    }
    if cli.emit_tac {
        match &cli.save_tac {
            Some(path) => std::fs::write(path, analysis.tac.to_string())
                .with_context(|| format!("writing TAC to '{}'", path.display()))?,
            None => println!("{}", analysis.tac),
        }
    }

    if !analysis.semantic_report.success {
        for error in &analysis.semantic_report.errors {
            eprintln!("error: {error}");
        }
        anyhow::bail!("semantic analysis failed with {} error(s)", analysis.semantic_report.errors.len());
    }
    for warning in &analysis.semantic_report.warnings {
        eprintln!("warning: {warning}");
    }

    let channel_config = build_channel_config(&cli)?;
    let config = RunConfig {
        input_provider: Arc::new(StdinInputProvider),
        output_sink: Arc::new(StdoutSink::new()),
        channel_config,
    };
    let handle = Pipeline::execute(&analysis.ast, config);
    if let Some(error) = handle.error() {
        anyhow::bail!("runtime error: {error}");
    }
    Ok(())
}

/// Interactive REPL: each line is parsed and executed as its own program,
/// sharing nothing with prior lines (the grammar requires a full `seq`/`par`
/// block or declaration per top-level item, so single-expression REPL lines
/// aren't meaningful outside that context).
fn run_repl() -> Result<()> {
    let mut editor = rustyline::DefaultEditor::new().context("starting line editor")?;
    println!("paraloom {} — interactive mode. Ctrl-D to exit.", paraloom::VERSION);
    loop {
        let line = match editor.readline("paraloom> ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Eof | rustyline::error::ReadlineError::Interrupted) => break,
            Err(e) => return Err(e).context("reading line"),
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line.as_str());
        match run_one_repl_line(&line) {
            Ok(output) => print!("{output}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

fn run_one_repl_line(line: &str) -> Result<String> {
    let analysis = Pipeline::analyze(line).map_err(|e| anyhow::anyhow!("{e}"))?;
    if !analysis.semantic_report.success {
        anyhow::bail!("{}", analysis.semantic_report.errors.join("; "));
    }
    let sink = Arc::new(BufferSink::new());
    let config = RunConfig {
        input_provider: Arc::new(DirectInputProvider::new(Vec::new())),
        output_sink: sink.clone(),
        channel_config: ChannelConfig::default(),
    };
    let handle = Pipeline::execute(&analysis.ast, config);
    if let Some(error) = handle.error() {
        anyhow::bail!("{error}");
    }
    Ok(sink.contents())
}
