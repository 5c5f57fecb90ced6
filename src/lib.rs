//! `paraloom`: lexer, parser, semantic analyzer, TAC emitter, and
//! tree-walking evaluator for a small educational language built around
//! `seq`/`par` blocks and typed channels.
//!
//! [`Pipeline`] wires the five stages together behind one facade, the shape
//! an embedder (the CLI binary, or a driver that wants interactive input)
//! actually wants to call.

pub mod backend;
pub mod error;
pub mod frontend;
pub mod middleend;
pub mod runtime;

use backend::TacProgram;
use error::{ParseError, RuntimeError};
use frontend::ast::Program;
use frontend::token::Token;
use middleend::SemanticReport;
use runtime::{BufferSink, DirectInputProvider, Interp, RunConfig, RunRecord, RunRegistry};
use std::sync::Arc;
use tracing::{info_span, instrument};

/// The crate version baked in by `build.rs`, for `--version` and log lines.
pub const VERSION: &str = env!("PARALOOM_VERSION");

/// Static analysis results: everything short of running the program.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// The token stream the lexer produced.
    pub tokens: Vec<Token>,
    /// The parsed AST.
    pub ast: Program,
    /// The semantic analyzer's report.
    pub semantic_report: SemanticReport,
    /// The diagnostic three-address listing.
    pub tac: TacProgram,
}

/// Error surfaced by [`Pipeline::analyze`]: lexing never fails (spec §4.1's
/// totality guarantee), so the only hard failure here is a parse error.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// The parser stopped at the first malformed construct.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// The five-stage pipeline facade.
pub struct Pipeline;

impl Pipeline {
    /// Runs lexing, parsing, semantic analysis, and TAC emission, without
    /// executing anything.
    ///
    /// # Errors
    /// Returns [`AnalyzeError::Parse`] if the source doesn't parse.
    #[instrument(skip(source))]
    pub fn analyze(source: &str) -> Result<AnalysisResult, AnalyzeError> {
        let tokens = info_span!("lex").in_scope(|| frontend::tokenize(source));
        let ast = info_span!("parse").in_scope(|| frontend::parse(&tokens))?;
        let semantic_report = info_span!("analyze").in_scope(|| middleend::analyze(&ast));
        let tac = info_span!("emit_tac").in_scope(|| backend::tac::emit(&ast));
        Ok(AnalysisResult {
            tokens,
            ast,
            semantic_report,
            tac,
        })
    }

    /// Executes a parsed program synchronously (spec §4.5/§6's "direct"
    /// mode): runs to completion on the calling thread (beyond whatever
    /// `par` blocks it spawns and joins internally) and returns a finished
    /// [`RunHandle`].
    ///
    /// # Errors
    /// Returns the [`RuntimeError`] the program terminated with, if any;
    /// the handle returned on `Ok` is always `finished()`.
    #[instrument(skip(program, config))]
    pub fn execute(program: &Program, config: RunConfig) -> RunHandle {
        let output = Arc::clone(&config.output_sink);
        let (interp, blocks) = info_span!("execute").in_scope(|| Interp::build(program, config));
        let result = interp
            .run_preamble(program)
            .and_then(|()| interp.run(&blocks));
        RunHandle::Direct {
            output,
            error: result.err(),
        }
    }

    /// Executes a parsed program on a background thread, returning
    /// immediately with a [`RunHandle`] a driver can poll and feed input to
    /// (spec §5's interactive-bridge resource model).
    #[must_use]
    pub fn execute_interactive(program: Program, registry: &RunRegistry, config: InteractiveConfig) -> Arc<RunRecord> {
        let record = registry.create();
        let run_record = Arc::clone(&record);
        let channel_config = config.channel_config;
        std::thread::spawn(move || {
            let run_config = RunConfig {
                input_provider: Arc::clone(&run_record) as Arc<dyn runtime::InputProvider>,
                output_sink: Arc::new(runtime::input::RunRecordSink::new(Arc::clone(&run_record))),
                channel_config,
            };
            let (interp, blocks) = Interp::build(&program, run_config);
            let result = interp
                .run_preamble(&program)
                .and_then(|()| interp.run(&blocks));
            run_record.mark_finished(result.err().map(|e| e.to_string()));
        });
        record
    }

    /// Supplies a line of input to a run blocked on `input()` (spec §6's
    /// `Pipeline::supply_input`).
    pub fn supply_input(run: &Arc<RunRecord>, line: impl Into<String>) {
        run.supply_input(line);
    }
}

/// Channel wiring for an interactive run; separated from [`RunConfig`]
/// because the interactive path constructs its own input/output wiring
/// around the [`RunRecord`].
#[derive(Default)]
pub struct InteractiveConfig {
    /// Network channel resolution, same as [`RunConfig::channel_config`].
    pub channel_config: runtime::ChannelConfig,
}

/// The result of one [`Pipeline::execute`] or [`Pipeline::execute_interactive`]
/// call, in whichever mode produced it.
pub enum RunHandle {
    /// A synchronous run that has already completed.
    Direct {
        /// The accumulated output.
        output: Arc<dyn runtime::OutputSink>,
        /// The captured runtime error, if the program terminated with one.
        error: Option<RuntimeError>,
    },
    /// An interactive run, possibly still in progress.
    Interactive(Arc<RunRecord>),
}

impl RunHandle {
    /// Whether evaluation has finished.
    #[must_use]
    pub fn finished(&self) -> bool {
        match self {
            RunHandle::Direct { .. } => true,
            RunHandle::Interactive(record) => record.finished(),
        }
    }

    /// Whether the run is currently blocked on `input()`.
    #[must_use]
    pub fn waiting(&self) -> bool {
        match self {
            RunHandle::Direct { .. } => false,
            RunHandle::Interactive(record) => record.waiting(),
        }
    }

    /// The prompt passed to the current `input()` call, if waiting.
    #[must_use]
    pub fn prompt(&self) -> Option<String> {
        match self {
            RunHandle::Direct { .. } => None,
            RunHandle::Interactive(record) => record.prompt(),
        }
    }

    /// The captured runtime error, if the run terminated with one.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        match self {
            RunHandle::Direct { error, .. } => error.as_ref().map(ToString::to_string),
            RunHandle::Interactive(record) => record.error(),
        }
    }

    /// For a direct (buffer-backed) run, the output accumulated. Panics if
    /// called on a run whose output sink wasn't a [`BufferSink`]; CLI/test
    /// callers that construct [`RunConfig`] with a `BufferSink` can rely on
    /// this.
    #[must_use]
    pub fn output(&self) -> String {
        match self {
            RunHandle::Direct { output, .. } => output
                .as_any()
                .downcast_ref::<BufferSink>()
                .map(BufferSink::contents)
                .unwrap_or_default(),
            RunHandle::Interactive(record) => record.buffer(),
        }
    }
}
