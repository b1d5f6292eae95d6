// src/main.rs
//
// =============================================================================
// ROBOGRAPH: COMMANDER & ENTRY POINT (v 0.1 )
// =============================================================================
//
// Thin CLI around the compiler core.
//
// Modes:
// 1. COMPILE:  Parse DSL source, lower to IR, validate, emit IR JSON.
// 2. IMPORT:   Lower a canvas graph export to IR, validate.
// 3. GENERATE: Emit workflow source code from IR.
// 4. CANVAS:   Emit canvas data (with auto-layout) from IR.
// 5. RUN:      Execute IR on the simulated adapter under a scenario.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use robograph::auditlog::AuditLogWriter;
use robograph::canvas::{self, CanvasGraph};
use robograph::codegen;
use robograph::diagnostics::Diagnostic;
use robograph::dsl;
use robograph::lowering;
use robograph::robot::AdapterFactory;
use robograph::runtime::{RuntimeEngine, Scenario};
use robograph::validator::SemanticValidator;
use robograph::WorkflowIR;

// ============================================================================
// 1. CLI DEFINITION
// ============================================================================

#[derive(Parser)]
#[command(
    name = "robograph",
    version,
    about = "Bidirectional visual/textual workflow compiler for robot programs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse DSL source and lower it to IR JSON.
    Compile {
        /// Path to the workflow source file.
        #[arg(long)]
        file: PathBuf,

        /// Target robot type.
        #[arg(long, default_value = "go2")]
        robot: String,

        /// Output path for the IR JSON (stdout if omitted).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Lower a canvas graph export to IR JSON.
    Import {
        /// Path to the canvas graph JSON.
        #[arg(long)]
        canvas: PathBuf,

        #[arg(long, default_value = "go2")]
        robot: String,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Generate workflow source code from IR.
    Generate {
        /// Path to the IR JSON.
        #[arg(long)]
        ir: PathBuf,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Convert IR to canvas data, auto-layouting unplaced nodes.
    Canvas {
        #[arg(long)]
        ir: PathBuf,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Execute IR on the simulated adapter.
    Run {
        #[arg(long)]
        ir: PathBuf,

        /// Execution target (simulation or hardware).
        #[arg(long, default_value = "simulation")]
        target: String,

        /// Append audit events to this log file.
        #[arg(long)]
        audit_log: Option<PathBuf>,
    },
}

// ============================================================================
// 2. ENTRY POINT
// ============================================================================

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile { file, robot, out } => run_compile(file, robot, out),
        Commands::Import { canvas, robot, out } => run_import(canvas, robot, out),
        Commands::Generate { ir, out } => run_generate(ir, out),
        Commands::Canvas { ir, out } => run_canvas(ir, out),
        Commands::Run {
            ir,
            target,
            audit_log,
        } => run_execute(ir, target, audit_log),
    }
}

// ============================================================================
// 3. MODES
// ============================================================================

fn run_compile(file: PathBuf, robot: String, out: Option<PathBuf>) -> Result<()> {
    let source = fs::read_to_string(&file).with_context(|| format!("Reading {file:?}"))?;

    let (module, parse_diags) = dsl::parse_source(&source);
    let (ir, lower_diags) = lowering::lower_ast(&module, &robot);
    let validate_diags = SemanticValidator::new().validate(&ir);

    print_diagnostics(&parse_diags);
    print_diagnostics(&lower_diags);
    print_diagnostics(&validate_diags);
    if !robograph::diagnostics::is_clean(&validate_diags) {
        log::warn!("Workflow has semantic errors; IR emitted anyway");
    }

    write_output(out, &ir.to_json())
}

fn run_import(canvas_path: PathBuf, robot: String, out: Option<PathBuf>) -> Result<()> {
    let raw = fs::read_to_string(&canvas_path).with_context(|| format!("Reading {canvas_path:?}"))?;
    let graph: CanvasGraph =
        serde_json::from_str(&raw).context("Invalid canvas graph JSON")?;

    let (ir, diags) = canvas::import_graph(&graph, &robot);
    let validate_diags = SemanticValidator::new().validate(&ir);

    print_diagnostics(&diags);
    print_diagnostics(&validate_diags);

    write_output(out, &ir.to_json())
}

fn run_generate(ir_path: PathBuf, out: Option<PathBuf>) -> Result<()> {
    let ir = load_ir(&ir_path)?;
    let (code, diags, source_map) = codegen::generate_code(&ir);

    print_diagnostics(&diags);
    log::debug!("Source map entries: {}", source_map.as_map().len());

    write_output(out, &code)
}

fn run_canvas(ir_path: PathBuf, out: Option<PathBuf>) -> Result<()> {
    let ir = load_ir(&ir_path)?;
    let (graph, diags) = canvas::export_graph(&ir);

    print_diagnostics(&diags);

    let json = serde_json::to_string_pretty(&graph)?;
    write_output(out, &json)
}

fn run_execute(ir_path: PathBuf, target: String, audit_log: Option<PathBuf>) -> Result<()> {
    let ir = load_ir(&ir_path)?;

    let scenario = Scenario {
        target,
        robot_type: ir.robot_type.clone(),
        ..Scenario::default()
    };

    let mut engine = RuntimeEngine::new();
    if let Some(path) = audit_log {
        engine = engine.with_audit_sink(AuditLogWriter::open(path)?);
    }

    let adapter = AdapterFactory::for_brand(&ir.brand, &ir.robot_type);
    adapter.connect(&serde_json::json!({}));

    let report = engine.execute(&ir, &scenario, Some(adapter.as_ref()));

    log::info!(
        "🏁 Execution {}: {} nodes, task {}",
        report.status,
        report.node_count,
        report.task_id.as_deref().unwrap_or("-")
    );
    if !report.reason.is_empty() {
        log::warn!("Reason: {}", report.reason);
    }

    println!("{}", serde_json::to_string_pretty(&report.results)?);
    Ok(())
}

// ============================================================================
// 4. HELPERS
// ============================================================================

fn load_ir(path: &PathBuf) -> Result<WorkflowIR> {
    let raw = fs::read_to_string(path).with_context(|| format!("Reading {path:?}"))?;
    WorkflowIR::from_json(&raw).context("Invalid workflow IR")
}

fn print_diagnostics(diags: &[Diagnostic]) {
    for d in diags {
        match d.level {
            robograph::DiagnosticLevel::Error => log::error!("{d}"),
            robograph::DiagnosticLevel::Warning => log::warn!("{d}"),
            robograph::DiagnosticLevel::Info => log::info!("{d}"),
        }
    }
}

fn write_output(out: Option<PathBuf>, content: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(&path, content).with_context(|| format!("Writing {path:?}"))?;
            log::info!("📄 Wrote {path:?}");
        }
        None => println!("{content}"),
    }
    Ok(())
}
