//! Megaverse 命令行入口
//!
//! 加载配置、初始化日志、选择后端（HTTP 或 Mock），按子命令执行对应阶段。

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use megaverse::config::load_config;
use megaverse::core::{create_api_from_config, Outcome, ReconciliationReport, RunError, RunResult};
use megaverse::{observability, Orchestrator};

#[derive(Parser, Debug)]
#[command(name = "megaverse", version, about = "Declarative grid reconciler for the Megaverse")]
struct Cli {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// 创建 X 形 POLYanet 图案
    Phase1 {
        #[arg(long)]
        size: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// 按目标地图创建全部天体
    Phase2 {
        #[arg(long)]
        dry_run: bool,
    },
    /// 对比目标地图与当前地图
    Validate,
    /// 删除 X 形图案
    Reset {
        #[arg(long)]
        size: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// 清空当前地图上的全部天体
    Clear,
    /// 依次执行 phase1 / phase2 的 dry-run 与 validate
    All,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    observability::init(&cfg.logging.level);

    let api = create_api_from_config(&cfg);
    let orchestrator = Orchestrator::from_config(api, &cfg);
    let default_size = cfg.pattern.default_size;

    match cli.command.unwrap_or(Cmd::Phase1 { size: None, dry_run: false }) {
        Cmd::Phase1 { size, dry_run } => {
            let size = size.unwrap_or(default_size);
            println!("🚀 Starting Phase 1: Creating POLYanet X-shape ({size}x{size})...");
            let result = orchestrator.run_pattern(size, dry_run).await;
            report_run("Phase 1", result)
        }
        Cmd::Phase2 { dry_run } => {
            println!("🚀 Starting Phase 2: Building megaverse from goal map...");
            let result = orchestrator.run_goal(dry_run).await;
            report_run("Phase 2", result)
        }
        Cmd::Validate => {
            println!("🔍 Starting Megaverse validation...\n");
            let report = orchestrator.validate().await.context("Validation failed")?;
            print_report(&report);
            Ok(report.is_valid)
        }
        Cmd::Reset { size, dry_run } => {
            let size = size.unwrap_or(default_size);
            println!("🧹 Resetting X-shape ({size}x{size})...");
            let result = orchestrator.reset_pattern(size, dry_run).await;
            report_run("Reset", result)
        }
        Cmd::Clear => {
            println!("🧹 Clearing all astral objects...");
            let result = orchestrator.clear_all().await;
            report_run("Clear", result)
        }
        Cmd::All => {
            println!("🧪 Dry run Phase 1 ({default_size}x{default_size} X pattern)...\n");
            let phase1 = report_run("Phase 1", orchestrator.run_pattern(default_size, true).await)?;
            println!("\n🧪 Dry run Phase 2 (goal map)...\n");
            let phase2 = report_run("Phase 2", orchestrator.run_goal(true).await)?;
            println!("\n🔍 Starting Megaverse validation...\n");
            let report = orchestrator.validate().await.context("Validation failed")?;
            print_report(&report);
            Ok(phase1 && phase2)
        }
    }
}

fn report_run(name: &str, result: Result<RunResult, RunError>) -> anyhow::Result<bool> {
    let result = match result {
        Ok(result) => result,
        Err(RunError::Halted { succeeded, log, invalid, source, entity, action }) => {
            eprintln!("❌ {name} halted: {action} {entity} failed: {source}");
            eprintln!("   {succeeded} operations succeeded before the failure ({} recorded)", log.len());
            if !invalid.is_empty() {
                eprintln!("\n❌ Invalid cells skipped ({}):", invalid.len());
                for err in &invalid {
                    eprintln!("   - {err}");
                }
            }
            return Ok(false);
        }
        Err(e) => return Err(e).with_context(|| format!("{name} failed")),
    };

    if result.dry_run {
        println!("📋 {name} DRY RUN RESULTS");
        println!("Success: {}", result.success);
        println!("Total Operations: {}", result.planned());
        for (index, op) in result.operations.iter().enumerate() {
            println!("   {}. {op}", index + 1);
        }
    } else {
        for op in result.operations.iter().filter(|op| op.outcome == Outcome::Failed) {
            println!("   ⚠️  {op} failed");
        }
        println!("Completed operations: {}", result.completed());
    }
    if !result.errors.is_empty() {
        println!("\n❌ Invalid cells ({}):", result.errors.len());
        for err in &result.errors {
            println!("   - {err}");
        }
    }

    if result.success {
        println!("✅ {name} completed successfully!");
    } else {
        println!("❌ {name} finished with errors");
    }
    Ok(result.success)
}

fn print_report(report: &ReconciliationReport) {
    println!("📊 VALIDATION RESULTS");
    println!("=====================");
    println!("Status: {}", if report.is_valid { "✅ VALID" } else { "❌ INVALID" });
    println!("Goal Objects: {}", report.goal_count);
    println!("Current Objects: {}", report.observed_count);

    if !report.missing.is_empty() {
        println!("\n❌ Missing Objects ({}):", report.missing.len());
        for entry in &report.missing {
            println!("   - {entry}");
        }
    }
    if !report.extra.is_empty() {
        println!("\n⚠️  Extra Objects ({}):", report.extra.len());
        for entry in &report.extra {
            println!("   - {entry}");
        }
    }

    if report.is_valid {
        println!("\n🎉 Your megaverse matches the goal state!");
    } else {
        println!("\n💡 Recommendations:");
        if !report.missing.is_empty() {
            println!("   - Run `megaverse phase2` to create missing objects");
        }
        if !report.extra.is_empty() {
            println!("   - Run `megaverse clear` to remove extra objects");
        }
    }
}
