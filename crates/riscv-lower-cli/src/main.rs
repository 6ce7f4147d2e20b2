use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use riscv_lower::codegen::constant::{BuildStep, apply_build_plan, build_integer};
use riscv_lower::codegen::cost::{OuterCode, expr_cost};
use riscv_lower::{Expr, TargetConfig, TargetOptions, target::WordSize};

#[derive(Parser)]
#[command(name = "riscv-lower")]
#[command(about = "Inspect riscv-lower lowering decisions")]
struct Cli {
    /// Use the 32-bit target instead of the 64-bit one.
    #[arg(long, global = true)]
    rv32: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the instruction sequence synthesizing an integer constant.
    Synth {
        #[arg(help = "Constant value (decimal, or hex with 0x)")]
        value: String,
    },
    /// Print which immediate forms a constant fits and its move cost.
    Imm {
        #[arg(help = "Constant value (decimal, or hex with 0x)")]
        value: String,
    },
}

fn parse_value(text: &str) -> Result<i64> {
    let (digits, negative) = match text.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).context("invalid hexadecimal constant")?
    } else {
        digits.parse::<u64>().context("invalid decimal constant")?
    };
    let value = magnitude as i64;
    Ok(if negative { value.wrapping_neg() } else { value })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let target = TargetConfig::new(TargetOptions {
        word: if cli.rv32 {
            WordSize::Rv32
        } else {
            WordSize::Rv64
        },
        ..TargetOptions::default()
    });

    match cli.command {
        Commands::Synth { value } => {
            let value = parse_value(&value)?;
            let plan = build_integer(value);
            for (i, step) in plan.iter().enumerate() {
                match step {
                    BuildStep::Load(v) => println!("{i}: load {v:#x}"),
                    BuildStep::Shl(n) => println!("{i}: shl {n}"),
                    BuildStep::Add(v) => println!("{i}: add {v:#x}"),
                }
            }
            println!("{} instruction(s)", plan.len());
            if apply_build_plan(&plan) != value {
                bail!("plan does not round-trip");
            }
        }

        Commands::Imm { value } => {
            let value = parse_value(&value)?;
            println!(
                "small immediate: {}",
                riscv_lower::abi::small_operand(value)
            );
            println!("lui pattern:     {}", riscv_lower::abi::lui_operand(value));
            println!(
                "high part:       {:#x}",
                riscv_lower::abi::const_high_part(value)
            );
            println!(
                "low part:        {}",
                riscv_lower::abi::const_low_part(value)
            );
            println!(
                "move cost:       {}",
                expr_cost(&target, &Expr::Const(value), OuterCode::Set, false)
            );
        }
    }

    Ok(())
}
