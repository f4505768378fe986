use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use alarm_expr::{Expression, Inventory};

#[derive(Parser)]
#[command(
    name = "alarm-expr",
    version,
    about = "Check and evaluate alarm expressions against a device schema"
)]
struct Cli {
    /// Alarm expression source text
    expression: String,

    /// Schema file describing the available methods (JSON)
    #[arg(short, long)]
    inventory: PathBuf,

    /// State snapshot file: {"method.name": <get response>, ...}
    #[arg(short, long)]
    bindings: Option<PathBuf>,

    /// Print the parsed tree
    #[arg(short, long)]
    tree: bool,

    /// Reflect the boolean result in the exit code (0 = true, 1 = false)
    #[arg(short = 'e', long = "exit-status")]
    exit_status: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let schema = std::fs::read_to_string(&cli.inventory)
        .with_context(|| format!("reading {}", cli.inventory.display()))?;
    let inventory = Inventory::from_json(&schema)
        .with_context(|| format!("parsing {}", cli.inventory.display()))?;

    let expr = Expression::new(&cli.expression, &inventory);
    if let Some(err) = expr.error() {
        anyhow::bail!("invalid expression: {err}");
    }

    if cli.tree {
        println!("{expr}");
    }

    let bindings_path = match &cli.bindings {
        Some(path) => path,
        None => {
            if !cli.tree {
                let reads: Vec<String> = expr.method_names().into_iter().collect();
                println!("ok; reads: {}", reads.join(", "));
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    let bindings = load_bindings(bindings_path)?;
    let fired = expr.evaluate(&bindings);
    println!("{fired}");

    if cli.exit_status && !fired {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// A bindings file maps each method name to its full JSON-RPC get response;
/// the engine wants those responses back as raw text.
fn load_bindings(path: &Path) -> Result<HashMap<String, String>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(doc.into_iter().map(|(k, v)| (k, v.to_string())).collect())
}
