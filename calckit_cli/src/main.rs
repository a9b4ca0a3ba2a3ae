use calckit_core::history::DEFAULT_HISTORY_LIMIT;
use calckit_core::*;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "calckit")]
#[command(about = "Declare, run and record calculators", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the directory calculator manifests are discovered from
    #[arg(long, global = true)]
    calculators_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered calculators
    List,

    /// Show the inputs and outputs of a calculator
    Show {
        /// Calculator slug
        slug: String,
    },

    /// Run a calculator
    Run {
        /// Calculator slug
        slug: String,

        /// Input assignment as name=value (repeatable)
        #[arg(short, long = "input", value_name = "NAME=VALUE")]
        inputs: Vec<String>,

        /// Dry run - compute without saving the calculation
        #[arg(long)]
        dry_run: bool,

        /// Scope to save the calculation under
        #[arg(long)]
        scope: Option<String>,
    },

    /// Show saved calculations of a calculator, newest first
    History {
        /// Calculator slug
        slug: String,

        /// Maximum number of calculations to show
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,

        /// Only show calculations saved under this scope
        #[arg(long)]
        scope: Option<String>,
    },
}

fn main() {
    // Initialize logging
    calckit_core::logging::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.configure(|c| c.history.data_dir = data_dir);
    }
    if let Some(dir) = cli.calculators_dir {
        config.configure(|c| c.discovery.calculators_path = dir);
    }

    let mut kit = CalcKit::new(config);
    kit.register_builtins()?;
    let discovered = kit.auto_register(Path::new("."), builtin::compute_table())?;
    tracing::debug!("Registered {} discovered calculator(s)", discovered);

    match cli.command {
        Commands::List => cmd_list(&kit),
        Commands::Show { slug } => cmd_show(&kit, &slug),
        Commands::Run {
            slug,
            inputs,
            dry_run,
            scope,
        } => cmd_run(&kit, &slug, &inputs, dry_run, scope.as_deref()),
        Commands::History { slug, limit, scope } => {
            cmd_history(&kit, &slug, limit, scope.as_deref())
        }
    }
}

fn cmd_list(kit: &CalcKit) -> Result<()> {
    let mut kinds = kit.all();
    kinds.sort_by(|a, b| a.slug().cmp(&b.slug()));

    if kinds.is_empty() {
        println!("No calculators registered.");
        return Ok(());
    }

    for kind in kinds {
        let slug = kind.slug().map(Slug::as_str).unwrap_or_default();
        let version = kind.version().map(|v| format!(" (v{})", v)).unwrap_or_default();
        println!("{:<20} {}{}", slug, kind.display_name(), version);
    }
    Ok(())
}

fn cmd_show(kit: &CalcKit, slug: &str) -> Result<()> {
    let kind = kit.fetch(slug)?;

    println!("{}", kind.display_name());
    println!("{}", "=".repeat(50));
    if let Some(slug) = kind.slug() {
        println!("Slug:    {}", slug);
    }
    if let Some(version) = kind.version() {
        println!("Version: {}", version);
    }

    println!();
    println!("Inputs:");
    for input in kind.inputs() {
        let mut details = vec![input.input_type().to_string()];
        if input.is_required() {
            details.push("required".into());
        }
        if let Some(min) = input.min() {
            details.push(format!("min {}", validation::format_bound(min)));
        }
        if let Some(max) = input.max() {
            details.push(format!("max {}", validation::format_bound(max)));
        }
        if let Some(default) = input.resolve_default() {
            details.push(format!("default {}", default));
        }
        println!("  {:<16} {} [{}]", input.name(), input.label(), details.join(", "));

        if let Some(options) = input.options_for_select() {
            let choices: Vec<String> = options
                .iter()
                .map(|o| format!("{}={}", o.value, o.label))
                .collect();
            println!("  {:<16} options: {}", "", choices.join(", "));
        }
        if let Some(hint) = input.hint() {
            println!("  {:<16} {}", "", hint);
        }
    }

    println!();
    println!("Outputs:");
    for output in kind.outputs() {
        println!("  {:<16} {} [{}]", output.name(), output.label(), output.output_type());
    }
    Ok(())
}

fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), Value::String(value.to_string())))
        }
        _ => Err(Error::Other(format!(
            "Invalid input '{}', expected NAME=VALUE",
            raw
        ))),
    }
}

fn build_calculator(kind: Arc<CalculatorType>, assignments: &[String]) -> Result<Calculator> {
    let parsed = assignments
        .iter()
        .map(String::as_str)
        .map(parse_assignment)
        .collect::<Result<Vec<_>>>()?;

    // Inputs left out start from their declared defaults
    let defaults: Vec<(String, Value)> = kind
        .inputs()
        .iter()
        .filter(|input| !parsed.iter().any(|(name, _)| name == input.name()))
        .filter_map(|input| {
            input
                .resolve_default()
                .map(|value| (input.name().to_string(), value.to_json()))
        })
        .collect();

    Calculator::with_inputs(kind, defaults.into_iter().chain(parsed))
}

fn cmd_run(
    kit: &CalcKit,
    slug: &str,
    assignments: &[String],
    dry_run: bool,
    scope: Option<&str>,
) -> Result<()> {
    let kind = kit.fetch(slug)?;
    let mut calculator = build_calculator(Arc::clone(&kind), assignments)?;

    let outputs = match calculator.run()? {
        Some(outputs) => outputs,
        None => {
            let errors = calculator.errors();
            let messages = errors.full_messages_with(|field| {
                kind.input_for(field)
                    .map(|input| input.label())
                    .unwrap_or_else(|| definition::humanize(field))
            });
            eprintln!("Invalid inputs for {}:", kind.display_name());
            for message in &messages {
                eprintln!("  - {}", message);
            }
            return Err(Error::Validation(errors.clone()));
        }
    };

    println!("{}", kind.display_name());
    println!("{}", "-".repeat(50));
    for output in kind.outputs() {
        println!(
            "  {:<20} {}",
            output.label(),
            format_for(output, outputs.get(output.name()))
        );
    }

    if dry_run {
        println!();
        println!("(dry run - calculation not saved)");
        return Ok(());
    }

    let config = kit.config();
    let mut sink = JsonlSink::new(config.history_path());
    if let Some(record) = save_calculation(config, &mut sink, &calculator, &outputs, scope)? {
        println!();
        println!("Saved calculation {}", record.id);
    }
    Ok(())
}

fn cmd_history(kit: &CalcKit, slug: &str, limit: usize, scope: Option<&str>) -> Result<()> {
    let config = kit.config();
    let records = load_saved_calculations(config, slug, scope, limit)?;

    if records.is_empty() {
        println!("No saved calculations for {}.", Slug::normalize(slug));
        return Ok(());
    }

    let kind = kit.find(slug);
    for record in &records {
        println!(
            "{}  {}  v{}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.id,
            record.calculator_version
        );
        if let Some(warning) = record.version_warning(config, kit.registry()) {
            println!("  ! {}", warning);
        }

        let inputs: Vec<String> = record
            .inputs
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| match value {
                Value::String(s) => format!("{}={}", name, s),
                other => format!("{}={}", name, other),
            })
            .collect();
        println!("  inputs:  {}", inputs.join(", "));

        let outputs: Vec<String> = record
            .outputs
            .iter()
            .map(|(name, value)| {
                let formatted = kind
                    .as_ref()
                    .and_then(|k| k.output_for(name))
                    .map(|output| format_for(output, Some(value)))
                    .unwrap_or_else(|| value.to_string());
                format!("{}={}", name, formatted)
            })
            .collect();
        println!("  outputs: {}", outputs.join(", "));
    }
    Ok(())
}
