use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;

use cumulus_core::config::StackConfig;
use cumulus_core::declaration::DeclarationSet;
use cumulus_core::diagnostics;
use cumulus_core::outputs::{self, OutputValue, ResolvedAttributes};
use cumulus_core::providers::ec2;
use cumulus_core::resource::{ResourceId, Value};
use cumulus_core::schema::SchemaRegistry;
use cumulus_core::stack::web_stack;

#[derive(Parser)]
#[command(name = "cumulus")]
#[command(about = "Declare a small AWS web stack as a typed resource graph", long_about = None)]
struct Cli {
    /// JSON file overriding stack placement and sizing
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the declarations against resource schemas
    Validate,
    /// Show every declared resource with its attributes
    Show,
    /// Show the dependency tree
    Graph,
    /// Show the order resources must be created in
    Order,
    /// Show exported outputs
    Outputs {
        /// JSON document of attributes reported after provisioning
        #[arg(long)]
        resolved: Option<PathBuf>,

        /// Print outputs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the declaration set as JSON to stdout
    Export,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let result = load_stack(cli.config.as_deref()).and_then(|(config, set)| match cli.command {
        Commands::Validate => run_validate(&config, &set),
        Commands::Show => run_show(&set),
        Commands::Graph => run_graph(&set),
        Commands::Order => run_order(&set),
        Commands::Outputs { resolved, json } => run_outputs(&set, resolved.as_deref(), json),
        Commands::Export => run_export(&set),
    });

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_stack(config_path: Option<&Path>) -> Result<(StackConfig, DeclarationSet), String> {
    let config = StackConfig::load(config_path).map_err(|e| e.to_string())?;
    info!("declaring web stack in {}", config.region);
    let set = web_stack(&config).map_err(|e| format!("Declaration error: {}", e))?;
    Ok((config, set))
}

fn get_schemas() -> SchemaRegistry {
    ec2::schemas().into_iter().collect()
}

fn run_validate(config: &StackConfig, set: &DeclarationSet) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    if let Err(errors) = set.validate(&get_schemas()) {
        let lines: Vec<String> = errors
            .iter()
            .map(|(id, error)| format!("{}: {}", id, error))
            .collect();
        return Err(lines.join("\n"));
    }

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            set.resources().len()
        )
        .green()
        .bold()
    );

    for resource in set.resources() {
        println!("  • {}", resource.id);
    }

    let findings = diagnostics::check(set, Some(&config.region));
    if !findings.is_empty() {
        println!();
        for finding in findings {
            println!("{}", finding.to_string().yellow());
        }
    }

    Ok(())
}

fn run_show(set: &DeclarationSet) -> Result<(), String> {
    for resource in set.resources() {
        println!("{}", resource.id.to_string().cyan().bold());
        for (key, value) in &resource.attributes {
            let rendered = if key == "public_key" {
                "(sensitive)".dimmed()
            } else {
                format_value(value).green()
            };
            println!("    {}: {}", key, rendered);
        }
        println!();
    }

    println!(
        "{}",
        format!(
            "{} resources, {} outputs",
            set.resources().len(),
            set.exports().len()
        )
        .bold()
    );
    Ok(())
}

fn run_graph(set: &DeclarationSet) -> Result<(), String> {
    let graph = set.dependency_graph();

    println!("{}", "Dependency Graph:".cyan().bold());
    println!();

    // Resources that depend on nothing, in declaration order
    let roots: Vec<&ResourceId> = set
        .resources()
        .iter()
        .map(|r| &r.id)
        .filter(|id| graph.dependencies_of(id).is_empty())
        .collect();

    fn print_tree(
        id: &ResourceId,
        set: &DeclarationSet,
        printed: &mut HashSet<ResourceId>,
        depth: usize,
        is_last: bool,
        prefix: &str,
    ) {
        let connector = if depth == 0 {
            String::new()
        } else if is_last {
            format!("{}└─ ", prefix)
        } else {
            format!("{}├─ ", prefix)
        };

        if !printed.insert(id.clone()) {
            println!("  {}{} {}", connector, id.to_string().dimmed(), "(see above)".dimmed());
            return;
        }

        let used_in: Vec<String> = set
            .dependencies_of(id)
            .iter()
            .map(|d| format!("{} ← {}.{}", d.used_in, d.target.name, d.attribute))
            .collect();
        if used_in.is_empty() {
            println!("  {}{}", connector, id.to_string().cyan().bold());
        } else {
            println!(
                "  {}{} {}",
                connector,
                id.to_string().cyan().bold(),
                format!("({})", used_in.join(", ")).dimmed()
            );
        }

        let child_prefix = if depth == 0 {
            String::new()
        } else if is_last {
            format!("{}   ", prefix)
        } else {
            format!("{}│  ", prefix)
        };

        // Children in declaration order for stable output
        let dependents = set.dependency_graph().dependents_of(id);
        let children: Vec<&ResourceId> = set
            .resources()
            .iter()
            .map(|r| &r.id)
            .filter(|r| dependents.contains(*r))
            .collect();
        for (i, child) in children.iter().enumerate() {
            print_tree(
                child,
                set,
                printed,
                depth + 1,
                i == children.len() - 1,
                &child_prefix,
            );
        }
    }

    let mut printed = HashSet::new();
    for root in roots {
        print_tree(root, set, &mut printed, 0, true, "");
    }

    Ok(())
}

fn run_order(set: &DeclarationSet) -> Result<(), String> {
    println!("{}", "Creation Order:".cyan().bold());
    println!();

    for (i, id) in set.creation_order().iter().enumerate() {
        let deps: Vec<String> = set
            .dependency_graph()
            .targets_of(id)
            .iter()
            .map(ToString::to_string)
            .collect();
        if deps.is_empty() {
            println!("  {:>2}. {}", i + 1, id.to_string().green());
        } else {
            println!(
                "  {:>2}. {} {}",
                i + 1,
                id.to_string().green(),
                format!("after {}", deps.join(", ")).dimmed()
            );
        }
    }

    Ok(())
}

fn run_outputs(set: &DeclarationSet, resolved: Option<&Path>, json: bool) -> Result<(), String> {
    let resolved = match resolved {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            ResolvedAttributes::from_json(&content).map_err(|e| e.to_string())?
        }
        None => ResolvedAttributes::new(),
    };

    let outputs = outputs::resolve(set, &resolved);

    if json {
        let rendered = serde_json::to_string_pretty(&outputs).map_err(|e| e.to_string())?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("{}", "Outputs:".cyan().bold());
    println!();
    for output in outputs {
        let value = match &output.value {
            OutputValue::Known(_) => output.value.to_string().green(),
            OutputValue::Pending => output.value.to_string().dimmed(),
        };
        println!(
            "  {} = {} {}",
            output.name.bold(),
            value,
            format!("({})", output.source).dimmed()
        );
    }

    Ok(())
}

fn run_export(set: &DeclarationSet) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(&set.to_json()).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

/// Format a Value for display
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let strs: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(r) => r.to_string(),
    }
}
