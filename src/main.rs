//! obd-kb CLI: curate the OBD diagnostic knowledge graph.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::de::DeserializeOwned;

use obd_knowledge::config::KbConfig;
use obd_knowledge::enhance::{
    ComponentRecord, ComponentSetRecord, DiagnosisLogRecord, TroubleCodeRecord,
};
use obd_knowledge::kb::{KnowledgeBase, Published};

#[derive(Parser)]
#[command(name = "obd-kb", version, about = "OBD diagnostic knowledge graph client")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset URL of the remote triple store (overrides the config).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Load a static RDF file into a local in-memory graph instead.
    #[arg(long, global = true, conflicts_with = "graph_dir")]
    graph_file: Option<PathBuf>,

    /// Use a persistent local graph in this directory instead.
    #[arg(long, global = true)]
    graph_dir: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all trouble codes.
    Codes,

    /// Show everything known about a trouble code.
    ShowCode { code: String },

    /// List all suspect components.
    Components,

    /// Show everything known about a suspect component.
    ShowComponent { name: String },

    /// Add or update a suspect component.
    AddComponent {
        name: String,
        /// Components this one is affected by (comma separated, must exist).
        #[arg(long, value_delimiter = ',')]
        affected_by: Vec<String>,
        /// Whether the component is checked with an oscilloscope.
        #[arg(long)]
        oscilloscope: Option<bool>,
        /// Overwrite instead of merging with the existing component.
        #[arg(long)]
        replace: bool,
    },

    /// Add or update a trouble code from a JSON record.
    AddCode {
        #[arg(long)]
        file: PathBuf,
    },

    /// Overwrite an existing trouble code with a corrected JSON record.
    ReplaceCode {
        #[arg(long)]
        file: PathBuf,
    },

    /// Add or update a component set (subsystem).
    AddSet {
        name: String,
        #[arg(long, value_delimiter = ',')]
        includes: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        verified_by: Vec<String>,
    },

    /// Record a diagnosis run from a JSON record.
    AddLog {
        #[arg(long)]
        file: PathBuf,
    },

    /// Dump the whole graph as JSON.
    Export {
        /// Output file (stdout if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => KbConfig::load(path)?,
        None => KbConfig::default(),
    };
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if cli.graph_file.is_some() {
        config.graph_file = cli.graph_file;
    }
    if cli.graph_dir.is_some() {
        config.graph_dir = cli.graph_dir;
    }
    let kb = KnowledgeBase::new(config)?;
    let json = cli.json;

    match cli.command {
        Commands::Codes => print_list(&kb.query().all_codes()?, json)?,

        Commands::ShowCode { code } => match kb.query().trouble_code_summary(&code)? {
            None => miette::bail!("unknown trouble code \"{code}\""),
            Some(summary) if json => print_json(&summary)?,
            Some(summary) => {
                println!("{} ({})", summary.code, summary.id);
                if let Some(ref t) = summary.code_type {
                    println!("  type:       {t}");
                }
                if let Some(ref c) = summary.category {
                    println!("  category:   {c}");
                }
                if let Some(ref c) = summary.condition {
                    println!("  condition:  {c}");
                }
                for s in &summary.symptoms {
                    println!("  symptom:    {s}");
                }
                for o in &summary.occurs_with {
                    println!("  occurs with {o}");
                }
                for set in &summary.subsystems {
                    println!("  subsystem:  {set}");
                }
                if !summary.suspects.is_empty() {
                    println!("  suspect components:");
                    for row in &summary.suspects {
                        println!("    {}. {}", row.priority, row.component_name);
                    }
                }
            }
        },

        Commands::Components => print_list(&kb.query().all_component_names()?, json)?,

        Commands::ShowComponent { name } => match kb.query().component_summary(&name)? {
            None => miette::bail!("unknown component \"{name}\""),
            Some(summary) if json => print_json(&summary)?,
            Some(summary) => {
                println!("{} ({})", summary.name, summary.id);
                if let Some(flag) = summary.use_oscilloscope {
                    println!("  oscilloscope: {flag}");
                }
                for (label, names) in [
                    ("affected by", &summary.affected_by),
                    ("subcomponent", &summary.subcomponents),
                    ("included in", &summary.sets_including),
                    ("contained in", &summary.sets_containing),
                ] {
                    for n in names {
                        println!("  {label}: {n}");
                    }
                }
            }
        },

        Commands::AddComponent {
            name,
            affected_by,
            oscilloscope,
            replace,
        } => {
            let record = ComponentRecord {
                name,
                use_oscilloscope: oscilloscope,
                affected_by,
            };
            let published = if replace {
                kb.replace_component(&record)?
            } else {
                kb.publish_component(&record)?
            };
            report(&record.name, &published, json)?;
        }

        Commands::AddCode { file } => {
            let record: TroubleCodeRecord = read_record(&file)?;
            let published = kb.publish_trouble_code(&record)?;
            report(&record.code, &published, json)?;
        }

        Commands::ReplaceCode { file } => {
            let record: TroubleCodeRecord = read_record(&file)?;
            let published = kb.replace_trouble_code(&record)?;
            report(&record.code, &published, json)?;
        }

        Commands::AddSet {
            name,
            includes,
            verified_by,
        } => {
            let record = ComponentSetRecord {
                name,
                includes,
                verified_by,
            };
            let published = kb.publish_component_set(&record)?;
            report(&record.name, &published, json)?;
        }

        Commands::AddLog { file } => {
            let record: DiagnosisLogRecord = read_record(&file)?;
            let published = kb.publish_diagnosis_log(&record)?;
            report(&record.vin, &published, json)?;
        }

        Commands::Export { output } => {
            let export = kb.export()?;
            let text = serde_json::to_string_pretty(&export).into_diagnostic()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text).into_diagnostic()?;
                    println!(
                        "Exported {} entities and {} statements to {}",
                        export.entities.len(),
                        export.statements.len(),
                        path.display()
                    );
                }
                None => println!("{text}"),
            }
        }
    }

    Ok(())
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).into_diagnostic()?;
    serde_json::from_str(&content).into_diagnostic()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_list(items: &[String], json: bool) -> Result<()> {
    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("(none)");
    }
    for item in items {
        println!("{item}");
    }
    Ok(())
}

fn report(key: &str, published: &Published, json: bool) -> Result<()> {
    if json {
        return print_json(published);
    }
    let verb = if published.created { "Created" } else { "Updated" };
    println!(
        "{verb} \"{key}\" as {} (+{} facts, -{} facts)",
        published.id, published.inserted, published.retracted
    );
    Ok(())
}
