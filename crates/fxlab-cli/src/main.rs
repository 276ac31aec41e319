use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fxlab_contracts::nodes::{InputKind, Node, NodeInputs, NodeRegistry, NodeValue};
use fxlab_contracts::payload::ReferenceRole;
use fxlab_contracts::AspectRatio;
use fxlab_engine::codec::{load_image_file, save_batch_png};
use fxlab_engine::nodes::{IMAGEFX_NODE, WHISK_NODE};
use fxlab_engine::{default_node_registry, ServiceConfig, WhiskPromptsNode};
use serde_json::{json, Map, Value};

#[derive(Debug, Parser)]
#[command(name = "fxlab", version, about = "Run labs.google image nodes from the command line")]
struct Cli {
    /// Credential file (defaults to $FXLAB_CREDENTIALS, then ./googel.json).
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,
    /// Append node events to this JSONL file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Request timeout in seconds; 0 waits indefinitely.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate images from a single prompt.
    Imagefx(ImageFxArgs),
    /// Generate images from subject, scene and style reference images.
    Whisk(WhiskArgs),
    /// Split a JSON array of prompts into four outputs.
    SplitPrompts(SplitPromptsArgs),
    /// List the registered nodes and their inputs.
    Nodes,
}

#[derive(Debug, Parser)]
struct ImageFxArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value_t = 0)]
    seed: i64,
    #[arg(long, default_value = "16:9 (Landscape)")]
    aspect_ratio: String,
    #[arg(long, default_value_t = 4)]
    num_images: i64,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct WhiskArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    subject: Option<PathBuf>,
    #[arg(long)]
    scene: Option<PathBuf>,
    #[arg(long)]
    style: Option<PathBuf>,
    #[arg(long, default_value_t = 2)]
    num_images: i64,
    #[arg(long, default_value_t = 0)]
    seed: i64,
    #[arg(long)]
    aspect_ratio: Option<String>,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct SplitPromptsArgs {
    /// JSON array, e.g. the `prompts` output of `fxlab whisk`.
    #[arg(long)]
    prompts: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("fxlab error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = service_config(&cli);
    match cli.command {
        Command::Imagefx(args) => run_imagefx(&config, args),
        Command::Whisk(args) => run_whisk(&config, args),
        Command::SplitPrompts(args) => run_split_prompts(args),
        Command::Nodes => run_nodes(&config),
    }
}

fn service_config(cli: &Cli) -> ServiceConfig {
    let mut config = ServiceConfig::from_env();
    if let Some(path) = &cli.credentials {
        config = config.with_credentials_path(path);
    }
    if cli.events.is_some() {
        config = config.with_events_path(cli.events.clone());
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }
    config
}

fn run_imagefx(config: &ServiceConfig, args: ImageFxArgs) -> Result<i32> {
    if AspectRatio::from_label(&args.aspect_ratio).is_none() {
        bail!(
            "unknown aspect ratio '{}'; expected one of: {}",
            args.aspect_ratio,
            AspectRatio::labels().join(", ")
        );
    }
    let registry = default_node_registry(config)?;
    let inputs = NodeInputs::new()
        .with("prompt", NodeValue::String(args.prompt))
        .with("seed", NodeValue::Int(args.seed))
        .with("aspect_ratio", NodeValue::String(args.aspect_ratio))
        .with("num_images", NodeValue::Int(args.num_images));
    let outputs = execute(&registry, IMAGEFX_NODE, &inputs)?;
    report(registry_node(&registry, IMAGEFX_NODE)?, outputs, &args.out, "imagefx")?;
    Ok(0)
}

fn run_whisk(config: &ServiceConfig, args: WhiskArgs) -> Result<i32> {
    let registry = default_node_registry(config)?;
    let mut inputs = NodeInputs::new()
        .with("prompt", NodeValue::String(args.prompt))
        .with("num_images", NodeValue::Int(args.num_images))
        .with("seed", NodeValue::Int(args.seed));
    if let Some(label) = args.aspect_ratio {
        inputs.insert("aspect_ratio", NodeValue::String(label));
    }
    for (role, path) in [
        (ReferenceRole::Subject, &args.subject),
        (ReferenceRole::Scene, &args.scene),
        (ReferenceRole::Style, &args.style),
    ] {
        if let Some(path) = path {
            inputs.insert(role.input_name(), NodeValue::Image(load_image_file(path)?));
        }
    }
    let outputs = execute(&registry, WHISK_NODE, &inputs)?;
    report(registry_node(&registry, WHISK_NODE)?, outputs, &args.out, "whisk")?;
    Ok(0)
}

fn run_split_prompts(args: SplitPromptsArgs) -> Result<i32> {
    let node = WhiskPromptsNode;
    let inputs = NodeInputs::new().with("prompts", NodeValue::String(args.prompts));
    let outputs = node.execute(&inputs)?;
    let mut summary = Map::new();
    for (spec, value) in node.outputs().iter().zip(outputs) {
        summary.insert(
            spec.name.to_string(),
            Value::String(value.as_str().unwrap_or_default().to_string()),
        );
    }
    println!("{}", serde_json::to_string_pretty(&Value::Object(summary))?);
    Ok(0)
}

fn run_nodes(config: &ServiceConfig) -> Result<i32> {
    let registry = default_node_registry(config)?;
    let mut listing = Vec::new();
    for name in registry.names() {
        let node = registry_node(&registry, &name)?;
        let inputs: Vec<Value> = node
            .inputs()
            .iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "type": input_kind_label(&spec.kind),
                    "required": spec.required,
                })
            })
            .collect();
        let outputs: Vec<Value> = node
            .outputs()
            .iter()
            .map(|spec| json!({"name": spec.name, "type": spec.kind.as_str()}))
            .collect();
        listing.push(json!({
            "name": node.name(),
            "display_name": node.display_name(),
            "category": node.category(),
            "inputs": inputs,
            "outputs": outputs,
        }));
    }
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(0)
}

fn registry_node<'a>(registry: &'a NodeRegistry, name: &str) -> Result<&'a dyn Node> {
    registry
        .get(name)
        .with_context(|| format!("node '{name}' is not registered"))
}

fn execute(registry: &NodeRegistry, name: &str, inputs: &NodeInputs) -> Result<Vec<NodeValue>> {
    registry_node(registry, name)?
        .execute(inputs)
        .with_context(|| format!("{name} failed"))
}

/// Saves image outputs as PNGs under `out` and prints every output as one JSON object.
fn report(node: &dyn Node, outputs: Vec<NodeValue>, out: &Path, stem: &str) -> Result<()> {
    let mut summary = Map::new();
    for (spec, value) in node.outputs().iter().zip(outputs) {
        let rendered = match value {
            NodeValue::Image(images) => {
                let paths = save_batch_png(&images, out, stem)?;
                log::info!("wrote {} image(s) to {}", paths.len(), out.display());
                Value::Array(
                    paths
                        .iter()
                        .map(|path| Value::String(path.display().to_string()))
                        .collect(),
                )
            }
            NodeValue::String(text) => Value::String(text),
            NodeValue::Int(number) => json!(number),
        };
        summary.insert(spec.name.to_string(), rendered);
    }
    println!("{}", serde_json::to_string_pretty(&Value::Object(summary))?);
    Ok(())
}

fn input_kind_label(kind: &InputKind) -> String {
    match kind {
        InputKind::String { multiline: true } => "STRING (multiline)".to_string(),
        InputKind::String { multiline: false } => "STRING".to_string(),
        InputKind::Int { default, min, max } => format!("INT {min}..={max} (default {default})"),
        InputKind::Choice { options, default } => {
            format!("CHOICE [{}] (default {default})", options.join(", "))
        }
        InputKind::Image => "IMAGE".to_string(),
    }
}
