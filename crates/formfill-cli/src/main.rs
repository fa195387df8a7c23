use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use formfill_core::{
    Batch, Domain, DomainConfig, Evidence, FillReport, MatchReport, OracleBrief, Outline, RawValueMap, ResponseIssue,
    Schema, TemplateDocument,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "formfill", version, about = "Template schema extraction and value finalization")]
struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    json: bool,
    #[arg(long, global = true, help = "Domain configuration (YAML or JSON); defaults to the built-in one")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract a field schema from a template document
    Schema {
        #[arg(long)]
        template: PathBuf,
        #[arg(long)]
        outline: Option<PathBuf>,
    },
    /// Finalize proposed values against a schema
    Apply {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        values: PathBuf,
        #[arg(long, help = "Evidence text the values were drawn from")]
        evidence: Option<String>,
        #[arg(long, help = "File with one selected line item per line")]
        items: Option<PathBuf>,
    },
    /// Print the sectioned brief and batches for a schema
    Brief {
        #[arg(long)]
        schema: PathBuf,
    },
    /// Check proposed values against a schema without changing them
    Validate {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        values: PathBuf,
    },
    /// Validate the domain configuration
    CheckConfig,
}

#[derive(Serialize)]
struct JsonOut<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Serialize)]
struct SchemaOut<'a> {
    fields: &'a Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<MatchReport>,
}

#[derive(Serialize)]
struct BriefOut<'a> {
    brief: &'a OracleBrief,
    batches: &'a [Batch],
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    boolean_suffix: String,
    rules: usize,
    synonyms: usize,
    outline_overrides: usize,
    field_groups: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_deref())?;
    let summary = ConfigSummary {
        version: config.version.clone(),
        boolean_suffix: config.boolean_suffix.clone(),
        rules: config.rules.len(),
        synonyms: config.synonyms.len(),
        outline_overrides: config.outline_overrides.len(),
        field_groups: config.field_groups.len(),
    };
    let domain = Domain::new(config).context("compiling domain configuration")?;

    match cli.command {
        Commands::Schema { template, outline } => {
            let document = TemplateDocument::from_file(&template)
                .with_context(|| format!("reading template {}", template.display()))?;
            let outline = match outline {
                Some(path) if path.exists() => Some(
                    Outline::from_file(&path).with_context(|| format!("reading outline {}", path.display()))?,
                ),
                Some(path) => {
                    warn!(path = %path.display(), "Outline not found; keeping extracted paths");
                    None
                }
                None => None,
            };

            let (schema, report) = domain.build_schema(&document, outline.as_ref());
            if cli.json {
                print_json(&SchemaOut {
                    fields: &schema,
                    report,
                })?;
            } else {
                for field in &schema {
                    println!("{}\t{}\t{}\t{}", field.key, field.kind, field.path(), field.label);
                }
                if let Some(r) = report {
                    println!(
                        "matched {}/{} (exact {}, normalized {}, override {}, fuzzy {}), unmatched {}",
                        r.enhanced(),
                        r.total(),
                        r.exact,
                        r.normalized,
                        r.overrides,
                        r.fuzzy,
                        r.unmatched
                    );
                }
            }
        }
        Commands::Apply {
            schema,
            values,
            evidence,
            items,
        } => {
            let schema = load_schema(&schema)?;
            let raw = load_values(&values)?;
            let evidence = match (evidence, items) {
                (None, None) => None,
                (text, items) => {
                    let mut evidence = Evidence::text(text.unwrap_or_default());
                    if let Some(path) = items {
                        evidence = evidence.with_items(load_items(&path)?);
                    }
                    Some(evidence)
                }
            };

            // Fields without indicators are skipped by the evidence check
            let schema = if evidence.is_some() {
                domain.annotate_missing(schema)
            } else {
                schema
            };
            let report = domain.finalize(&raw, &schema, evidence.as_ref());
            if cli.json {
                print_json(&report)?;
            } else {
                print_fill_report(&report);
            }
        }
        Commands::Brief { schema } => {
            let schema = load_schema(&schema)?;
            let brief = domain.brief(&schema);
            let batches = domain.batches(&schema);
            if cli.json {
                print_json(&BriefOut {
                    brief: &brief,
                    batches: &batches,
                })?;
            } else {
                print!("{}", brief.to_text());
                for batch in &batches {
                    println!("batch {}: {}", batch.name, batch.keys.join(", "));
                }
            }
        }
        Commands::Validate { schema, values } => {
            let schema = load_schema(&schema)?;
            let raw = load_values(&values)?;
            let issues = domain.validate_response(&raw, &schema);
            print_issues(cli.json, &issues)?;
            if !issues.is_empty() {
                bail!("{} issue(s) found", issues.len());
            }
        }
        Commands::CheckConfig => {
            if cli.json {
                print_json(&summary)?;
            } else {
                println!("config valid");
                println!("version: {}", summary.version);
                println!("boolean suffix: {}", summary.boolean_suffix);
                println!("rules: {}", summary.rules);
                println!("synonym terms: {}", summary.synonyms);
                println!("outline overrides: {}", summary.outline_overrides);
                println!("field groups: {}", summary.field_groups);
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DomainConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading domain configuration");
            DomainConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => DomainConfig::builtin().context("loading built-in config"),
    }
}

/// Accepts a bare field array, `{"fields": [...]}` or the `--json` output of `schema`.
fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading schema {}", path.display()))?;
    let mut doc: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing schema {}", path.display()))?;
    if let Some(data) = doc.get_mut("data").map(serde_json::Value::take) {
        doc = data;
    }
    if let Some(fields) = doc.get_mut("fields").map(serde_json::Value::take) {
        doc = fields;
    }
    if !doc.is_array() {
        bail!("schema file {} must hold a field array", path.display());
    }
    serde_json::from_value(doc).with_context(|| format!("parsing schema {}", path.display()))
}

fn load_values(path: &Path) -> anyhow::Result<RawValueMap> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading values {}", path.display()))?;
    match serde_json::from_str(&raw).with_context(|| format!("parsing values {}", path.display()))? {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("values file {} must hold a JSON object", path.display()),
    }
}

fn load_items(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading items {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn print_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&JsonOut { ok: true, data })?);
    Ok(())
}

fn print_fill_report(report: &FillReport) {
    for (key, value) in report.rendered() {
        println!("{} = {}", key, value);
    }
    for c in &report.corrections {
        let before = c.before.as_ref().map_or_else(|| "(absent)".to_string(), |v| v.to_string());
        println!("corrected {}: {} -> {} [{}]", c.key, before, c.after, c.rule);
    }
    for issue in &report.issues {
        println!("issue: {}", issue);
    }
    for a in &report.advisories {
        match &a.suggested {
            Some(s) => println!("advisory {}: {} (suggest {})", a.field, a.reason, s),
            None => println!("advisory {}: {}", a.field, a.reason),
        }
    }
    for key in &report.needs_review {
        if let Some(c) = report.confidence.get(key) {
            println!("review {}: confidence {:.2}", key, c.score);
        }
    }
}

fn print_issues(json: bool, issues: &[ResponseIssue]) -> anyhow::Result<()> {
    if json {
        print_json(&issues)?;
    } else if issues.is_empty() {
        println!("values valid");
    } else {
        for issue in issues {
            println!("{}", issue);
        }
    }
    Ok(())
}
