use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;

use strand_codec::Opaque;
use strand_graph::{encode_loader, Finding, GraphBuilder};
use strand_ident::LinkHasher;
use strand_router::{Route, Router};
use strand_source::{FixtureTransport, RequestCache, SessionTransport, Transport};
use strand_types::Base;

use crate::cli::*;
use crate::config::CliConfig;
use crate::outline::{continuations, outline, print, OutlineLine};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(fixtures) = cli.fixtures {
        config.fixtures = fixtures;
    }
    match cli.command {
        Command::Load(args) => cmd_load(config, args, cli.format).await,
        Command::Expand(args) => cmd_expand(&config, args, cli.format).await,
        Command::Route(args) => cmd_route(&config, args, cli.format),
        Command::Token(args) => cmd_token(args, cli.format),
    }
}

fn builder(config: &CliConfig) -> GraphBuilder<SessionTransport<FixtureTransport>> {
    let mut transport = SessionTransport::new(
        FixtureTransport::new(config.fixtures.clone()),
        Arc::new(RequestCache::new()),
    );
    if let Some(timeout) = config.timeout() {
        transport = transport.with_timeout(timeout);
    }
    GraphBuilder::new(transport)
        .with_router(Arc::new(config.router()))
        .with_config(config.graph.clone())
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// load
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct LoadReport {
    pub path: String,
    pub pivot: String,
    pub route: Option<Route>,
    pub entries: usize,
    pub errors: usize,
    pub lines: Vec<OutlineLine>,
    pub followed: Vec<FollowReport>,
    pub dangling: Vec<String>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Serialize)]
pub struct FollowReport {
    pub loader: String,
    /// Entries the fragment added to the page.
    pub added: usize,
    pub lines: Vec<OutlineLine>,
}

/// Load `path`, then execute up to `follow` of its continuations and merge
/// them into the page.
pub async fn load_report<T: Transport>(
    builder: &GraphBuilder<T>,
    path: &str,
    follow: usize,
    depth: usize,
) -> anyhow::Result<LoadReport> {
    let graph = builder.load_page(path).await;
    let lines = outline(&graph.store, graph.pivot, depth);
    let mut findings = graph.findings();

    let mut followed = Vec::new();
    for loader in continuations(&graph.store, graph.pivot).into_iter().take(follow) {
        let fragment = builder.execute_loader(&loader).await;
        let added = fragment
            .merge_into(&graph.store)
            .with_context(|| format!("merging {} fragment", loader.kind()))?;
        findings.extend(fragment.findings());
        followed.push(FollowReport {
            loader: loader.kind().to_string(),
            added,
            lines: fragment
                .items
                .iter()
                .flat_map(|item| outline(&fragment.store, *item, depth))
                .collect(),
        });
    }

    let (entries, errors) = graph.store.counts();
    Ok(LoadReport {
        path: path.to_string(),
        pivot: graph.pivot.to_hex(),
        route: graph.route.clone(),
        entries: entries + errors,
        errors,
        lines,
        followed,
        dangling: graph.dangling().iter().map(|t| t.to_hex()).collect(),
        findings,
    })
}

async fn cmd_load(
    mut config: CliConfig,
    args: LoadArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if args.validate {
        config.graph.validate = true;
    }
    let builder = builder(&config);
    let report = load_report(&builder, &args.path, args.follow, args.depth).await?;
    if format == OutputFormat::Json {
        return print_json(&report);
    }

    print(&report.lines);
    for follow in &report.followed {
        println!(
            "\n{} {} (+{} entries)",
            "followed".bold(),
            follow.loader.cyan(),
            follow.added
        );
        print(&follow.lines);
    }
    println!(
        "\n{} entries, {} errors, pivot {}",
        report.entries.to_string().bold(),
        report.errors,
        report.pivot[..16].dimmed()
    );
    if !report.dangling.is_empty() {
        println!("{} {} dangling references", "!".yellow().bold(), report.dangling.len());
    }
    for finding in &report.findings {
        println!(
            "{} {} {} ({})",
            "✗".red().bold(),
            finding.token.short_hex(),
            finding.url,
            finding.reason
        );
    }
    if config.graph.validate && report.findings.is_empty() {
        println!("{} Every URL routes back to its node", "✓".green().bold());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// expand
// ---------------------------------------------------------------------------

async fn cmd_expand(
    config: &CliConfig,
    args: ExpandArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let builder = builder(config);
    let fragment = builder.execute_opaque(&Opaque::from(args.opaque)).await;
    let lines: Vec<OutlineLine> = fragment
        .items
        .iter()
        .flat_map(|item| outline(&fragment.store, *item, args.depth))
        .collect();
    let residual = fragment
        .residual
        .as_ref()
        .map(encode_loader)
        .transpose()?
        .map(|opaque| opaque.to_string());

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "lines": lines,
            "residual": residual,
            "dangling": fragment.dangling().iter().map(|t| t.to_hex()).collect::<Vec<_>>(),
            "findings": fragment.findings(),
        }));
    }
    print(&lines);
    if let Some(residual) = residual {
        println!("\n{} {}", "residual:".bold(), residual);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// route / token
// ---------------------------------------------------------------------------

fn cmd_route(config: &CliConfig, args: RouteArgs, format: OutputFormat) -> anyhow::Result<()> {
    let route = config
        .router()
        .parse(&args.path)
        .with_context(|| format!("routing {}", args.path))?;
    let token = route.identity.to_base().map(|base| LinkHasher::of(&base).to_hex());

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "route": route, "token": token }));
    }
    println!("{} {}", "identity:".bold(), route.identity.kind().cyan());
    println!("{} {}", "canonical:".bold(), route.canonical_path);
    println!("{} {}", "detail:".bold(), serde_json::to_string(&route.identity)?);
    match token {
        Some(token) => println!("{} {}", "token:".bold(), token.yellow()),
        None => println!("{} {}", "token:".bold(), "(not an entity)".dimmed()),
    }
    Ok(())
}

fn cmd_token(args: TokenArgs, format: OutputFormat) -> anyhow::Result<()> {
    let base: Base = serde_json::from_str(&args.base).context("parsing base")?;
    let token = LinkHasher::of(&base);
    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "tag": base.tag(), "token": token.to_hex() }));
    }
    println!("{} {}", base.tag().cyan(), token.to_hex().yellow());
    Ok(())
}
