//! `tcf` - analyze, simulate, and batch-create token configurations
//!
//! Runs the forge against an in-memory store and the simulated chain.
//! Logging goes to stderr and follows `RUST_LOG`; `--log-json` switches to
//! JSON lines.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tcf_core::{
    AuditSink, DeployOptions, DeployRequest, DeploymentOrchestrator, ForgeSettings,
    MemoryAuditLog, TokenService,
};
use tcf_deploy::{
    ComplexityAnalyzer, DeploymentPayload, DeploymentStrategy, SimulatedChainDeployer,
    StrategySelector,
};
use tcf_model::{ProjectId, SystemClock, TokenConfig, TokenId, UserId};
use tcf_store::InMemoryStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_WALLET: &str = "0x0000000000000000000000000000000000000001";

fn settings_arg() -> Arg {
    Arg::new("settings")
        .long("settings")
        .value_parser(value_parser!(PathBuf))
        .help("Path to forge.toml (defaults apply when omitted)")
}

fn strategy_arg() -> Arg {
    Arg::new("strategy")
        .long("strategy")
        .default_value("auto")
        .value_parser(value_parser!(DeploymentStrategy))
        .help("auto, basic, enhanced, chunked, or legacy")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn cli() -> Command {
    Command::new("tcf")
        .version(tcf_core::VERSION)
        .about("Token Configuration Forge")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Score a configuration and show the strategy it would get")
                .arg(Arg::new("config").required(true).value_parser(value_parser!(PathBuf)))
                .arg(settings_arg())
                .arg(strategy_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("simulate")
                .about("Create and deploy a configuration on the simulated chain")
                .arg(Arg::new("config").required(true).value_parser(value_parser!(PathBuf)))
                .arg(settings_arg())
                .arg(strategy_arg())
                .arg(
                    Arg::new("wallet")
                        .long("wallet")
                        .default_value(DEFAULT_WALLET)
                        .help("Deploying wallet address"),
                )
                .arg(
                    Arg::new("network")
                        .long("network")
                        .help("Target network (settings default when omitted)"),
                )
                .arg(
                    Arg::new("gas-ceiling")
                        .long("gas-ceiling")
                        .value_parser(value_parser!(u64))
                        .help("Per-transaction gas ceiling of the simulated chain"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("batch")
                .about("Create every configuration in a JSON array, optionally deploying each")
                .arg(Arg::new("configs").required(true).value_parser(value_parser!(PathBuf)))
                .arg(settings_arg())
                .arg(
                    Arg::new("deploy")
                        .long("deploy")
                        .action(ArgAction::SetTrue)
                        .help("Deploy each created token"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("check-settings")
                .about("Validate a settings file")
                .arg(Arg::new("path").required(true).value_parser(value_parser!(PathBuf))),
        )
}

fn init_logging(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr.json())
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(stderr).init();
    }
}

fn load_settings(args: &ArgMatches) -> Result<ForgeSettings> {
    match args.get_one::<PathBuf>("settings") {
        Some(path) => ForgeSettings::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(ForgeSettings::default()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

struct Session {
    service: TokenService,
    orchestrator: DeploymentOrchestrator,
    audit: Arc<MemoryAuditLog>,
    project: ProjectId,
    user: UserId,
}

impl Session {
    fn new(settings: ForgeSettings, chain: SimulatedChainDeployer) -> Self {
        let clock = Arc::new(SystemClock);
        let store = Arc::new(InMemoryStore::with_platform_schema());
        let audit = Arc::new(MemoryAuditLog::new());
        let service = TokenService::new(store, clock.clone(), Arc::new(settings));
        let sink: Arc<dyn AuditSink> = audit.clone();
        let orchestrator = DeploymentOrchestrator::new(service.clone(), Arc::new(chain), sink, clock);
        Self {
            service,
            orchestrator,
            audit,
            project: ProjectId::new(),
            user: UserId::new(),
        }
    }

    fn request(&self, token_id: TokenId, options: DeployOptions) -> DeployRequest {
        DeployRequest {
            token_id,
            user: self.user,
            project: self.project,
            options,
        }
    }
}

fn analyze(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(args)?;
    let config: TokenConfig = read_json(args.get_one::<PathBuf>("config").context("config path")?)?;
    let strategy = args
        .get_one::<DeploymentStrategy>("strategy")
        .copied()
        .unwrap_or_default();

    let payload = DeploymentPayload::from_config(
        TokenId::new(),
        &config,
        settings.deployment.default_network.clone(),
    );
    let score = ComplexityAnalyzer::new(settings.complexity.clone()).analyze_payload(&payload);
    let selection = StrategySelector::new(settings.deployment.selector()).select(&score, strategy);

    if args.get_flag("json") {
        return print_json(&json!({
            "standard": config.standard(),
            "complexity": score,
            "selection": selection,
        }));
    }

    println!("{} ({}) - {}", config.name, config.symbol, config.standard());
    println!("  Level:          {}", score.level);
    println!("  Score:          {}", score.score);
    println!("  Features:       {} ({} heavy)", score.feature_count, score.heavy_feature_count);
    println!("  Child records:  {}", score.record_count);
    println!("  Base cost:      {}", score.base_cost);
    println!("  Estimated cost: {}", score.estimated_cost);
    println!("  Transactions:   {}", score.chunk_plan.len());
    println!("  Strategy:       {} ({:?})", selection.strategy, selection.reason);
    for reason in &score.reasons {
        println!("  - {reason}");
    }
    Ok(())
}

async fn simulate(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(args)?;
    let config: TokenConfig = read_json(args.get_one::<PathBuf>("config").context("config path")?)?;
    let chain = args
        .get_one::<u64>("gas-ceiling")
        .map_or_else(SimulatedChainDeployer::default, |c| SimulatedChainDeployer::with_gas_ceiling(*c));
    let session = Session::new(settings, chain);

    let write = session.service.create_token(session.project, config).await?;
    let write = write.ensure_complete()?;
    let token_id = write.token.id;

    let mut options = DeployOptions::new(
        args.get_one::<String>("wallet")
            .map_or(DEFAULT_WALLET, String::as_str),
    )
    .with_strategy(
        args.get_one::<DeploymentStrategy>("strategy")
            .copied()
            .unwrap_or_default(),
    );
    if let Some(network) = args.get_one::<String>("network") {
        options = options.with_network(network.clone());
    }

    let deployed = session
        .orchestrator
        .deploy_token(session.request(token_id, options))
        .await;
    let integrity = session.audit.verify_integrity();

    let report = match deployed {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(%token_id, error = %e, "simulated deployment failed");
            if args.get_flag("json") {
                print_json(&json!({
                    "token_id": token_id,
                    "error": e.to_string(),
                    "retryable": e.is_retryable(),
                    "audit": session.audit.events(),
                }))?;
            }
            bail!("deployment failed: {e}");
        }
    };

    if args.get_flag("json") {
        return print_json(&json!({
            "report": report,
            "audit": session.audit.events(),
            "audit_intact": integrity.is_ok(),
        }));
    }

    println!("Deployed {} ({})", report.token.name, token_id);
    println!("  Strategy: {} ({:?})", report.outcome.strategy, report.selection.reason);
    if let Some(from) = report.outcome.fallback_from {
        println!("  Fallback: {from} failed first");
    }
    println!("  Address:  {}", report.outcome.address);
    println!("  Tx hash:  {}", report.outcome.tx_hash);
    println!("  Gas used: {}", report.outcome.gas_used);
    for chunk in &report.outcome.chunk_receipts {
        println!("  Chunk {}: {} records, {} gas", chunk.index, chunk.records, chunk.gas_used);
    }
    println!(
        "  Audit:    {} events, chain {}",
        session.audit.len(),
        if integrity.is_ok() { "intact" } else { "BROKEN" }
    );
    Ok(())
}

async fn batch(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(args)?;
    let configs: Vec<TokenConfig> = read_json(args.get_one::<PathBuf>("configs").context("configs path")?)?;
    let session = Session::new(settings, SimulatedChainDeployer::default());

    let created = session.service.create_tokens(session.project, configs).await;
    let mut deployments = Vec::new();
    if args.get_flag("deploy") {
        for write in created.successes() {
            let outcome = session
                .orchestrator
                .deploy_token(session.request(write.token.id, DeployOptions::new(DEFAULT_WALLET)))
                .await;
            deployments.push(match outcome {
                Ok(report) => json!({
                    "token_id": write.token.id,
                    "strategy": report.outcome.strategy,
                    "address": report.outcome.address,
                }),
                Err(e) => json!({
                    "token_id": write.token.id,
                    "error": e.to_string(),
                    "retryable": e.is_retryable(),
                }),
            });
        }
    }

    if args.get_flag("json") {
        return print_json(&json!({
            "created": created,
            "deployments": deployments,
        }));
    }

    println!(
        "Created {}/{} tokens{}",
        created.succeeded,
        created.len(),
        if created.rejected { " (rejected by pre-flight validation)" } else { "" }
    );
    for error in &created.errors {
        println!("  [{}] {}", error.index, error.message);
    }
    for deployment in &deployments {
        println!("  {deployment}");
    }
    if created.success {
        Ok(())
    } else {
        bail!("{} of {} items failed", created.failed, created.len())
    }
}

fn check_settings(args: &ArgMatches) -> Result<()> {
    let path = args.get_one::<PathBuf>("path").context("settings path")?;
    let settings = ForgeSettings::load(path).with_context(|| format!("loading {}", path.display()))?;
    println!("{} is valid", path.display());
    println!(
        "  Standards: {}",
        settings
            .deployment
            .supported_standards
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  Limits:    {}/hour, {}/day{}",
        settings.rate_limits.per_hour,
        settings.rate_limits.per_day,
        if settings.rate_limits.enabled { "" } else { " (disabled)" }
    );
    println!("  Ceiling:   {}", settings.complexity.transaction_ceiling);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("analyze", args)) => analyze(args),
        Some(("simulate", args)) => simulate(args).await,
        Some(("batch", args)) => batch(args).await,
        Some(("check-settings", args)) => check_settings(args),
        _ => unreachable!("subcommand_required is set"),
    }
}
