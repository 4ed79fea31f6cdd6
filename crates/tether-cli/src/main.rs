//! tether: two-pass claim verification from the command line.
//!
//! Usage:
//!   tether profiles
//!   tether scrub --profile schema request.yaml
//!   tether classify --profile strawberry --scrubbed 0.3 --full 0.95
//!   tether verify request.yaml --config runtime.yaml
//!
//! Logs go to stderr; set RUST_LOG=debug for verbose output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use tether_core::{
    Claim, DeltaClassifier, PassResult, ProfileRegistry, Recommendation, Scrubber, Verdict,
    VerifyRequest,
};
use tether_runtime::RuntimeConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Check whether claims are grounded in evidence or recalled from memory.
#[derive(Parser)]
#[command(name = "tether", version, about)]
struct Cli {
    /// Extra profile definitions (YAML), merged over the built-ins
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List profiles with thresholds and trigger policy.
    Profiles,

    /// Scrub the evidence of a request file and print spans and placeholder map.
    Scrub {
        /// Profile whose scrub rules apply
        #[arg(long)]
        profile: String,

        /// Request file (YAML or JSON)
        file: PathBuf,
    },

    /// Classify one pair of pass confidences.
    Classify {
        #[arg(long)]
        profile: String,

        /// Confidence of the scrubbed pass
        #[arg(long)]
        scrubbed: f64,

        /// Confidence of the full pass
        #[arg(long)]
        full: f64,

        #[arg(long, default_value = "ENTAILED", value_parser = parse_verdict)]
        scrubbed_verdict: Verdict,

        #[arg(long, default_value = "ENTAILED", value_parser = parse_verdict)]
        full_verdict: Verdict,
    },

    /// Run a full two-pass verification against the Anthropic API.
    Verify {
        /// Request file (YAML or JSON)
        file: PathBuf,

        /// Runtime configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn parse_verdict(s: &str) -> Result<Verdict, String> {
    Verdict::parse(s).ok_or_else(|| format!("unknown verdict '{}'", s))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let registry = load_registry(cli.profiles.as_deref())?;

    match cli.command {
        Command::Profiles => list_profiles(&registry),
        Command::Scrub { profile, file } => scrub(&registry, &profile, &file),
        Command::Classify {
            profile,
            scrubbed,
            full,
            scrubbed_verdict,
            full_verdict,
        } => classify(
            &registry,
            &profile,
            (scrubbed_verdict, scrubbed),
            (full_verdict, full),
        ),
        Command::Verify { file, config } => verify(registry, &file, config.as_deref()).await,
    }
}

fn load_registry(path: Option<&Path>) -> Result<ProfileRegistry> {
    match path {
        Some(path) => ProfileRegistry::from_yaml_file(path)
            .with_context(|| format!("loading profiles from {}", path.display())),
        None => Ok(ProfileRegistry::builtin().clone()),
    }
}

fn load_request(path: &Path) -> Result<VerifyRequest> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    // YAML parser also accepts JSON
    VerifyRequest::from_yaml(&contents).with_context(|| format!("parsing {}", path.display()))
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn list_profiles(registry: &ProfileRegistry) -> Result<ExitCode> {
    for profile in registry.iter() {
        let t = &profile.thresholds;
        println!("{}  ({})", profile.name, profile.description);
        println!(
            "  verified: conf >= {:.2}, delta >= {:.2}   plausible: conf >= {:.2}, delta >= {:.2}",
            t.verified_confidence, t.verified_delta, t.plausible_confidence, t.plausible_delta
        );
        let rules: Vec<&str> = profile.rules.iter().map(|c| c.label()).collect();
        println!("  trigger: {}   rules: {}", profile.trigger, rules.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

fn scrub(registry: &ProfileRegistry, profile: &str, file: &Path) -> Result<ExitCode> {
    let profile = registry.resolve(profile)?;
    let request = load_request(file)?;

    let outcome = Scrubber::new(profile).scrub(&request.evidence);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(ExitCode::SUCCESS)
}

fn classify(
    registry: &ProfileRegistry,
    profile: &str,
    (scrubbed_verdict, scrubbed): (Verdict, f64),
    (full_verdict, full): (Verdict, f64),
) -> Result<ExitCode> {
    let profile = registry.resolve(profile)?;
    let scrubbed = PassResult::new(scrubbed_verdict, scrubbed, "")?;
    let full = PassResult::new(full_verdict, full, "")?;

    let result =
        DeltaClassifier::new(profile.thresholds).classify(Claim::new("(cli)"), scrubbed, full);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "profile": profile.name,
            "status": result.status,
            "reason": result.reason,
            "delta": result.delta,
        }))?
    );
    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "anthropic")]
async fn verify(registry: ProfileRegistry, file: &Path, config: Option<&Path>) -> Result<ExitCode> {
    use std::sync::Arc;
    use tether_runtime::{AnthropicProvider, BudgetTracker, LlmOracle, TwoPassOrchestrator};

    let request = load_request(file)?;
    let config = match config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    config.validate()?;

    let provider =
        AnthropicProvider::from_settings(&config.provider).context("configuring Anthropic provider")?;
    let budget = Arc::new(BudgetTracker::new(config.token_budget));
    let oracle = LlmOracle::new(Arc::new(provider), config.completion.clone(), budget.clone());

    let orchestrator = TwoPassOrchestrator::with_registry(Arc::new(oracle), config, registry);
    let cancel = async {
        // A failed signal handler leaves the run uncancellable
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let report = orchestrator.verify_with_cancel(&request, cancel).await?;

    let usage = budget.get_usage();
    tracing::info!(
        calls = usage.llm_calls,
        tokens = usage.total_tokens,
        "Oracle usage"
    );

    println!("{}", serde_json::to_string_pretty(&report.to_wire())?);
    Ok(exit_code(report.recommendation))
}

#[cfg(not(feature = "anthropic"))]
async fn verify(_registry: ProfileRegistry, file: &Path, config: Option<&Path>) -> Result<ExitCode> {
    // Still validate inputs so mistakes surface before the feature hint
    load_request(file)?.validate()?;
    if let Some(path) = config {
        RuntimeConfig::from_yaml_file(path)?.validate()?;
    }
    anyhow::bail!("`verify` needs an oracle; rebuild with `--features anthropic`")
}

#[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
fn exit_code(recommendation: Recommendation) -> ExitCode {
    match recommendation {
        Recommendation::Proceed | Recommendation::ProceedWithWarnings => ExitCode::SUCCESS,
        Recommendation::Stop | Recommendation::GatherMoreEvidence => ExitCode::from(2),
    }
}
