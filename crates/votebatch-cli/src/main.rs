//! votebatch CLI
//!
//! Setup parameters, relation inspection, an end-to-end demo round and
//! offline verification of proof bundles.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::{fs, path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;
use votebatch_aggregator::{Collector, Pipeline};
use votebatch_authority::Authority;
use votebatch_circuit::{
    field::fp_to_hex, relation::RelationStats, BatchRelation, Credential, KeyManager, ProofEngine,
    RelationParams, SetupParams, VerificationKey, WitnessBuilder,
};
use votebatch_ledger::{CredentialRegistry, NullifierSet};
use votebatch_runtime::{ManualClock, PollConfig, ProofBundle};

#[derive(Parser)]
#[command(name = "votebatch")]
#[command(about = "Zero-knowledge vote batches on halo2", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write deterministic setup parameters of size 2^k
    Setup {
        /// Circuit parameter k (rows = 2^k)
        #[arg(short, long)]
        k: u32,

        /// Output file for the parameters
        #[arg(short, long, default_value = "votebatch.params")]
        output: PathBuf,
    },

    /// Lint the batch relation for under-constrained signals
    Lint {
        #[command(flatten)]
        poll: PollArgs,
    },

    /// Show the batch relation's size and the smallest usable k
    Info {
        #[command(flatten)]
        poll: PollArgs,
    },

    /// Run a full round: register voters, collect, prove, submit, finalize
    Demo {
        #[command(flatten)]
        poll: PollArgs,

        /// Vote options, one per voter
        #[arg(long, value_delimiter = ',', default_value = "0,1,0")]
        votes: Vec<u64>,

        /// Setup parameters file (deterministic parameters when omitted)
        #[arg(long)]
        params: Option<PathBuf>,

        /// Directory to write each batch's bundle and claim into
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Directory for key metadata
        #[arg(long)]
        keys_dir: Option<PathBuf>,
    },

    /// Verify a proof bundle against setup parameters
    Verify {
        #[command(flatten)]
        poll: PollArgs,

        /// Setup parameters file
        #[arg(long)]
        params: PathBuf,

        /// Bundle produced by `demo --out-dir`
        #[arg(short, long)]
        bundle: PathBuf,

        /// Directory for key metadata
        #[arg(long)]
        keys_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
struct PollArgs {
    /// Poll configuration JSON; takes precedence over the flags below
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "1")]
    poll_id: u64,

    /// Number of vote options
    #[arg(long, default_value = "2")]
    options: usize,

    /// Vote slots per batch
    #[arg(long, default_value = "4")]
    capacity: usize,

    /// Credential tree depth
    #[arg(long, default_value = "8")]
    depth: usize,
}

impl PollArgs {
    fn load(&self) -> Result<PollConfig> {
        if let Some(path) = &self.config {
            return PollConfig::load(path)
                .with_context(|| format!("Failed to load poll config: {:?}", path));
        }
        let config = PollConfig::new(self.poll_id, self.options)
            .with_batch_capacity(self.capacity)
            .with_tree_depth(self.depth);
        config.validate().context("Invalid poll parameters")?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct InfoReport {
    relation: RelationStats,
    setup_rows: u64,
}

fn build_relation(config: &PollConfig) -> Result<Arc<BatchRelation>> {
    BatchRelation::build(RelationParams::from_config(config)).context("Failed to build the batch relation")
}

fn key_manager(keys_dir: Option<PathBuf>) -> Result<KeyManager> {
    match keys_dir {
        Some(dir) => KeyManager::new(&dir)
            .with_context(|| format!("Failed to open key metadata directory: {:?}", dir)),
        None => Ok(KeyManager::in_memory()),
    }
}

fn load_setup(path: Option<&PathBuf>, relation: &BatchRelation) -> Result<SetupParams> {
    match path {
        Some(path) => SetupParams::read_from_file(path)
            .with_context(|| format!("Failed to read setup parameters: {:?}", path)),
        None => {
            let k = relation.relation().min_k();
            println!("🔧 No parameters given, using deterministic setup with k={}", k);
            Ok(SetupParams::deterministic(k)?)
        }
    }
}

fn run_setup(k: u32, output: PathBuf) -> Result<()> {
    println!("🔧 Generating setup parameters with k={}...", k);
    let setup = SetupParams::deterministic(k)?;
    setup
        .write_to_file(&output)
        .with_context(|| format!("Failed to write parameters to {:?}", output))?;
    println!("✅ Parameters written to {:?}", output);
    println!("   Fingerprint: {}", setup.fingerprint_hex());
    Ok(())
}

fn run_lint(config: &PollConfig) -> Result<()> {
    let relation = build_relation(config)?;
    let report = relation.relation().lint();
    println!("📋 Relation: {}", relation.relation().name());
    println!("   Lint: {}", report);
    if !report.is_clean() {
        anyhow::bail!("Relation has {} lint issue(s)", report.issues.len());
    }
    Ok(())
}

fn run_info(config: &PollConfig) -> Result<()> {
    let relation = build_relation(config)?;
    let stats = relation.relation().stats();
    let report = InfoReport { setup_rows: 1u64 << stats.min_k, relation: stats };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_demo(
    config: PollConfig,
    votes: Vec<u64>,
    params: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    keys_dir: Option<PathBuf>,
) -> Result<()> {
    let relation = build_relation(&config)?;
    let setup = Arc::new(load_setup(params.as_ref(), &relation)?);

    println!("🔑 Generating keys for {}...", relation.relation().name());
    let (pk, vk) = key_manager(keys_dir)?.keygen(setup, relation.clone())?;

    let credentials: Vec<Credential> = (0..votes.len())
        .map(|i| Credential::from_seed(format!("demo-voter-{}", i).as_bytes()))
        .collect();
    let mut registry = CredentialRegistry::in_memory(config.tree_depth);
    for credential in &credentials {
        registry.register(credential.commitment()).context("Failed to register voter")?;
    }
    let registry = registry.into_shared();

    let clock = Arc::new(ManualClock::new(0));
    let mut collector = Collector::new(config.clone(), clock.clone())?;
    for (credential, option) in credentials.iter().zip(&votes) {
        collector.submit(credential.cast_vote(config.poll_id, *option))?;
    }
    collector.seal()?;
    let batches = collector.take_sealed();
    println!("🗳️  Collected {} vote(s) into {} batch(es)", votes.len(), batches.len());

    let pipeline =
        Pipeline::new(config.clone(), registry.clone(), WitnessBuilder::new(relation)?, Arc::new(pk))?;
    let authority =
        Authority::new(config.clone(), Arc::new(vk), registry, NullifierSet::in_memory(), clock.clone())?;

    if let Some(dir) = &out_dir {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }

    println!("📊 Proving...");
    for (mut batch, result) in pipeline.process_all(batches) {
        let submission = result.with_context(|| format!("{} could not be proved", batch.id()))?;
        let verdict = authority.submit(
            submission.batch_id,
            submission.bundle.public_signals(),
            submission.bundle.proof_bytes(),
            submission.claim.clone(),
        );
        batch.settle(&verdict)?;
        let acceptance = verdict?;
        println!(
            "   {} accepted: {} bytes, merkle_root {}",
            acceptance.batch_id,
            submission.bundle.proof_size(),
            fp_to_hex(&acceptance.public_signals.merkle_root)
        );

        if let Some(dir) = &out_dir {
            let bundle_path = dir.join(format!("{}.bundle", submission.batch_id));
            fs::write(&bundle_path, submission.bundle.to_bytes()?)
                .with_context(|| format!("Failed to write {:?}", bundle_path))?;
            let claim_path = dir.join(format!("{}.claim.json", submission.batch_id));
            fs::write(&claim_path, serde_json::to_string_pretty(&submission.claim)?)
                .with_context(|| format!("Failed to write {:?}", claim_path))?;
        }
    }

    clock.advance(config.dispute_window_secs);
    let finalized = authority.finalize_due()?;
    info!(batches = finalized.len(), "dispute windows closed");
    println!("✅ Finalized {} batch(es)", finalized.len());
    println!("   Tally: {:?}", authority.tally());
    Ok(())
}

fn run_verify(
    config: &PollConfig,
    params: PathBuf,
    bundle: PathBuf,
    keys_dir: Option<PathBuf>,
) -> Result<()> {
    println!("🔧 Loading bundle and parameters...");
    let bytes = fs::read(&bundle).with_context(|| format!("Failed to read bundle: {:?}", bundle))?;
    let bundle = ProofBundle::from_bytes(&bytes).context("Failed to decode bundle")?;

    let relation = build_relation(config)?;
    let setup = Arc::new(load_setup(Some(&params), &relation)?);
    println!("🔑 Regenerating verification key with k={}...", setup.k());
    let (_, vk): (_, VerificationKey) = key_manager(keys_dir)?.keygen(setup, relation)?;

    println!("🔍 Verifying proof...");
    if ProofEngine::verify_bundle(&vk, &bundle) {
        println!("✅ Proof is VALID!");
        Ok(())
    } else {
        println!("❌ Proof is INVALID!");
        anyhow::bail!("Proof verification failed")
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Setup { k, output } => run_setup(k, output),
        Commands::Lint { poll } => run_lint(&poll.load()?),
        Commands::Info { poll } => run_info(&poll.load()?),
        Commands::Demo { poll, votes, params, out_dir, keys_dir } => {
            run_demo(poll.load()?, votes, params, out_dir, keys_dir)
        }
        Commands::Verify { poll, params, bundle, keys_dir } => {
            run_verify(&poll.load()?, params, bundle, keys_dir)
        }
    }
}
