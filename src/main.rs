//! visalign CLI: score visual embeddings against human similarity judgments.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use visalign_rs::{
    run_rsa_eval, run_triplet_eval, save_results, two_sided_p, Distance, FeatureStore,
    JudgmentKind, RsaOptions, ScoringConfig, SimilarityJudgments, TransformSet, TripletSet,
};

#[derive(Parser)]
#[command(name = "visalign")]
#[command(about = "Evaluate alignment of visual embeddings with human similarity judgments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Odd-one-out triplet evaluation
    Triplets(TripletArgs),
    /// Representational similarity analysis against pairwise judgments
    Rsa(RsaArgs),
}

#[derive(Args)]
struct TripletArgs {
    /// JSON feature store: model/layer name -> N x D feature array
    #[arg(short, long)]
    features: PathBuf,

    /// JSON triplet file: {"triplets": [[i, j, k], ...]}, odd item last
    #[arg(short, long)]
    triplets: PathBuf,

    /// Distance function used to predict the odd one out
    #[arg(short, long, value_enum, default_value = "cosine")]
    distance: Distance,

    /// Softmax temperature for the confidence distribution
    #[arg(long, default_value_t = 1.0)]
    temperature: f64,

    /// Random seed for reproducibility of results
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output directory for results
    #[arg(short, long, default_value = "results")]
    output: PathBuf,
}

#[derive(Args)]
struct RsaArgs {
    /// JSON feature store: model name -> N x D feature array
    #[arg(short, long)]
    features: PathBuf,

    /// JSON human judgment matrix (N x N nested list)
    #[arg(short, long)]
    judgments: PathBuf,

    /// Treat the judgment matrix as dissimilarities (an RDM)
    #[arg(long)]
    dissimilarity: bool,

    /// JSON transform set; evaluate transformed instead of raw embeddings
    #[arg(long, requires = "reference")]
    transforms: Option<PathBuf>,

    /// JSON reference embedding store used to standardize before projecting
    #[arg(long, requires = "transforms")]
    reference: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long, default_value = "results")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Triplets(args) => run_triplets(&args),
        Command::Rsa(args) => run_rsa(&args, cli.verbose),
    }
}

fn run_triplets(args: &TripletArgs) -> Result<()> {
    println!("=== visalign: odd-one-out triplet evaluation ===");
    println!("Features: {}", args.features.display());
    println!("Triplets: {}", args.triplets.display());

    let store = FeatureStore::load(&args.features)?;
    let triplets = TripletSet::load(&args.triplets)?;
    info!(
        "Loaded {} feature matrices, {} triplets",
        store.len(),
        triplets.len()
    );

    let config = ScoringConfig {
        distance: args.distance,
        temperature: args.temperature,
        seed: args.seed,
    };
    let summaries = run_triplet_eval(&store, &triplets, config)?;

    println!("\n=== Results ===");
    for summary in &summaries {
        println!(
            "{:<32} accuracy {:.4}  mean entropy {:.3}",
            summary.name, summary.accuracy, summary.mean_entropy
        );
    }

    let path = save_results(&summaries, &args.output, "triplet_results.json")?;
    info!("Results saved to {}", path.display());
    Ok(())
}

fn run_rsa(args: &RsaArgs, verbose: bool) -> Result<()> {
    println!("=== visalign: representational similarity analysis ===");
    println!("Features:  {}", args.features.display());
    println!("Judgments: {}", args.judgments.display());

    let store = FeatureStore::load(&args.features)?;
    let kind = if args.dissimilarity {
        JudgmentKind::Dissimilarity
    } else {
        JudgmentKind::Similarity
    };
    let judgments = SimilarityJudgments::load(&args.judgments, kind)?;
    info!(
        "Loaded {} feature matrices, judgments over {} items",
        store.len(),
        judgments.n_items()
    );

    let transforms = args
        .transforms
        .as_ref()
        .map(TransformSet::load)
        .transpose()?;
    let reference = args.reference.as_ref().map(FeatureStore::load).transpose()?;
    let options = RsaOptions {
        transforms: transforms.as_ref(),
        reference: reference.as_ref(),
    };

    let summaries = run_rsa_eval(&store, &judgments, options)?;

    println!("\n=== Results ===");
    for summary in &summaries {
        println!(
            "{:<32} spearman (cos) {:+.4}  spearman (corr) {:+.4}  pearson (cos) {:+.4}  pearson (corr) {:+.4}",
            summary.name,
            summary.stats.spearman_rho_cosine,
            summary.stats.spearman_rho_correlation,
            summary.stats.pearson_corr_cosine,
            summary.stats.pearson_corr_correlation,
        );
        if verbose {
            println!(
                "{:<32} p (spearman corr) {:.4}  p (pearson corr) {:.4}",
                "",
                two_sided_p(summary.stats.spearman_rho_correlation, summary.n_pairs),
                two_sided_p(summary.stats.pearson_corr_correlation, summary.n_pairs),
            );
        }
    }

    let path = save_results(&summaries, &args.output, "rsa_results.json")?;
    info!("Results saved to {}", path.display());
    Ok(())
}
