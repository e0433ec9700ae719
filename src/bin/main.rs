//! svmkit Command Line Interface
//!
//! Train SVM models from LibSVM format data, predict with saved models and
//! inspect model files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use svmkit::api::EvaluationMetrics;
use svmkit::core::{KernelType, Parameters, Result, SVMError, SvmType};
use svmkit::optimizer::{class_distribution, train};
use svmkit::persistence::SerializableModel;
use svmkit::{Dataset, LibSVMDataset, Model};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "svmkit")]
#[command(about = "Train and apply Support Vector Machines on sparse data")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new SVM model
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (LibSVM format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    /// SVM formulation
    #[arg(short = 's', long, default_value = "c-svc")]
    svm_type: CliSvmType,

    /// Kernel function
    #[arg(short = 't', long, default_value = "linear")]
    kernel: CliKernel,

    /// Cost parameter C of C-SVC, epsilon-SVR and nu-SVR
    #[arg(short = 'C', long, default_value = "1.0")]
    c: f64,

    /// Kernel gamma (0 means 1 / number of features)
    #[arg(short, long, default_value = "0")]
    gamma: f64,

    /// Degree of the polynomial kernel
    #[arg(short, long, default_value = "3")]
    degree: i32,

    /// coef0 of the polynomial and sigmoid kernels
    #[arg(short = 'r', long, default_value = "0")]
    coef0: f64,

    /// nu of nu-SVC, one-class SVM and nu-SVR
    #[arg(short, long, default_value = "0.5")]
    nu: f64,

    /// Width of the epsilon-insensitive tube of epsilon-SVR
    #[arg(short, default_value = "0.1")]
    p: f64,

    /// Stopping tolerance
    #[arg(short, long, default_value = "0.001")]
    epsilon: f64,

    /// Kernel cache size in MB
    #[arg(short = 'm', long, default_value = "100")]
    cache_size: f64,

    /// Disable the shrinking heuristic
    #[arg(long)]
    no_shrinking: bool,

    /// Train a probability model
    #[arg(short = 'b', long)]
    probability: bool,

    /// Scale C of a class, as label:weight (repeatable)
    #[arg(short = 'w', long = "weight", value_parser = parse_weight, allow_hyphen_values = true)]
    weights: Vec<(i32, f64)>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliSvmType {
    #[value(name = "c-svc")]
    CSvc,
    #[value(name = "nu-svc")]
    NuSvc,
    #[value(name = "one-class")]
    OneClass,
    #[value(name = "epsilon-svr")]
    EpsilonSvr,
    #[value(name = "nu-svr")]
    NuSvr,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernel {
    Linear,
    #[value(alias = "poly")]
    Polynomial,
    Rbf,
    Sigmoid,
}

impl From<CliSvmType> for SvmType {
    fn from(cli_type: CliSvmType) -> Self {
        match cli_type {
            CliSvmType::CSvc => SvmType::CSvc,
            CliSvmType::NuSvc => SvmType::NuSvc,
            CliSvmType::OneClass => SvmType::OneClass,
            CliSvmType::EpsilonSvr => SvmType::EpsilonSvr,
            CliSvmType::NuSvr => SvmType::NuSvr,
        }
    }
}

impl From<CliKernel> for KernelType {
    fn from(cli_kernel: CliKernel) -> Self {
        match cli_kernel {
            CliKernel::Linear => KernelType::Linear,
            CliKernel::Polynomial => KernelType::Polynomial,
            CliKernel::Rbf => KernelType::Rbf,
            CliKernel::Sigmoid => KernelType::Sigmoid,
        }
    }
}

fn parse_weight(s: &str) -> std::result::Result<(i32, f64), String> {
    let (label, weight) = s
        .split_once(':')
        .ok_or_else(|| format!("expected label:weight, got '{s}'"))?;
    let label = label
        .parse::<i32>()
        .map_err(|e| format!("invalid label '{label}': {e}"))?;
    let weight = weight
        .parse::<f64>()
        .map_err(|e| format!("invalid weight '{weight}': {e}"))?;
    Ok((label, weight))
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file (LibSVM format)
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output class probabilities
    #[arg(short = 'b', long)]
    probability: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn build_parameters(args: &TrainArgs) -> Parameters {
    let mut params = Parameters::new()
        .with_svm_type(args.svm_type.into())
        .with_kernel(args.kernel.into())
        .with_c(args.c)
        .with_gamma(args.gamma)
        .with_degree(args.degree)
        .with_coef0(args.coef0)
        .with_nu(args.nu)
        .with_p(args.p)
        .with_epsilon(args.epsilon)
        .with_cache_size(args.cache_size)
        .with_shrinking(!args.no_shrinking)
        .with_probability(args.probability);
    for &(label, weight) in &args.weights {
        params = params.with_weight(label, weight);
    }
    params
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training SVM model...");
    info!("Data file: {:?}", args.data);

    let dataset = LibSVMDataset::from_file(&args.data)?;
    info!(
        "Loaded {} samples with {} dimensions",
        dataset.len(),
        dataset.dim()
    );

    let params = build_parameters(&args);
    info!(
        "Parameters: type={}, kernel={}, C={}, gamma={}, nu={}, eps={}",
        params.svm_type, params.kernel_type, params.c, params.gamma, params.nu, params.eps
    );
    if params.svm_type.is_classification() {
        let mut counts: Vec<_> = class_distribution(dataset.problem()).into_iter().collect();
        counts.sort_unstable();
        for (label, count) in counts {
            info!("  class {label}: {count} samples");
        }
    }

    let model = train(dataset.problem(), &params)?;
    info!("Training completed successfully");
    info!("Support vectors: {}", model.n_support_vectors());

    model.save(&args.output)?;
    info!("Model saved to: {:?}", args.output);

    let predictions: Vec<f64> = dataset
        .problem()
        .iter()
        .map(|(x, _)| model.predict(x))
        .collect();
    let metrics = EvaluationMetrics::from_predictions(&predictions, dataset.labels());
    if params.svm_type.is_regression() {
        info!("Training MSE: {:.6}", metrics.mean_squared_error());
    } else {
        info!("Training accuracy: {:.2}%", metrics.accuracy() * 100.0);
    }

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = Model::load(&args.model)?;

    if args.probability && !model.has_probability_model() {
        return Err(SVMError::UnsupportedOperation(
            "model does not support probability estimates".to_string(),
        ));
    }

    info!("Loading prediction data from: {:?}", args.data);
    let dataset = LibSVMDataset::from_file(&args.data)?;
    info!(
        "Making predictions using model with {} support vectors",
        model.n_support_vectors()
    );

    match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(SVMError::IoError)?;
            let mut writer = BufWriter::new(file);
            write_predictions(&mut writer, &model, &dataset, args.probability)?;
            writer.flush().map_err(SVMError::IoError)?;
            info!("Predictions saved to: {path:?}");
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_predictions(&mut writer, &model, &dataset, args.probability)?;
        }
    }

    Ok(())
}

fn write_predictions<W: Write>(
    writer: &mut W,
    model: &Model,
    dataset: &LibSVMDataset,
    probability: bool,
) -> Result<()> {
    // Regression models report sigma instead of per-class probabilities
    let class_probabilities = probability && !model.svm_type().is_regression();

    if class_probabilities {
        let labels: Vec<String> = if model.svm_type() == SvmType::OneClass {
            vec!["1".to_string(), "-1".to_string()]
        } else {
            model.labels().iter().map(i32::to_string).collect()
        };
        writeln!(writer, "labels {}", labels.join(" ")).map_err(SVMError::IoError)?;
    } else if probability {
        if let Some(sigma) = model.svr_probability() {
            writeln!(
                writer,
                "# Laplace distribution of residuals, sigma = {sigma}"
            )
            .map_err(SVMError::IoError)?;
        }
    }

    let mut predictions = Vec::with_capacity(dataset.len());
    let mut probabilities = vec![0.0; model.nr_class()];
    for i in 0..dataset.len() {
        let (x, _) = dataset.instance(i);
        if class_probabilities {
            let label = model.predict_probability(x, &mut probabilities)?;
            let values: Vec<String> = probabilities.iter().map(|p| format!("{p:.6}")).collect();
            writeln!(writer, "{label} {}", values.join(" ")).map_err(SVMError::IoError)?;
            predictions.push(label);
        } else {
            let value = model.predict(x);
            writeln!(writer, "{value}").map_err(SVMError::IoError)?;
            predictions.push(value);
        }
    }

    let metrics = EvaluationMetrics::from_predictions(&predictions, dataset.labels());
    if model.svm_type().is_regression() {
        info!(
            "Mean squared error = {:.6}, squared correlation coefficient = {:.6}",
            metrics.mean_squared_error(),
            metrics.squared_correlation()
        );
    } else {
        info!(
            "Accuracy = {:.2}% ({}/{})",
            metrics.accuracy() * 100.0,
            metrics.correct,
            metrics.total
        );
    }
    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable_model = SerializableModel::load_from_file(&args.model)?;
    serializable_model.print_summary();

    let model = serializable_model.into_model()?;
    println!("\nSupport Vector Details:");
    println!("  Total: {}", model.n_support_vectors());
    for (label, count) in model.labels().iter().zip(model.n_sv_per_class()) {
        println!("  Class {label}: {count}");
    }
    if let Some(sigma) = model.svr_probability() {
        println!("  Residual sigma: {sigma:.6}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weight() {
        assert_eq!(parse_weight("2:0.5"), Ok((2, 0.5)));
        assert_eq!(parse_weight("-1:3"), Ok((-1, 3.0)));
        assert!(parse_weight("2").is_err());
        assert!(parse_weight("a:1").is_err());
    }

    #[test]
    fn test_cli_parses_training_flags() {
        let cli = Cli::try_parse_from([
            "svmkit", "train", "--data", "a.txt", "-o", "m.json", "-s", "nu-svc", "-t", "rbf",
            "-g", "0.5", "-n", "0.2", "-w", "1:2", "-w", "-1:0.5", "--no-shrinking", "-b",
        ])
        .expect("arguments should parse");

        let Commands::Train(args) = cli.command else {
            panic!("expected the train subcommand");
        };
        let params = build_parameters(&args);
        assert_eq!(params.svm_type, SvmType::NuSvc);
        assert_eq!(params.kernel_type, KernelType::Rbf);
        assert_eq!(params.gamma, 0.5);
        assert_eq!(params.nu, 0.2);
        assert_eq!(params.weights.len(), 2);
        assert!(!params.shrinking);
        assert!(params.probability);
    }

    #[test]
    fn test_cli_accepts_negative_label_weights() {
        let cli = Cli::try_parse_from([
            "svmkit", "train", "--data", "a.txt", "-o", "m.json", "-w", "-1:0.5", "--weight",
            "-2:4", "-w", "3:1.5",
        ])
        .expect("arguments should parse");

        let Commands::Train(args) = cli.command else {
            panic!("expected the train subcommand");
        };
        assert_eq!(args.weights, vec![(-1, 0.5), (-2, 4.0), (3, 1.5)]);
        let params = build_parameters(&args);
        assert_eq!(params.weights[0].label, -1);
        assert_eq!(params.weights[0].weight, 0.5);
    }
}
