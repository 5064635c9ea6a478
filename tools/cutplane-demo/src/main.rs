//! Cutplane Demo
//!
//! Trains structured SVMs on synthetic problems and reports their accuracy.

mod problems;

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand, ValueEnum};
use cutplane::{
    CancelToken, FitResult, LatentConfig, LatentConstraintSource, LatentStructuredSvm, ReportLog,
    SolverConfig, StructuredSvm,
};
use oorandom::Rand64;
use tracing::{info, warn};

use problems::{Multiclass, ViewSelection};

/// CLI arguments
#[derive(Parser)]
#[command(name = "cutplane-demo")]
#[command(about = "Train cutting-plane structured SVMs on synthetic data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    solver: SolverArgs,

    /// Seed of the data generator
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Cancel training after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the fit result and iteration reports as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SolverArgs {
    /// Slack penalty C
    #[arg(short = 'c', long, default_value_t = 1.0)]
    c: f64,

    /// Maximum number of outer iterations
    #[arg(short = 'n', long, default_value_t = 100)]
    max_iter: usize,

    /// Factor applied to every feature difference
    #[arg(long, default_value_t = cutplane::DEFAULT_FEATURE_SCALE)]
    feature_scale: f64,
}

impl SolverArgs {
    fn config(&self) -> SolverConfig {
        SolverConfig::new()
            .with_c(self.c)
            .with_max_iter(self.max_iter)
            .with_feature_scale(self.feature_scale)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Multiclass classification of noisy clusters
    Multiclass {
        /// Training samples
        #[arg(long, default_value_t = 60)]
        samples: usize,

        /// Held-out samples
        #[arg(long, default_value_t = 60)]
        test_samples: usize,

        #[arg(long, default_value_t = 3)]
        classes: usize,

        #[arg(long, default_value_t = 2)]
        features: usize,

        /// Half-width of the uniform noise around each center
        #[arg(long, default_value_t = 1.0)]
        noise: f64,
    },
    /// Binary classification of bags where a latent view carries the signal
    Latent {
        #[arg(long, default_value_t = 40)]
        samples: usize,

        #[arg(long, default_value_t = 40)]
        test_samples: usize,

        #[arg(long, default_value_t = 3)]
        views: usize,

        #[arg(long, default_value_t = 4)]
        features: usize,

        #[arg(long, default_value_t = 0.5)]
        noise: f64,

        /// Oracle call that proposes constraints
        #[arg(long, value_enum, default_value_t = Source::Inference)]
        source: Source,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Inference,
    LossAugmented,
}

impl From<Source> for LatentConstraintSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Inference => Self::Inference,
            Source::LossAugmented => Self::LossAugmented,
        }
    }
}

fn accuracy<Y: PartialEq>(predicted: &[Y], labels: &[Y]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let hits = predicted.iter().zip(labels).filter(|(p, y)| p == y).count();
    hits as f64 / labels.len() as f64
}

/// Cancels `token` once `secs` seconds have passed.
fn arm_timeout(token: &CancelToken, secs: u64) {
    let token = token.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(secs));
        token.cancel();
    });
}

fn report(
    result: &FitResult,
    log: &ReportLog,
    train_accuracy: f64,
    test_accuracy: f64,
    json: bool,
) -> Result<()> {
    if !result.converged() {
        warn!(stop = ?result.stop, "training stopped before convergence");
    }
    if json {
        let output = serde_json::json!({
            "result": result,
            "reports": log.reports,
            "train_accuracy": train_accuracy,
            "test_accuracy": test_accuracy,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("failed to encode report")?
        );
    } else {
        println!("stop:           {:?}", result.stop);
        println!("iterations:     {}", result.iterations);
        println!("constraints:    {}", result.working_set_len);
        println!("train accuracy: {:.3}", train_accuracy);
        println!("test accuracy:  {:.3}", test_accuracy);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cli.solver.config();
    config.validate().context("invalid solver settings")?;

    let mut rng = Rand64::new(u128::from(cli.seed));
    let cancel = CancelToken::new();
    if let Some(secs) = cli.timeout_secs {
        arm_timeout(&cancel, secs);
    }
    let mut log = ReportLog::default();

    match cli.command {
        Commands::Multiclass {
            samples,
            test_samples,
            classes,
            features,
            noise,
        } => {
            ensure!(classes >= 2, "need at least two classes");
            let model = Multiclass::new(features, classes);
            let (train_x, train_y) = model.generate(&mut rng, samples + test_samples, noise);
            let (test_x, test_y) = (&train_x[samples..], &train_y[samples..]);
            let (train_x, train_y) = (&train_x[..samples], &train_y[..samples]);

            info!(samples, classes, features, "training multiclass model");
            let svm = StructuredSvm::new(model, config);
            let result = svm
                .fit_observed(train_x, train_y, &mut log, &cancel)
                .context("training failed")?;

            let predictor = svm.predictor(&result.weights)?;
            let train_accuracy = accuracy(&predictor.predict(train_x)?, train_y);
            let test_accuracy = accuracy(&predictor.predict(test_x)?, test_y);
            report(&result, &log, train_accuracy, test_accuracy, cli.json)
        }
        Commands::Latent {
            samples,
            test_samples,
            views,
            features,
            noise,
            source,
        } => {
            ensure!(views >= 1, "need at least one view");
            let mut model = ViewSelection::new(features, views);
            let (train_x, train_y) = model.generate(&mut rng, samples, noise);
            let (test_x, test_y) = model.generate(&mut rng, test_samples, noise);

            info!(samples, views, features, "training latent view model");
            let latent_config = LatentConfig::new(config).with_constraint_source(source.into());
            let svm = LatentStructuredSvm::new(model, latent_config);
            let result = svm
                .fit_observed(&train_x, &train_y, &mut log, &cancel)
                .context("training failed")?;

            let predictor = svm.predictor(&result.weights)?;
            let train_accuracy = accuracy(&predictor.predict(&train_x)?, &train_y);
            let test_accuracy = accuracy(&predictor.predict(&test_x)?, &test_y);
            report(&result, &log, train_accuracy, test_accuracy, cli.json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[1, 2, 3, 4], &[1, 2, 0, 0]), 0.5);
        assert_eq!(accuracy::<i32>(&[], &[]), 0.0);
    }

    #[test]
    fn multiclass_demo_learns_separated_clusters() {
        let model = Multiclass::new(2, 3);
        let (inputs, labels) = model.generate(&mut Rand64::new(3), 30, 0.1);
        let svm = StructuredSvm::new(
            model,
            SolverConfig::new().with_c(100.0).with_feature_scale(1.0),
        );
        let result = svm.fit(&inputs, &labels).unwrap();
        assert_eq!(result.weights.len(), 9);
        assert!(result.converged());

        let predicted = svm.predictor(&result.weights).unwrap().predict(&inputs).unwrap();
        assert_eq!(accuracy(&predicted, &labels), 1.0);
    }

    #[test]
    fn noisy_multiclass_trains_with_large_c() {
        // Same data as `cutplane-demo -c 100 --feature-scale 1 multiclass --noise 3`.
        let model = Multiclass::new(2, 3);
        let (inputs, labels) = model.generate(&mut Rand64::new(7), 120, 3.0);
        let (inputs, labels) = (&inputs[..60], &labels[..60]);
        let svm = StructuredSvm::new(
            model,
            SolverConfig::new().with_c(100.0).with_feature_scale(1.0),
        );
        let result = svm.fit(inputs, labels).unwrap();
        assert!(result.converged());

        let predicted = svm.predictor(&result.weights).unwrap().predict(inputs).unwrap();
        assert!(accuracy(&predicted, labels) >= 0.7);
    }
}
