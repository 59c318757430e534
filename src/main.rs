use anyhow::{Context, Result};
use purchase_again::{Config, FittedModel, PipelineError, PurchaseRecord, load_records};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let step = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<PipelineError>())
                .map(|pe| pe.step().to_string())
                .unwrap_or_else(|| "setup".to_string());
            error!(%step, "Pipeline failed");
            println!("An error occurred: {e:#}");
            println!("Context: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = Config::from_env()?;
    let options = config.load_options();
    info!(
        train = %config.train_path.display(),
        test = %config.test_path.display(),
        "Starting purchase pipeline"
    );

    let train = load_records(&config.train_path, options).context("loading training data")?;
    let model = FittedModel::train(&train, config.unknown_category, &config.trainer)
        .context("training model")?;
    model.save(&config.model_path).context("saving model")?;

    let test = load_records(&config.test_path, options).context("loading evaluation data")?;
    let metrics = model.evaluate(&test).context("evaluating model")?;
    println!();
    println!("{metrics}");

    let sample = PurchaseRecord::unlabeled("499", 52.0, "Male", 3.0);
    let prediction = model.predict(&sample).context("predicting sample")?;
    println!("{prediction}");

    Ok(())
}
