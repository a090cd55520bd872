mod visibility;

use anyhow::{Context, Result, bail};
use ganado_vision::{EvaluationRequest, Evaluator, EvaluatorConfig, Mode, ParallelEvaluator, load_config};
use log::info;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

const USAGE: &str = "Usage: ganado_tester <image_path> [mode] [--config <path>] [--visibility <0..1>] [--risk <0..1>]";

#[derive(Debug)]
struct Args {
    image: PathBuf,
    mode: Mode,
    config: Option<PathBuf>,
    visibility: Option<f64>,
    risk: Option<f64>,
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut visibility = None;
    let mut risk = None;

    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(iter.next().context("--config needs a path")?)),
            "--visibility" => {
                let value = iter.next().context("--visibility needs a value")?;
                visibility = Some(value.parse::<f64>().with_context(|| format!("bad visibility {value:?}"))?);
            }
            "--risk" => {
                let value = iter.next().context("--risk needs a value")?;
                risk = Some(value.parse::<f64>().with_context(|| format!("bad risk {value:?}"))?);
            }
            other if other.starts_with("--") => bail!("unknown flag {other}\n{USAGE}"),
            other => positional.push(other.to_string()),
        }
    }

    let mut positional = positional.into_iter();
    let image = positional.next().map(PathBuf::from).context(USAGE)?;
    let mode = positional.next().map(|m| Mode::from_name(&m)).unwrap_or_default();
    Ok(Args {
        image,
        mode,
        config,
        visibility,
        risk,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // --- 1. Argument Parsing & Setup ---
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EvaluatorConfig::default(),
    };

    // --- 2. Image Decoding ---
    let image = image::open(&args.image)
        .with_context(|| format!("failed to decode {}", args.image.display()))?
        .to_rgb8();
    let visibility = args.visibility.unwrap_or_else(|| visibility::estimate(&image));
    info!(
        "{}: {}x{} mode={} visibility={:.2}",
        args.image.display(),
        image.width(),
        image.height(),
        args.mode.as_str(),
        visibility
    );

    // --- 3. Evaluation ---
    let mut request = EvaluationRequest::new(args.mode, visibility);
    if let Some(risk) = args.risk {
        request = request.with_risk(risk);
    }
    let evaluator = ParallelEvaluator::new(Evaluator::new(config));
    let evaluation = evaluator.evaluate(Arc::new(image), request).await?;

    // --- 4. Report ---
    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    Ok(())
}
