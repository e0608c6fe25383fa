use clap::Parser;
use serde::{Deserialize, Serialize};
use ssdbox::{
    decode_boxes, select_top_k_with_nms_config, Detection, FeatureShape, ImageShape, LayerConfig,
    NmsConfig, PriorScaling, SsdBoxError, SsdBoxResult, SuppressionMode,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "SSD box decoding CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for per-layer timings and counts.
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SuppressionConfig {
    AllRanked,
    KeptOnly,
}

impl From<SuppressionConfig> for SuppressionMode {
    fn from(value: SuppressionConfig) -> Self {
        match value {
            SuppressionConfig::AllRanked => SuppressionMode::AllRanked,
            SuppressionConfig::KeptOnly => SuppressionMode::KeptOnly,
        }
    }
}

/// One output layer: its parameters plus the raw network buffers.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct LayerJson {
    name: String,
    feature_height: usize,
    feature_width: usize,
    step: usize,
    min_size: f32,
    max_size: f32,
    ratios: Vec<f32>,
    prior_scaling: [f32; 4],
    offset: f32,
    top_k: usize,
    iou_threshold: f32,
    suppression: SuppressionConfig,
    localization: Vec<f32>,
    scores: Vec<f32>,
}

impl Default for LayerJson {
    fn default() -> Self {
        let cfg = LayerConfig::default();
        Self {
            name: String::new(),
            feature_height: 0,
            feature_width: 0,
            step: cfg.step,
            min_size: cfg.min_size,
            max_size: cfg.max_size,
            ratios: cfg.ratios,
            prior_scaling: cfg.prior_scaling.0,
            offset: cfg.offset,
            top_k: cfg.nms.top_k,
            iou_threshold: cfg.nms.iou_threshold,
            suppression: SuppressionConfig::AllRanked,
            localization: Vec::new(),
            scores: Vec::new(),
        }
    }
}

impl From<&LayerJson> for LayerConfig {
    fn from(value: &LayerJson) -> Self {
        Self {
            min_size: value.min_size,
            max_size: value.max_size,
            ratios: value.ratios.clone(),
            step: value.step,
            offset: value.offset,
            prior_scaling: PriorScaling(value.prior_scaling),
            nms: NmsConfig {
                top_k: value.top_k,
                iou_threshold: value.iou_threshold,
                suppression: value.suppression.into(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    image_height: usize,
    image_width: usize,
    output_path: Option<String>,
    layers: Vec<LayerJson>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_height: 300,
            image_width: 300,
            output_path: None,
            layers: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    score: f32,
    ymin: f32,
    xmin: f32,
    ymax: f32,
    xmax: f32,
}

impl From<Detection> for DetectionRecord {
    fn from(value: Detection) -> Self {
        Self {
            score: value.score,
            ymin: value.bbox.ymin,
            xmin: value.bbox.xmin,
            ymax: value.bbox.ymax,
            xmax: value.bbox.xmax,
        }
    }
}

#[derive(Debug, Serialize)]
struct LayerOutput {
    name: String,
    detections: Vec<DetectionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Output {
    layers: Vec<LayerOutput>,
}

/// Decodes one layer's buffers and returns its kept detections.
fn run_layer(image: ImageShape, layer: &LayerJson) -> SsdBoxResult<Vec<DetectionRecord>> {
    let cfg = LayerConfig::from(layer);
    cfg.validate()?;

    let feature = FeatureShape::new(layer.feature_height, layer.feature_width);
    let anchors = cfg.anchor_shapes(image)?;
    let instances = cfg.instance_count(feature)?;
    if layer.scores.len() != instances {
        return Err(SsdBoxError::BufferSizeMismatch {
            expected: instances,
            got: layer.scores.len(),
            context: "scores",
        });
    }

    let mut loc = layer.localization.clone();
    decode_boxes(
        &mut loc,
        feature,
        image,
        cfg.step,
        &anchors,
        cfg.prior_scaling,
        cfg.offset,
    )?;
    let kept = select_top_k_with_nms_config(&layer.scores, &loc, instances, cfg.nms)?;
    Ok(kept.detections().map(DetectionRecord::from).collect())
}

fn run(config: &Config) -> Output {
    let image = ImageShape::new(config.image_height, config.image_width);
    let layers = config
        .layers
        .iter()
        .map(|layer| match run_layer(image, layer) {
            Ok(detections) => {
                tracing::info!(layer = %layer.name, kept = detections.len(), "layer decoded");
                LayerOutput {
                    name: layer.name.clone(),
                    detections,
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!(layer = %layer.name, error = %err, "skipping layer");
                LayerOutput {
                    name: layer.name.clone(),
                    detections: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        })
        .collect();
    Output { layers }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("ssdbox=debug".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.layers.is_empty() {
        return Err("config must list at least one layer".into());
    }

    let output = run(&config);
    let json = serde_json::to_string_pretty(&output)?;

    match &config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run, Config, EXAMPLE_JSON};

    #[test]
    fn example_config_decodes_every_layer() {
        let config: Config = serde_json::from_str(EXAMPLE_JSON).unwrap();
        let output = run(&config);
        assert_eq!(output.layers.len(), 2);
        assert!(output.layers.iter().all(|l| l.error.is_none()));

        let first = &output.layers[0];
        let scores: Vec<f32> = first.detections.iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![0.9, 0.3]);

        let second = &output.layers[1];
        assert!(!second.detections.is_empty());
        assert!(second.detections.len() <= 4);
        assert_eq!(second.detections[0].score, 0.8);
    }

    #[test]
    fn bad_layer_is_reported_not_fatal() {
        let json = r#"{
            "layers": [
                { "name": "short", "feature_height": 1, "feature_width": 1,
                  "localization": [0.0, 0.0], "scores": [0.5, 0.5, 0.5], "top_k": 1 }
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let output = run(&config);
        let layer = &output.layers[0];
        assert!(layer.detections.is_empty());
        assert_eq!(
            layer.error.as_deref(),
            Some("localization buffer has 2 elements, expected 12")
        );
    }
}
