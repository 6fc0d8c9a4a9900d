use clap::Parser;
use common::{LogLevel, setup_logging};
use inference::backend::ort::OrtLoader;
use inference::{
    ClassifiedDetection, DangerLevel, HubWeightStore, InferenceConfig, InferenceService,
    ModelResolver,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Run the detector over a directory of images and print danger classifications.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory containing .jpg, .jpeg, .png or .webp images
    #[arg(default_value = "test_images")]
    dir: PathBuf,
}

const PATTERNS: [&str; 4] = ["*.jpg", "*.jpeg", "*.png", "*.webp"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = InferenceConfig::from_env()?;
    setup_logging("detect-images", LogLevel::Warn, config.environment);

    let store = Arc::new(HubWeightStore::from_config(&config)?);
    let loader = Arc::new(OrtLoader::from_config(&config));
    let resolver = Arc::new(ModelResolver::new(&config, store, loader));
    let service = InferenceService::new(resolver, &config);

    let info = service.model_metadata().await?;
    println!("Model:         {} ({})", info.path, info.source_kind.as_str());
    println!("Classes:       {:?}", info.class_names);
    println!("Confidence:    >= {}", info.confidence_threshold);
    println!("Danger levels: {:?}", info.danger_level_names);

    if !args.dir.is_dir() {
        anyhow::bail!("{} is not a directory", args.dir.display());
    }

    let mut images = Vec::new();
    for pattern in PATTERNS {
        let pattern = args.dir.join(pattern);
        for entry in glob::glob(&pattern.to_string_lossy())? {
            images.push(entry?);
        }
    }
    images.sort();

    if images.is_empty() {
        println!("No images found in {}", args.dir.display());
        return Ok(());
    }
    println!("Found {} image(s)", images.len());

    let mut detected = 0usize;
    let mut distribution: HashMap<DangerLevel, usize> = HashMap::new();

    for path in &images {
        let bytes = std::fs::read(path)?;
        println!(
            "\n--- {} ({:.1} KB)",
            path.file_name().unwrap_or_default().to_string_lossy(),
            bytes.len() as f64 / 1024.0
        );

        let result = match service.handle(bytes, Some(content_type(path))).await {
            Ok(result) => result,
            Err(e) => {
                println!("  error: {}", e);
                continue;
            }
        };

        let Some(primary) = result.primary() else {
            println!("  No road damage detected");
            continue;
        };

        detected += 1;
        *distribution.entry(primary.danger_level).or_default() += 1;

        println!("  Primary (valid: {}):", result.is_valid);
        print_detection(primary, 1);
        if result.all_detections.len() > 1 {
            println!("  All detections ({}):", result.all_detections.len());
            for (i, det) in result.all_detections.iter().enumerate() {
                print_detection(det, i + 1);
            }
        }
    }

    println!("\nImages tested:   {}", images.len());
    println!("Damage detected: {}/{}", detected, images.len());
    if detected > 0 {
        println!("Danger distribution:");
        for level in DangerLevel::ALL {
            println!(
                "  {:<9} {}",
                level.as_str(),
                distribution.get(&level).copied().unwrap_or(0)
            );
        }
    }

    Ok(())
}

fn print_detection(det: &ClassifiedDetection, index: usize) {
    println!("  [{}] {}", index, det.defect_type.to_uppercase());
    println!("      confidence: {:.1}%", det.confidence * 100.0);
    println!("      danger:     {} ({})", det.danger_level.as_str(), det.danger_label);
    println!("      priority:   {}", det.danger_priority);
    println!("      severity:   {}", det.legacy_severity.as_str());
    println!("      bbox:       {:.2?}", det.bbox.to_array());
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
