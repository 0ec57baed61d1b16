use clap::{Parser, Subcommand};
use leafdoc_core::{Confidence, CoreConfig, DiseaseLabel, PredictionService, Remedy, TreatmentRecord};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "leafdoc")]
#[command(about = "LeafDoc leaf disease diagnosis CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every label the classifier can return
    Labels,
    /// Show the treatment record for a label
    Treatment {
        /// Disease label, e.g. "Early Blight leaf disease"
        label: String,
    },
    /// Classify an image and print the ranked predictions
    Classify {
        /// Path to a png/jpg/jpeg leaf photo
        image: PathBuf,
    },
    /// Generate an explanation for a label
    Explain {
        /// Disease label, e.g. "Leaf Mold disease"
        label: String,
        /// Classifier confidence in [0, 1] to mention in the explanation
        #[arg(long)]
        confidence: Option<f32>,
    },
    /// Classify an image, look up its treatment and explain it
    Predict {
        /// Path to a png/jpg/jpeg leaf photo
        image: PathBuf,
        /// Print the diagnosis as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_treatment(record: &TreatmentRecord) {
    println!("Organic:");
    print_remedies(&record.organic);
    println!("Chemical:");
    print_remedies(&record.chemical);
    println!("Prevention:");
    if record.prevention.is_empty() {
        println!("  - (none)");
    }
    for tip in &record.prevention {
        println!("  - {}", tip);
    }
}

fn print_remedies(remedies: &[Remedy]) {
    if remedies.is_empty() {
        println!("  - (none)");
    }
    for remedy in remedies {
        println!("  - {} <{}>", remedy.name, remedy.link);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("leafdoc=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = CoreConfig::from_env_lookup(|name| std::env::var(name).ok())?;

    match cli.command {
        Some(Commands::Labels) => {
            for label in DiseaseLabel::ALL {
                println!("{}", label);
            }
        }
        Some(Commands::Treatment { label }) => {
            let catalog = cfg.load_catalog()?;
            let record = catalog.lookup(&label);
            if record.is_empty() {
                eprintln!("No treatment data for '{}'", label);
            }
            println!("{}", label);
            print_treatment(record);
        }
        Some(Commands::Classify { image }) => {
            let service = PredictionService::from_config(&cfg)?;
            let predictions = service.classify(&image)?;
            println!("classifier: {}", service.classifier_name());
            for p in predictions.iter().take(service.max_results()) {
                println!("{:<16} {}", p.label.as_str(), p.confidence);
            }
        }
        Some(Commands::Explain { label, confidence }) => {
            let label: DiseaseLabel = label.parse()?;
            let confidence = confidence.map(Confidence::new).transpose()?;
            let service = PredictionService::from_config(&cfg)?;
            let explanation = service.explanations().explain(label, confidence).await;
            println!("{}", explanation.text);
            eprintln!("(source: {:?})", explanation.source);
        }
        Some(Commands::Predict { image, json }) => {
            let service = PredictionService::from_config(&cfg)?;
            let diagnosis = service.diagnose(image).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&diagnosis)?);
                return Ok(());
            }

            println!("Prediction results:");
            for p in &diagnosis.predictions {
                println!("  {:<16} {}", p.label.as_str(), p.confidence);
            }
            if let Some(warning) = &diagnosis.warning {
                println!("Warning: {}", warning);
            }
            println!();
            println!("{}", diagnosis.explanation.text);
            println!();
            println!("Treatment for {}:", diagnosis.top.label);
            print_treatment(&diagnosis.treatment);
        }
        None => {
            println!("Use 'leafdoc --help' for commands");
        }
    }

    Ok(())
}
