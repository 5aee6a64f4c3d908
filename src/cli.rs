use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "plantdiag",
    version,
    about = "Plant disease diagnosis with vision-language models"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Diagnose a plant photo
    Diagnose {
        /// Path to the image (JPEG or PNG)
        #[arg(short, long)]
        image: PathBuf,

        /// Crop name, e.g. 水稻 or tomato
        #[arg(short, long)]
        plant_type: Option<String>,

        /// Comma-separated models (qwen, qwen-ocr, taichu, chatglm, local)
        #[arg(short, long)]
        models: Option<String>,

        /// Sensor readings: soil_moisture=45,soil_temperature=21,soil_ph=6.5,air_temperature=28,air_humidity=80
        #[arg(short, long)]
        env: Option<String>,

        /// Print the diagnosis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-run interactive setup
    Init,
    /// Validate config and test connections
    Check,
}
