//! EOModeler CLI
//!
//! Batch front end over a directory of `.eomodeld` model folders.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// EOModeler - Enterprise Objects model files
#[derive(Parser)]
#[command(name = "eomodeler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every model below a directory, resolve and verify it
    Verify {
        /// Model group directory (or a single .eomodeld folder)
        #[arg(default_value = ".")]
        root: String,
    },

    /// Show models and their entities
    Show {
        /// Model group directory (or a single .eomodeld folder)
        #[arg(default_value = ".")]
        root: String,

        /// Show a single model only
        #[arg(short, long)]
        model: Option<String>,

        /// Dump the persisted form as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load models and save them back in normalized form
    Resave {
        /// Model group directory (or a single .eomodeld folder)
        #[arg(default_value = ".")]
        root: String,

        /// Resave a single model only
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Create a new model folder
    New {
        /// Directory to create the model in
        dir: String,

        /// Model name
        name: String,

        /// Blank entities to add
        #[arg(short, long = "entity")]
        entities: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Verify { root } => {
            commands::verify::run(&root)?;
        }
        Commands::Show { root, model, json } => {
            commands::show::run(&root, model.as_deref(), json)?;
        }
        Commands::Resave { root, model } => {
            commands::resave::run(&root, model.as_deref())?;
        }
        Commands::New {
            dir,
            name,
            entities,
        } => {
            commands::new::run(&dir, &name, &entities)?;
        }
    }

    Ok(())
}
