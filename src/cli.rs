//! Command-line arguments for the `rusty-h5` sample loader.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Load datasets from a container file and print them
#[derive(Parser, Debug, Clone)]
#[command(name = "rusty-h5")]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Container file (.json snapshot, or .h5 when built with the hdf5 feature)
    pub file: PathBuf,

    /// Datasets to load (default: every dataset under the root)
    pub datasets: Vec<String>,

    /// Output type to load the datasets as
    #[arg(long = "as", value_enum, default_value_t = LoadAs::Auto)]
    pub load_as: LoadAs,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Fail on datasets whose shape cannot be queried instead of treating them as empty
    #[arg(long = "strict-shape")]
    pub strict_shape: bool,

    /// Strip trailing NUL padding from strings before printing
    #[arg(long = "trim")]
    pub trim: bool,

    /// Only list datasets with their shape and encoding
    #[arg(short = 'l', long = "list")]
    pub list: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAs {
    /// Pick from the stored encoding and rank
    Auto,
    Int,
    Float,
    String,
    #[value(name = "int2d")]
    Int2d,
    #[value(name = "float2d")]
    Float2d,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}
