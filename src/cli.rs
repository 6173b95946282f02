use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::outline::ExtractOptions;

#[derive(Parser, Debug)]
#[command(
    name = "report-outline",
    version,
    about = "Outline-driven chapter extraction for listed-company report PDFs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Parse(ParseArgs),
    Outline(OutlineArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Backend {
    Auto,
    Poppler,
    Dump,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Poppler => "poppler",
            Self::Dump => "dump",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = "results/pdf_reports")]
    pub reports_dir: PathBuf,

    #[arg(long, default_value = "results/outlines")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    pub backend: Backend,

    #[arg(long, default_value_t = 4)]
    pub min_line_chars: usize,

    #[arg(long, default_value_t = false)]
    pub keep_running_lines: bool,

    #[arg(long, default_value_t = 3)]
    pub running_line_min_pages: usize,
}

impl ExtractArgs {
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            min_line_chars: self.min_line_chars,
            strip_running_lines: !self.keep_running_lines,
            running_line_min_pages: self.running_line_min_pages,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    #[arg(long, default_value = "results/pdf_reports")]
    pub reports_dir: PathBuf,

    #[arg(long, default_value = "results/outlines")]
    pub output_dir: PathBuf,

    #[arg(long = "input")]
    pub inputs: Vec<PathBuf>,

    #[arg(long)]
    pub inventory_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub parse_manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub refresh_inventory: bool,

    #[arg(long)]
    pub max_documents: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[command(flatten)]
    pub extract: ExtractArgs,
}

#[derive(Args, Debug, Clone)]
pub struct OutlineArgs {
    pub input: PathBuf,

    #[arg(long, default_value_t = false)]
    pub with_content: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Print the cleaned content of one leaf, by dotted section id.
    #[arg(long)]
    pub section: Option<String>,

    #[command(flatten)]
    pub extract: ExtractArgs,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "results/outlines")]
    pub output_dir: PathBuf,
}
