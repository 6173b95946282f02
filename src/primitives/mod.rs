use std::path::Path;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::cli::Backend;

mod dump;
mod poppler;

pub use dump::DumpPrimitives;
pub use poppler::PopplerPrimitives;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BBox {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    pub fn overlaps(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.top < other.bottom && other.top < self.bottom
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTable {
    pub bbox: BBox,
    #[serde(default)]
    pub rows: Vec<Vec<Option<String>>>,
}

impl DetectedTable {
    pub fn render(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        cell.as_deref()
                            .unwrap_or_default()
                            .replace(['\n', '\r', '\t'], " ")
                            .trim()
                            .to_string()
                    })
                    .collect::<Vec<String>>()
                    .join("\t")
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    PageIndex(u32),
    Named(String),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOutlineItem {
    Children(Vec<RawOutlineItem>),
    Entry(RawOutlineEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutlineEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub destination: Option<Destination>,
    #[serde(default)]
    pub count: i64,
}

impl RawOutlineEntry {
    pub fn declares_children(&self) -> bool {
        self.count != 0
    }
}

pub trait PdfPrimitives {
    fn file_name(&self) -> &str;

    fn total_page_count(&self) -> usize;

    fn outline(&self) -> Result<Vec<RawOutlineItem>>;

    fn resolve_page_number(&self, destination: &Destination) -> Result<u32>;

    fn extract_plain_text(&self, page_index: usize) -> Result<String>;

    fn extract_text_lines(&self, page_index: usize) -> Result<Vec<TextLine>>;

    fn find_tables(&self, page_index: usize) -> Result<Vec<DetectedTable>>;
}

pub fn open(path: &Path, backend: Backend) -> Result<Box<dyn PdfPrimitives>> {
    let backend = match backend {
        Backend::Auto => detect_backend(path)?,
        other => other,
    };

    match backend {
        Backend::Poppler => Ok(Box::new(PopplerPrimitives::open(path)?)),
        Backend::Dump => Ok(Box::new(DumpPrimitives::open(path)?)),
        Backend::Auto => bail!("backend detection failed for {}", path.display()),
    }
}

fn detect_backend(path: &Path) -> Result<Backend> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => Ok(Backend::Poppler),
        "json" => Ok(Backend::Dump),
        _ => bail!(
            "cannot infer primitive backend from extension of {}",
            path.display()
        ),
    }
}
