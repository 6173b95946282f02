use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use super::{DetectedTable, Destination, PdfPrimitives, RawOutlineItem, TextLine};

#[derive(Debug, Clone, Deserialize)]
pub struct PrimitiveDump {
    #[serde(default)]
    pub file_name: Option<String>,
    pub total_pages: usize,
    #[serde(default)]
    pub outline: Vec<RawOutlineItem>,
    #[serde(default)]
    pub named_destinations: HashMap<String, u32>,
    #[serde(default)]
    pub pages: Vec<Option<DumpPage>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DumpPage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub lines: Vec<TextLine>,
    #[serde(default)]
    pub tables: Vec<DetectedTable>,
}

#[derive(Debug)]
pub struct DumpPrimitives {
    file_name: String,
    dump: PrimitiveDump,
}

impl DumpPrimitives {
    pub fn open(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let fallback = source_name_for_dump(path);
        Self::from_json(&fallback, &raw)
            .with_context(|| format!("failed to parse primitive dump {}", path.display()))
    }

    pub fn from_json(fallback_file_name: &str, raw: &str) -> Result<Self> {
        let dump: PrimitiveDump =
            serde_json::from_str(raw).context("invalid primitive dump json")?;
        Ok(Self::from_dump(fallback_file_name, dump))
    }

    pub fn from_dump(fallback_file_name: &str, dump: PrimitiveDump) -> Self {
        let file_name = dump
            .file_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| fallback_file_name.to_string());
        Self { file_name, dump }
    }

    fn page(&self, page_index: usize) -> Result<&DumpPage> {
        if page_index >= self.dump.total_pages {
            bail!(
                "page index {} is outside the document ({} pages)",
                page_index,
                self.dump.total_pages
            );
        }

        match self.dump.pages.get(page_index) {
            Some(Some(page)) => Ok(page),
            Some(None) => bail!("primitives for page {} are unavailable", page_index + 1),
            None => bail!("page {} missing from primitive dump", page_index + 1),
        }
    }
}

impl PdfPrimitives for DumpPrimitives {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn total_page_count(&self) -> usize {
        self.dump.total_pages
    }

    fn outline(&self) -> Result<Vec<RawOutlineItem>> {
        Ok(self.dump.outline.clone())
    }

    fn resolve_page_number(&self, destination: &Destination) -> Result<u32> {
        let page_index = match destination {
            Destination::PageIndex(index) => *index,
            Destination::Named(name) => *self
                .dump
                .named_destinations
                .get(name)
                .with_context(|| format!("unknown named destination '{name}'"))?,
            Destination::Other(value) => bail!("unsupported destination {value}"),
        };

        if page_index as usize >= self.dump.total_pages {
            bail!(
                "destination page index {} is outside the document ({} pages)",
                page_index,
                self.dump.total_pages
            );
        }

        Ok(page_index + 1)
    }

    fn extract_plain_text(&self, page_index: usize) -> Result<String> {
        Ok(self.page(page_index)?.text.clone())
    }

    fn extract_text_lines(&self, page_index: usize) -> Result<Vec<TextLine>> {
        Ok(self.page(page_index)?.lines.clone())
    }

    fn find_tables(&self, page_index: usize) -> Result<Vec<DetectedTable>> {
        Ok(self.page(page_index)?.tables.clone())
    }
}

fn source_name_for_dump(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("document");
    let stem = stem.strip_suffix(".primitives").unwrap_or(stem);
    format!("{stem}.pdf")
}
