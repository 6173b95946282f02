use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, BytesText, Event};
use tracing::debug;

use super::{
    BBox, DetectedTable, Destination, PdfPrimitives, RawOutlineEntry, RawOutlineItem, TextLine,
};

#[derive(Debug)]
pub struct PopplerPrimitives {
    pdf_path: PathBuf,
    file_name: String,
    total_pages: usize,
}

impl PopplerPrimitives {
    pub fn open(pdf_path: &Path) -> Result<Self> {
        let file_name = pdf_path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", pdf_path.display()))?;

        let output = Command::new("pdfinfo")
            .arg(pdf_path)
            .output()
            .with_context(|| format!("failed to execute pdfinfo for {}", pdf_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdfinfo could not open {}: {}",
                pdf_path.display(),
                stderr.trim()
            );
        }

        let info = String::from_utf8_lossy(&output.stdout);
        let total_pages = parse_pdfinfo_page_count(&info)
            .with_context(|| format!("pdfinfo reported no page count for {}", pdf_path.display()))?;

        debug!(path = %pdf_path.display(), total_pages, "opened pdf with poppler");

        Ok(Self {
            pdf_path: pdf_path.to_path_buf(),
            file_name,
            total_pages,
        })
    }

    fn run_pdftotext(&self, page_index: usize, mode: &str) -> Result<String> {
        let page_number = (page_index + 1).to_string();
        let output = Command::new("pdftotext")
            .arg(mode)
            .arg("-enc")
            .arg("UTF-8")
            .arg("-f")
            .arg(&page_number)
            .arg("-l")
            .arg(&page_number)
            .arg(&self.pdf_path)
            .arg("-")
            .output()
            .with_context(|| {
                format!("failed to execute pdftotext for {}", self.pdf_path.display())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftotext returned non-zero exit status for {} page {}: {}",
                self.pdf_path.display(),
                page_number,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).replace(['\u{0000}', '\u{000C}'], ""))
    }
}

impl PdfPrimitives for PopplerPrimitives {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn total_page_count(&self) -> usize {
        self.total_pages
    }

    fn outline(&self) -> Result<Vec<RawOutlineItem>> {
        let output = Command::new("pdftohtml")
            .arg("-xml")
            .arg("-i")
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg("1")
            .arg(&self.pdf_path)
            .arg("-stdout")
            .output()
            .with_context(|| {
                format!("failed to execute pdftohtml for {}", self.pdf_path.display())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftohtml returned non-zero exit status for {}: {}",
                self.pdf_path.display(),
                stderr.trim()
            );
        }

        parse_pdftohtml_outline(&String::from_utf8_lossy(&output.stdout))
    }

    fn resolve_page_number(&self, destination: &Destination) -> Result<u32> {
        match destination {
            Destination::PageIndex(index) if (*index as usize) < self.total_pages => Ok(index + 1),
            Destination::PageIndex(index) => bail!(
                "destination page index {} is outside the document ({} pages)",
                index,
                self.total_pages
            ),
            Destination::Named(name) => {
                bail!("named destination '{name}' was not resolved by pdftohtml")
            }
            Destination::Other(value) => bail!("unsupported destination {value}"),
        }
    }

    fn extract_plain_text(&self, page_index: usize) -> Result<String> {
        self.run_pdftotext(page_index, "-layout")
    }

    fn extract_text_lines(&self, page_index: usize) -> Result<Vec<TextLine>> {
        let xhtml = self.run_pdftotext(page_index, "-bbox-layout")?;
        parse_bbox_layout_lines(&xhtml)
    }

    fn find_tables(&self, _page_index: usize) -> Result<Vec<DetectedTable>> {
        Ok(Vec::new())
    }
}

fn parse_pdfinfo_page_count(info: &str) -> Option<usize> {
    info.lines()
        .filter_map(|line| line.strip_prefix("Pages:"))
        .find_map(|value| value.trim().parse::<usize>().ok())
}

fn parse_pdftohtml_outline(xml: &str) -> Result<Vec<RawOutlineItem>> {
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(false);

    let mut stack = Vec::<Vec<RawOutlineItem>>::new();
    let mut top_level = Vec::<RawOutlineItem>::new();
    let mut pending: Option<(Option<Destination>, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => match element.name().as_ref() {
                b"outline" => stack.push(Vec::new()),
                b"item" if !stack.is_empty() => {
                    pending = Some((item_destination(&element), String::new()));
                }
                _ => {}
            },
            Ok(Event::Empty(element)) => {
                if element.name().as_ref() == b"item" {
                    if let Some(current) = stack.last_mut() {
                        current.push(outline_entry(item_destination(&element), ""));
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some((_, title)) = pending.as_mut() {
                    title.push_str(&decode_text(&text));
                }
            }
            Ok(Event::End(element)) => match element.name().as_ref() {
                b"item" => {
                    if let (Some((destination, title)), Some(current)) =
                        (pending.take(), stack.last_mut())
                    {
                        current.push(outline_entry(destination, &title));
                    }
                }
                b"outline" => {
                    let Some(finished) = stack.pop() else {
                        continue;
                    };
                    if finished.is_empty() {
                        continue;
                    }
                    match stack.last_mut() {
                        Some(parent) => {
                            if let Some(RawOutlineItem::Entry(owner)) = parent.last_mut() {
                                owner.count = -(finished.len() as i64);
                            }
                            parent.push(RawOutlineItem::Children(finished));
                        }
                        None => top_level.extend(finished),
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => bail!(
                "malformed pdftohtml xml at byte {}: {error}",
                reader.buffer_position()
            ),
            _ => {}
        }
    }

    Ok(top_level)
}

fn item_destination(element: &BytesStart<'_>) -> Option<Destination> {
    attribute(element, "page")
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|page| *page > 0)
        .map(|page| Destination::PageIndex(page - 1))
}

fn outline_entry(destination: Option<Destination>, title: &str) -> RawOutlineItem {
    let title = collapse_whitespace(title);
    RawOutlineItem::Entry(RawOutlineEntry {
        title: (!title.is_empty()).then_some(title),
        destination,
        count: 0,
    })
}

fn parse_bbox_layout_lines(xhtml: &str) -> Result<Vec<TextLine>> {
    let mut reader = Reader::from_str(xhtml);
    reader.check_end_names(false);

    let mut lines = Vec::new();
    let mut current_line: Option<(BBox, Vec<String>)> = None;
    let mut current_word: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => match element.name().as_ref() {
                b"line" => {
                    let coordinate = |name: &str| {
                        attribute(&element, name)
                            .and_then(|value| value.trim().parse::<f64>().ok())
                            .unwrap_or_default()
                    };
                    let bbox = BBox::new(
                        coordinate("xMin"),
                        coordinate("yMin"),
                        coordinate("xMax"),
                        coordinate("yMax"),
                    );
                    current_line = Some((bbox, Vec::new()));
                }
                b"word" if current_line.is_some() => current_word = Some(String::new()),
                _ => {}
            },
            Ok(Event::Text(text)) => {
                if let Some(word) = current_word.as_mut() {
                    word.push_str(&decode_text(&text));
                }
            }
            Ok(Event::End(element)) => match element.name().as_ref() {
                b"word" => {
                    let word = current_word.take().map(|word| collapse_whitespace(&word));
                    if let (Some(word), Some((_, words))) = (word, current_line.as_mut()) {
                        if !word.is_empty() {
                            words.push(word);
                        }
                    }
                }
                b"line" => {
                    if let Some((bbox, words)) = current_line.take() {
                        if !words.is_empty() {
                            lines.push(TextLine {
                                text: join_words(&words),
                                bbox,
                            });
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => bail!(
                "malformed pdftotext bbox xhtml at byte {}: {error}",
                reader.buffer_position()
            ),
            _ => {}
        }
    }

    Ok(lines)
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name.as_bytes())
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}

fn decode_text(text: &BytesText<'_>) -> String {
    match text.unescape() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(text).into_owned(),
    }
}

/// Joins words with single spaces, except between two CJK characters where
/// poppler splits words that were never separated on the page.
fn join_words(words: &[String]) -> String {
    let mut joined = String::new();
    for word in words {
        let previous_cjk = joined.chars().last().map(is_cjk).unwrap_or(false);
        let next_cjk = word.chars().next().map(is_cjk).unwrap_or(false);
        if !joined.is_empty() && !(previous_cjk && next_cjk) {
            joined.push(' ');
        }
        joined.push_str(word);
    }
    joined
}

fn is_cjk(character: char) -> bool {
    matches!(
        character,
        '\u{3000}'..='\u{303F}' | '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}' | '\u{FF00}'..='\u{FFEF}'
    )
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<&str>>().join(" ")
}
