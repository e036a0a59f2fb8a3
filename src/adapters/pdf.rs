//! Minimal page-described PDF 1.4 writer.
//!
//! Supports the two base-14 Helvetica faces with WinAnsi encoding, text,
//! lines and rectangles. Enough for tabular reports and the DANFE layout;
//! no images, no font embedding, no compression.

use chrono::Local;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

pub const MM: f32 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    A4,
    A5,
    Letter,
}

impl PageSize {
    /// Portrait width and height in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
        }
    }

    /// Table rows that fit on one page of this size.
    pub fn rows_per_page(self) -> usize {
        match self {
            PageSize::A4 | PageSize::Letter => 20,
            PageSize::A5 => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::A5 => "A5",
            PageSize::Letter => "Letter",
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "a5" => Ok(PageSize::A5),
            "letter" => Ok(PageSize::Letter),
            other => Err(format!("unknown page size '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(format!("unknown orientation '{}'", other)),
        }
    }
}

/// Pages needed for `items` at `capacity` per page; never less than one.
pub fn page_count(items: usize, capacity: usize) -> usize {
    if capacity == 0 {
        return 1;
    }
    items.div_ceil(capacity).max(1)
}

/// Items that belong on the zero-based `page`.
pub fn page_slice<T>(items: &[T], page: usize, capacity: usize) -> &[T] {
    let start = (page * capacity).min(items.len());
    let end = (start + capacity).min(items.len());
    &items[start..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Rough Helvetica advance width; good enough to keep table cells apart.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5
}

pub fn truncate_to_width(text: &str, width: f32, size: f32) -> String {
    if text_width(text, size) <= width {
        return text.to_string();
    }
    let max_chars = (width / (size * 0.5)) as usize;
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut truncated: String = text.chars().take(max_chars - 3).collect();
    truncated.push_str("...");
    truncated
}

#[derive(Debug, Clone)]
pub struct Page {
    width: f32,
    height: f32,
    content: String,
}

impl Page {
    fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            content: String::new(),
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn text(&mut self, x: f32, y: f32, size: f32, font: Font, text: &str) {
        let _ = writeln!(
            self.content,
            "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET",
            font.resource(),
            size,
            x,
            y,
            escape_text(text)
        );
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        let _ = writeln!(
            self.content,
            "{:.2} {:.2} m {:.2} {:.2} l S",
            x1, y1, x2, y2
        );
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let _ = writeln!(
            self.content,
            "{:.2} {:.2} {:.2} {:.2} re S",
            x, y, width, height
        );
    }

    /// Filled rectangle in the given gray level (0 black, 1 white).
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, gray: f32) {
        let _ = writeln!(
            self.content,
            "q {:.2} g {:.2} {:.2} {:.2} {:.2} re f Q",
            gray.clamp(0.0, 1.0),
            x,
            y,
            width,
            height
        );
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone)]
pub struct PdfDocument {
    width: f32,
    height: f32,
    title: String,
    author: String,
    pages: Vec<Page>,
}

impl PdfDocument {
    pub fn new(page_size: PageSize, orientation: Orientation) -> Self {
        let (w, h) = page_size.dimensions();
        let (width, height) = match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        };
        Self {
            width,
            height,
            title: String::new(),
            author: String::new(),
            pages: Vec::new(),
        }
    }

    pub fn with_info(mut self, title: impl Into<String>, author: impl Into<String>) -> Self {
        self.title = title.into();
        self.author = author.into();
        self
    }

    pub fn add_page(&mut self) -> &mut Page {
        self.pages.push(Page::new(self.width, self.height));
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let blank;
        let pages: &[Page] = if self.pages.is_empty() {
            blank = [Page::new(self.width, self.height)];
            &blank
        } else {
            &self.pages
        };

        let mut out: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        // 1 catalog, 2 page tree, 3-4 fonts, 5 info, then (page, content) pairs
        let first_page_obj = 6;
        let kids = (0..pages.len())
            .map(|i| format!("{} 0 R", first_page_obj + i * 2))
            .collect::<Vec<_>>()
            .join(" ");

        push_object(&mut out, &mut offsets, "<< /Type /Catalog /Pages 2 0 R >>".as_bytes());
        push_object(
            &mut out,
            &mut offsets,
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, pages.len()).as_bytes(),
        );
        push_object(
            &mut out,
            &mut offsets,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        );
        push_object(
            &mut out,
            &mut offsets,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
        );
        push_object(
            &mut out,
            &mut offsets,
            format!(
                "<< /Title ({}) /Author ({}) /Producer (sentry-export) /CreationDate (D:{}) >>",
                escape_text(&self.title),
                escape_text(&self.author),
                Local::now().format("%Y%m%d%H%M%S")
            )
            .as_bytes(),
        );

        for (i, page) in pages.iter().enumerate() {
            let contents_obj = first_page_obj + i * 2 + 1;
            push_object(
                &mut out,
                &mut offsets,
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                    page.width, page.height, contents_obj
                )
                .as_bytes(),
            );
            let stream = page.content.as_bytes();
            let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            body.extend_from_slice(stream);
            body.extend_from_slice(b"\nendstream");
            push_object(&mut out, &mut offsets, &body);
        }

        let xref_offset = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1);
        for offset in &offsets {
            let _ = writeln!(xref, "{:010} 00000 n ", offset);
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_offset
        );
        out.extend_from_slice(xref.as_bytes());
        out
    }

    /// Writes the document and returns the number of bytes written.
    pub fn save(&self, path: &Path) -> io::Result<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = self.to_bytes();
        fs::write(path, &bytes)?;
        Ok(bytes.len() as u64)
    }
}

fn push_object(out: &mut Vec<u8>, offsets: &mut Vec<usize>, body: &[u8]) {
    offsets.push(out.len());
    let number = offsets.len();
    out.extend_from_slice(format!("{} 0 obj\n", number).as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
}

/// Escapes a string literal for a content stream, mapping to WinAnsi codes.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' | '\r' | '\t' => escaped.push(' '),
            ' '..='~' => escaped.push(c),
            _ => match win_ansi_code(c) {
                Some(code) => {
                    let _ = write!(escaped, "\\{:03o}", code);
                }
                None => escaped.push('?'),
            },
        }
    }
    escaped
}

fn win_ansi_code(c: char) -> Option<u8> {
    match c {
        '\u{A0}'..='\u{FF}' => Some(c as u32 as u8),
        '€' => Some(0x80),
        '‘' => Some(0x91),
        '’' => Some(0x92),
        '“' => Some(0x93),
        '”' => Some(0x94),
        '•' => Some(0x95),
        '–' => Some(0x96),
        '—' => Some(0x97),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 20), 1);
        assert_eq!(page_count(1, 20), 1);
        assert_eq!(page_count(20, 20), 1);
        assert_eq!(page_count(21, 20), 2);
        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(5, 0), 1);
    }

    #[test]
    fn test_page_slice() {
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(page_slice(&items, 0, 10).len(), 10);
        assert_eq!(page_slice(&items, 2, 10), &[20, 21, 22, 23, 24]);
        assert!(page_slice(&items, 3, 10).is_empty());
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape_text("Não"), "N\\343o");
        assert_eq!(escape_text("Página"), "P\\341gina");
        assert_eq!(escape_text("漢"), "?");
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short", 100.0, 8.0), "short");
        // 8pt ≈ 4pt per char: 40pt holds 10 chars
        assert_eq!(truncate_to_width("a very long cell value", 40.0, 8.0), "a very ...");
    }

    #[test]
    fn test_document_structure() {
        let mut doc = PdfDocument::new(PageSize::A4, Orientation::Portrait).with_info("Test", "Sentry");
        doc.add_page().text(50.0, 800.0, 12.0, Font::Bold, "Hello");
        doc.add_page().line(0.0, 0.0, 10.0, 10.0);
        assert_eq!(doc.page_count(), 2);

        let bytes = doc.to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("/Kids [6 0 R 8 0 R]"));
        assert!(text.contains("(Hello) Tj"));
        assert!(text.trim_end().ends_with("%%EOF"));

        // xref 的偏移量必須指向物件開頭
        let xref_pos = text.rfind("startxref\n").unwrap();
        let xref_offset: usize = text[xref_pos + 10..].lines().next().unwrap().parse().unwrap();
        let xref_text = std::str::from_utf8(&bytes[xref_offset..]).unwrap();
        assert!(xref_text.starts_with("xref"));
        let first_entry = xref_text.lines().nth(3).unwrap();
        let obj_offset: usize = first_entry[..10].parse().unwrap();
        assert!(bytes[obj_offset..].starts_with(b"1 0 obj"));
    }

    #[test]
    fn test_landscape_swaps_dimensions() {
        let mut doc = PdfDocument::new(PageSize::A5, Orientation::Landscape);
        let page = doc.add_page();
        assert!(page.width() > page.height());
    }

    #[test]
    fn test_empty_document_still_has_a_page() {
        let doc = PdfDocument::new(PageSize::Letter, Orientation::Portrait);
        let text = String::from_utf8_lossy(&doc.to_bytes()).into_owned();
        assert!(text.contains("/Count 1"));
    }
}
