//! PDF export of a conversation log.
//!
//! Each turn becomes a role-prefixed entry (`"You: ..."`), word-wrapped to
//! the page width and flowed across A4 pages in the builtin Helvetica font.
//! Builtin fonts only cover Latin-1, so other characters are replaced.

use printpdf::{BuiltinFont, Mm, PdfDocument};

use parley_core::config::ExportConfig;
use parley_core::types::{Role, Turn};

use crate::error::ChatError;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const PT_TO_MM: f32 = 0.3528;
const LINE_SPACING: f32 = 1.4;
const USABLE_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;

/// Helvetica advance widths (1/1000 em) for U+0020..=U+007E.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Helvetica advance widths (1/1000 em) for U+00A0..=U+00FF.
const HELVETICA_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

/// Advance width of a sanitized character in 1/1000 em.
fn glyph_width(c: char) -> u32 {
    let code = c as usize;
    let width = match code {
        0x20..=0x7E => HELVETICA_ASCII[code - 0x20],
        0xA0..=0xFF => HELVETICA_LATIN1[code - 0xA0],
        _ => HELVETICA_ASCII['?' as usize - 0x20],
    };
    u32::from(width)
}

fn text_width(text: &str) -> u32 {
    text.chars().map(glyph_width).sum()
}

/// Labels and sizing of the exported document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub user_label: String,
    pub assistant_label: String,
    pub font_size: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            user_label: config.user_label.clone(),
            assistant_label: config.assistant_label.clone(),
            font_size: config.font_size,
        }
    }
}

impl ExportOptions {
    fn label(&self, role: Role) -> &str {
        match role {
            Role::User => &self.user_label,
            Role::Assistant => &self.assistant_label,
        }
    }

    fn line_height_mm(&self) -> f32 {
        self.font_size * PT_TO_MM * LINE_SPACING
    }

    /// Usable line width in 1/1000 em at the configured font size.
    fn line_width(&self) -> u32 {
        (USABLE_WIDTH_MM * 1000.0 / (self.font_size * PT_TO_MM)) as u32
    }

    fn lines_per_page(&self) -> usize {
        (((PAGE_HEIGHT_MM - 2.0 * MARGIN_MM) / self.line_height_mm()) as usize).max(1)
    }
}

/// Role-prefixed entries, one per turn, in log order.
pub fn entries(turns: &[Turn], options: &ExportOptions) -> Vec<String> {
    turns
        .iter()
        .map(|turn| format!("{}: {}", options.label(turn.role), turn.text))
        .collect()
}

/// Replace characters the builtin fonts cannot show.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if c.is_control() => ' ',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

/// Split a word into pieces no wider than `max_width`.
///
/// Every piece holds at least one character.
fn split_word(word: &str, max_width: u32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut width = 0;
    for c in word.chars() {
        let advance = glyph_width(c);
        if !piece.is_empty() && width + advance > max_width {
            pieces.push(std::mem::take(&mut piece));
            width = 0;
        }
        piece.push(c);
        width += advance;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Greedy word wrap by measured glyph width. Words wider than a line are split.
fn wrap(text: &str, max_width: u32) -> Vec<String> {
    let space = glyph_width(' ');
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0;
        for word in paragraph.split_whitespace() {
            for piece in split_word(word, max_width) {
                let piece_width = text_width(&piece);
                if !line.is_empty() && line_width + space + piece_width > max_width {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0;
                }
                if !line.is_empty() {
                    line.push(' ');
                    line_width += space;
                }
                line.push_str(&piece);
                line_width += piece_width;
            }
        }
        lines.push(line);
    }
    lines
}

/// Wrapped lines of the whole log split into pages.
///
/// An empty log yields a single empty page.
pub fn layout(turns: &[Turn], options: &ExportOptions) -> Vec<Vec<String>> {
    let width = options.line_width();
    let lines: Vec<String> = entries(turns, options)
        .iter()
        .flat_map(|entry| wrap(&sanitize(entry), width))
        .collect();

    if lines.is_empty() {
        return vec![Vec::new()];
    }
    lines
        .chunks(options.lines_per_page())
        .map(|page| page.to_vec())
        .collect()
}

/// Render the log as a PDF document.
pub fn render_pdf(turns: &[Turn], options: &ExportOptions) -> Result<Vec<u8>, ChatError> {
    let pages = layout(turns, options);
    let (doc, first_page, first_layer) = PdfDocument::new(
        "Chat History",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ChatError::Export(e.to_string()))?;

    let line_height = options.line_height_mm();
    let top = PAGE_HEIGHT_MM - MARGIN_MM - options.font_size * PT_TO_MM;

    for (index, lines) in pages.iter().enumerate() {
        let (page, layer) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1")
        };
        let layer = doc.get_page(page).get_layer(layer);
        for (row, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let y = top - row as f32 * line_height;
            layer.use_text(line.clone(), options.font_size, Mm(MARGIN_MM), Mm(y), &font);
        }
    }

    doc.save_to_bytes()
        .map_err(|e| ChatError::Export(e.to_string()))
}
