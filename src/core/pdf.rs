//! Minimal A4 table writer on top of `pdf-writer`.
//!
//! Uses the built-in Helvetica font, so text must stay within WinAnsi
//! (no rupee sign, no Kannada). Long tables continue on new pages with the
//! header row repeated.

use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};

const PAGE_W: f32 = 595.0;
const PAGE_H: f32 = 842.0;
const MARGIN: f32 = 45.0;
const ROW_H: f32 = 20.0;
const FONT_SIZE: f32 = 9.5;
const HEADER_FONT_SIZE: f32 = 10.5;
const TITLE_FONT_SIZE: f32 = 15.0;

/// A table to render.
#[derive(Debug, Clone)]
pub struct PdfTable<'a> {
    pub title: &'a str,
    pub subtitle: &'a str,
    pub headers: &'a [&'a str],
    pub rows: &'a [Vec<String>],
    /// Printed under the rows of the last page
    pub footer: Option<String>,
}

pub struct PdfManager {
    pdf: Pdf,
    catalog_id: Ref,
    pages_id: Ref,
    font_id: Ref,
    page_refs: Vec<Ref>,
    next_id: i32,
}

impl Default for PdfManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfManager {
    #[must_use]
    pub fn new() -> Self {
        let mut pdf = Pdf::new();
        let font_id = Ref::new(3);
        pdf.type1_font(font_id).base_font(Name(b"Helvetica"));

        Self {
            pdf,
            catalog_id: Ref::new(1),
            pages_id: Ref::new(2),
            font_id,
            page_refs: Vec::new(),
            next_id: 4,
        }
    }

    fn fresh_ref(&mut self) -> Ref {
        let id = self.next_id;
        self.next_id += 1;
        Ref::new(id)
    }

    fn add_page(&mut self, content: Content) {
        let page_id = self.fresh_ref();
        let content_id = self.fresh_ref();
        self.page_refs.push(page_id);

        let mut page = self.pdf.page(page_id);
        page.parent(self.pages_id)
            .media_box(Rect::new(0.0, 0.0, PAGE_W, PAGE_H))
            .contents(content_id);
        page.resources().fonts().pair(Name(b"F1"), self.font_id);
        page.finish();

        self.pdf.stream(content_id, &content.finish());
    }

    /// Renders `table` across as many pages as it needs.
    pub fn write_table(&mut self, table: &PdfTable<'_>) {
        let widths = column_widths(table.headers, table.rows);
        let header_row: Vec<String> = table.headers.iter().map(ToString::to_string).collect();
        let top = PAGE_H - MARGIN - 50.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rows_per_page = (((top - MARGIN - ROW_H) / ROW_H).floor() as usize).max(1);

        let chunks: Vec<&[Vec<String>]> = if table.rows.is_empty() {
            vec![&[]]
        } else {
            table.rows.chunks(rows_per_page).collect()
        };
        let page_count = chunks.len();

        for (page_idx, chunk) in chunks.into_iter().enumerate() {
            let mut content = Content::new();
            draw_text(&mut content, MARGIN, PAGE_H - MARGIN, TITLE_FONT_SIZE, table.title);
            draw_text(&mut content, MARGIN, PAGE_H - MARGIN - 18.0, FONT_SIZE, table.subtitle);
            draw_text(
                &mut content,
                PAGE_W - MARGIN - 70.0,
                MARGIN - 25.0,
                FONT_SIZE,
                &format!("Page {} of {}", page_idx + 1, page_count),
            );

            let mut y = top;
            fill_band(&mut content, y, &widths, (0.80, 0.90, 0.82));
            draw_row(&mut content, y, &widths, &header_row, HEADER_FONT_SIZE);
            y -= ROW_H;

            for (i, row) in chunk.iter().enumerate() {
                if i % 2 == 1 {
                    fill_band(&mut content, y, &widths, (0.96, 0.96, 0.96));
                }
                draw_row(&mut content, y, &widths, row, FONT_SIZE);
                y -= ROW_H;
            }

            if page_idx + 1 == page_count {
                if let Some(footer) = &table.footer {
                    draw_text(&mut content, MARGIN + 4.0, y - 6.0, HEADER_FONT_SIZE, footer);
                }
            }

            self.add_page(content);
        }
    }

    /// Finishes the document and returns its bytes.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.pdf.catalog(self.catalog_id).pages(self.pages_id);
        let count = i32::try_from(self.page_refs.len()).unwrap_or(i32::MAX);
        self.pdf
            .pages(self.pages_id)
            .kids(self.page_refs.iter().copied())
            .count(count);
        self.pdf.finish()
    }
}

fn draw_text(content: &mut Content, x: f32, y: f32, size: f32, text: &str) {
    let encoded = to_win_ansi(text);
    content.begin_text();
    content.set_font(Name(b"F1"), size);
    content.set_text_matrix([1.0, 0.0, 0.0, 1.0, x, y]);
    content.show(Str(&encoded));
    content.end_text();
}

fn fill_band(content: &mut Content, y: f32, widths: &[f32], rgb: (f32, f32, f32)) {
    content.save_state();
    content.set_fill_rgb(rgb.0, rgb.1, rgb.2);
    content.rect(MARGIN, y, widths.iter().sum(), ROW_H);
    content.fill_nonzero();
    content.restore_state();
}

fn draw_row(content: &mut Content, y: f32, widths: &[f32], cells: &[String], size: f32) {
    let mut x = MARGIN;
    for (cell, w) in cells.iter().zip(widths) {
        draw_text(content, x + 4.0, y + 6.0, size, &clip(cell, *w, size));
        content.save_state();
        content.set_stroke_rgb(0.7, 0.7, 0.7);
        content.rect(x, y, *w, ROW_H);
        content.stroke();
        content.restore_state();
        x += w;
    }
}

/// Column widths from the longest cell per column, scaled to the page.
#[allow(clippy::cast_precision_loss)]
fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<f32> {
    let mut widths: Vec<f32> = headers
        .iter()
        .map(|h| h.chars().count() as f32 * 6.5 + 10.0)
        .collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = w.max(cell.chars().count() as f32 * 5.6 + 10.0);
        }
    }

    let total: f32 = widths.iter().sum();
    let available = PAGE_W - 2.0 * MARGIN;
    if total > 0.0 {
        let scale = available / total;
        for w in &mut widths {
            *w *= scale;
        }
    }
    widths
}

/// Truncates text that would overflow a cell.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clip(text: &str, width: f32, size: f32) -> String {
    let max_chars = ((width - 8.0) / (size * 0.52)).max(1.0) as usize;
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        clipped.push_str("...");
        clipped
    }
}

/// Maps text to single-byte WinAnsi, replacing anything outside it with `?`.
fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => u8::try_from(u32::from(c)).unwrap_or(b'?'),
            _ => b'?',
        })
        .collect()
}
