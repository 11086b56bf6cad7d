//! Body decode: the 24×40 control-code state machine
//!
//! Each row is decoded independently. Attribute codes occupy a cell (text
//! mode renders them as a space) and take effect from the next cell on,
//! except double-size and hold-mosaic which apply before the cell is drawn.

use crate::decoder::links::{is_excluded, LinkMatcher};
use crate::page::PageId;
use std::collections::HashSet;
use std::fmt::Write;

pub const ROWS: usize = 24;
pub const COLS: usize = 40;
pub const GRID_SIZE: usize = ROWS * COLS;

/// Row carrying the fastext labels
const FASTEXT_ROW: usize = ROWS - 1;

/// Mosaic glyphs drawn as lines that can be merged into one wide cell
const LINE_GLYPHS: &[u8] = &[32, 35, 44, 47, 112, 124, 127];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    /// Maps the low three bits of a color control code
    fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => Self::Black,
            1 => Self::Red,
            2 => Self::Green,
            3 => Self::Yellow,
            4 => Self::Blue,
            5 => Self::Magenta,
            6 => Self::Cyan,
            _ => Self::White,
        }
    }

    fn class(self) -> &'static str {
        match self {
            Self::Black => "bl",
            Self::Red => "r",
            Self::Green => "g",
            Self::Yellow => "y",
            Self::Blue => "b",
            Self::Magenta => "m",
            Self::Cyan => "c",
            Self::White => "w",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lining {
    Contiguous,
    Separated,
}

impl Lining {
    fn class(self) -> &'static str {
        match self {
            Self::Contiguous => "c",
            Self::Separated => "s",
        }
    }
}

/// Attribute state, reset at the start of every row
#[derive(Debug, Clone)]
struct RowState {
    text_mode: bool,
    double_size: bool,
    back_color: Color,
    text_color: Color,
    lining: Lining,
    hold_mosaic: Option<u8>,
    div_position: usize,
    fast_link_position: usize,
}

impl RowState {
    fn new() -> Self {
        Self {
            text_mode: true,
            double_size: false,
            back_color: Color::Black,
            text_color: Color::White,
            lining: Lining::Contiguous,
            hold_mosaic: None,
            div_position: 0,
            fast_link_position: 0,
        }
    }

    /// Controls that act on the cell they occupy
    fn apply_pre_controls(&mut self, row: &[u8], col: usize) {
        match row[col] {
            12 => self.double_size = false,
            13 => self.double_size = true,
            30 => {
                self.hold_mosaic = col
                    .checked_sub(1)
                    .map(|prev| row[prev])
                    .filter(|&glyph| glyph > 0 && glyph < 128);
            }
            31 => self.hold_mosaic = None,
            _ => {}
        }
    }

    /// Controls that act from the next cell on
    fn apply_post_controls(&mut self, code: u8) {
        match code {
            0..=7 => {
                self.text_mode = true;
                self.text_color = Color::from_code(code);
            }
            16..=23 => {
                self.text_mode = false;
                self.text_color = Color::from_code(code);
            }
            25 => self.lining = Lining::Contiguous,
            26 => {
                self.lining = Lining::Separated;
                self.text_color = Color::White;
            }
            28 => self.back_color = Color::Black,
            29 => self.back_color = self.text_color,
            _ => {}
        }
    }
}

/// Renders the character for a text-mode byte
///
/// Bytes above 32 are Latin-1 characters; everything else is a space.
fn glyph_char(byte: u8) -> char {
    if byte > 32 {
        char::from(byte)
    } else {
        ' '
    }
}

/// Writes the markup for one page body
pub(crate) struct BodyWriter<'a> {
    matcher: &'a LinkMatcher,
    fast_links: &'a [PageId],
    run: &'a mut String,
    html: String,
    linked: Vec<PageId>,
    seen: HashSet<PageId>,
}

impl<'a> BodyWriter<'a> {
    /// Creates a writer; `run` is scratch space reused between decodes
    pub(crate) fn new(matcher: &'a LinkMatcher, fast_links: &'a [PageId], run: &'a mut String) -> Self {
        run.clear();
        Self {
            matcher,
            fast_links,
            run,
            html: String::with_capacity(GRID_SIZE * 48),
            linked: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Decodes a full grid of `GRID_SIZE` bytes
    pub(crate) fn render(&mut self, grid: &[u8]) {
        for (row_index, row) in grid.chunks_exact(COLS).take(ROWS).enumerate() {
            self.render_row(row_index, row);
        }
    }

    /// Returns the markup and the linked page ids in order of first occurrence
    pub(crate) fn finish(self) -> (String, Vec<PageId>) {
        (self.html, self.linked)
    }

    fn render_row(&mut self, row_index: usize, row: &[u8]) {
        let mut state = RowState::new();
        self.run.clear();

        let mut col = 0;
        while col < COLS {
            let code = row[col];
            state.apply_pre_controls(row, col);
            if state.text_mode {
                self.text_byte(&mut state, row_index, col, code);
            } else {
                col += self.mosaic_byte(&mut state, row_index, row, col);
            }
            state.apply_post_controls(code);
            col += 1;
        }
    }

    fn text_byte(&mut self, state: &mut RowState, row_index: usize, col: usize, code: u8) {
        self.run.push(glyph_char(code));
        if code >= 32 && col < COLS - 1 {
            return;
        }

        let width = self.run.chars().count();
        let (class, height) = if state.double_size { ("t1", 2) } else { ("t", 1) };
        let _ = write!(
            self.html,
            "<div class=\"{} x{} y{} h{} w{} b{} t{}\" data-m=\"{}\">",
            class,
            state.div_position,
            row_index,
            height,
            width,
            state.back_color.class(),
            state.text_color.class(),
            code
        );

        let line = std::mem::take(&mut *self.run);
        if row_index == FASTEXT_ROW {
            self.write_fastext_line(state, &line);
        } else {
            self.write_linked_line(&line);
        }
        self.html.push_str("</div>\n");
        state.div_position += width;

        // Hand the allocation back for the next run
        *self.run = line;
        self.run.clear();
    }

    fn write_fastext_line(&mut self, state: &mut RowState, line: &str) {
        let fast_links = self.fast_links;
        let target = fast_links.get(state.fast_link_position);
        match (self.matcher.fastext(line), target) {
            (Some(range), Some(target)) => {
                state.fast_link_position += 1;
                push_escaped(&mut self.html, &line[..range.start]);
                let _ = write!(self.html, "<a href=\"{}\">", target.to_internal_link());
                push_escaped(&mut self.html, &line[range.clone()]);
                self.html.push_str("</a>");
                push_escaped(&mut self.html, &line[range.end..]);
            }
            _ => push_escaped(&mut self.html, line),
        }
    }

    fn write_linked_line(&mut self, line: &str) {
        let mut last = 0;
        for range in self.matcher.page_links(line) {
            let token = &line[range.clone()];
            if is_excluded(token) {
                continue;
            }

            let page_id = PageId::normalize(token);
            push_escaped(&mut self.html, &line[last..range.start]);
            let _ = write!(
                self.html,
                "<a href=\"{}\">{}</a>",
                page_id.to_internal_link(),
                token
            );
            last = range.end;

            if self.seen.insert(page_id.clone()) {
                self.linked.push(page_id);
            }
        }
        push_escaped(&mut self.html, &line[last..]);
    }

    /// Draws one mosaic cell, or a merged run of line glyphs
    ///
    /// Returns the number of extra columns consumed by a merged run.
    fn mosaic_byte(&mut self, state: &mut RowState, row_index: usize, row: &[u8], col: usize) -> usize {
        let code = row[col];
        if (65..96).contains(&code) {
            let _ = write!(
                self.html,
                "<div class=\"t x{} y{} h1 w1 b{} t{}\" data-m=\"{}\">{}</div>",
                state.div_position,
                row_index,
                state.back_color.class(),
                state.text_color.class(),
                code,
                char::from(code)
            );
            state.div_position += 1;
            return 0;
        }

        let glyph = if code < 32 || code >= 128 {
            state.hold_mosaic.unwrap_or(32)
        } else {
            code
        };

        let mut width = 1;
        if state.lining == Lining::Contiguous && LINE_GLYPHS.contains(&glyph) {
            while col + width < COLS && row[col + width] == glyph {
                width += 1;
            }
        }

        let _ = write!(
            self.html,
            "<div class=\"t x{} y{} h1 w{} b{} t{}\" data-m=\"{}\"><svg>",
            state.div_position,
            row_index,
            width,
            state.back_color.class(),
            state.text_color.class(),
            glyph
        );

        if width > 1 {
            if glyph != 32 {
                let _ = write!(self.html, "<use xlink:href=\"#lc{}\" />", glyph);
            }
        } else {
            let lining = state.lining.class();
            for bit in 0..5 {
                if glyph & (1 << bit) != 0 {
                    let _ = write!(self.html, "<use xlink:href=\"#p{}{}\" />", lining, bit);
                }
            }
            if glyph & (1 << 6) != 0 {
                let _ = write!(self.html, "<use xlink:href=\"#p{}5\" />", lining);
            }
        }
        self.html.push_str("</svg></div>\n");

        state.div_position += width;
        width - 1
    }
}

fn push_escaped(html: &mut String, text: &str) {
    html_escape::encode_text_to_string(text, html);
}
