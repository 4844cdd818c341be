use printpdf::{BuiltinFont, Mm, PdfDocument};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 20.0;
const TITLE_PT: f32 = 14.0;
const BODY_PT: f32 = 11.0;
const LINE_MM: f32 = 5.6;
/// Characters per body line at 11pt Helvetica across the text width.
const WRAP_COLS: usize = 88;

/// Renders a titled plain-text letter to PDF bytes.
pub trait PdfRenderer: Send + Sync {
    fn render(&self, title: &str, body: &str) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LetterRenderer;

impl PdfRenderer for LetterRenderer {
    fn render(&self, title: &str, body: &str) -> anyhow::Result<Vec<u8>> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "letter");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow::anyhow!("load helvetica: {e:?}"))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow::anyhow!("load helvetica bold: {e:?}"))?;

        let mut current = doc.get_page(page).get_layer(layer);
        let mut y = PAGE_H - MARGIN;
        current.use_text(title, TITLE_PT, Mm(MARGIN), Mm(y), &bold);
        y -= LINE_MM * 2.0;

        for line in wrap_text(body, WRAP_COLS) {
            if y < MARGIN {
                let (p, l) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "letter");
                current = doc.get_page(p).get_layer(l);
                y = PAGE_H - MARGIN;
            }
            if !line.is_empty() {
                current.use_text(line, BODY_PT, Mm(MARGIN), Mm(y), &regular);
            }
            y -= LINE_MM;
        }

        doc.save_to_bytes()
            .map_err(|e| anyhow::anyhow!("write pdf: {e:?}"))
    }
}

/// Greedy word wrap. Input newlines are kept; blank lines stay blank and
/// words longer than `cols` are split.
pub(crate) fn wrap_text(text: &str, cols: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        let mut len = 0;
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > cols {
                if len > 0 {
                    lines.push(std::mem::take(&mut line));
                    len = 0;
                }
                let rest = word.split_off(cols);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            if len > 0 && len + 1 + word.len() > cols {
                lines.push(std::mem::take(&mut line));
                len = 0;
            }
            if len > 0 {
                line.push(' ');
                len += 1;
            }
            len += word.len();
            line.extend(word);
        }
        lines.push(line);
    }
    lines
}
