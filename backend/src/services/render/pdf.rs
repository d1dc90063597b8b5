use genpdf::elements::{Break, Image as PdfImage, Paragraph};
use genpdf::style::{Style, StyledString};
use genpdf::{Alignment, Document, Size};
use image::imageops::FilterType;
use image::{load_from_memory, DynamicImage, GenericImageView};
use png::{BitDepth as PngBitDepth, ColorType as PngColorType, Encoder as PngEncoder};
use std::path::PathBuf;
use tempfile::NamedTempFile;

use common::model::template::TemplateType;

use super::markup::{markup_to_blocks, strip_style_tags, Block};
use super::{substitute, RenderError, Renderer, Variables};

/// Landscape A4, in millimetres.
const PAGE_WIDTH_MM: i32 = 297;
const PAGE_HEIGHT_MM: i32 = 210;
const MARGIN_MM: f64 = 15.0;
const IMAGE_DPI: f64 = 150.0;
const BODY_FONT_SIZE: u8 = 14;
const HEADING_FONT_SIZE: u8 = 28;
const FALLBACK_FONT_FAMILY: &str = "LiberationSans";

/// Renders certificates with genpdf. Fonts are read from `fonts_dir` on every
/// render so that a missing font only fails the affected generation.
pub struct GenpdfRenderer {
    fonts_dir: PathBuf,
    font_family: String,
}

impl GenpdfRenderer {
    pub fn new(fonts_dir: impl Into<PathBuf>, font_family: impl Into<String>) -> Self {
        GenpdfRenderer {
            fonts_dir: fonts_dir.into(),
            font_family: font_family.into(),
        }
    }

    fn load_font(&self) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>, RenderError> {
        // Configured family first, then LiberationSans from the same directory.
        if let Ok(family) = genpdf::fonts::from_files(&self.fonts_dir, &self.font_family, None) {
            return Ok(family);
        }
        genpdf::fonts::from_files(&self.fonts_dir, FALLBACK_FONT_FAMILY, None).map_err(|e| {
            RenderError::Font(format!(
                "neither {} nor {} found in {}: {}",
                self.font_family,
                FALLBACK_FONT_FAMILY,
                self.fonts_dir.display(),
                e
            ))
        })
    }

    fn configure_document(&self, title: &str) -> Result<Document, RenderError> {
        let mut doc = Document::new(self.load_font()?);
        doc.set_title(title);
        doc.set_paper_size(Size::new(PAGE_WIDTH_MM, PAGE_HEIGHT_MM));
        doc.set_font_size(BODY_FONT_SIZE);
        doc.set_line_spacing(1.25);

        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(MARGIN_MM as i32);
        doc.set_page_decorator(decorator);
        Ok(doc)
    }
}

impl Renderer for GenpdfRenderer {
    fn render(&self, kind: TemplateType, markup: &str, variables: &Variables) -> Result<Vec<u8>, RenderError> {
        let filled = substitute(markup, variables);
        let blocks = markup_to_blocks(&filled);
        if blocks.is_empty() {
            return Err(RenderError::Template(format!(
                "{} template has no visible content",
                kind.extension()
            )));
        }

        let title = variables
            .get("participant_name")
            .map(|n| format!("Certificate: {n}"))
            .unwrap_or_else(|| "Certificate".to_string());
        let mut doc = self.configure_document(&title)?;

        // Keep temporary image files alive until rendering finishes.
        let mut temp_files: Vec<NamedTempFile> = Vec::new();

        for block in blocks {
            match block {
                Block::Heading(text) => {
                    let style = Style::new().bold().with_font_size(HEADING_FONT_SIZE);
                    doc.push(Paragraph::new(StyledString::new(text, style)).aligned(Alignment::Center));
                }
                Block::Paragraph(text) => doc.push(parse_styled_paragraph(&text)),
                Block::ListItem(text) => doc.push(parse_styled_paragraph(&format!("• {text}"))),
                Block::Image(bytes) => push_image(&bytes, &mut temp_files, &mut doc)?,
                Block::Break => doc.push(Break::new(1)),
            }
        }

        let mut out = Vec::new();
        doc.render(&mut out).map_err(|e| RenderError::Pdf(e.to_string()))?;
        Ok(out)
    }
}

/// Scales an inline image to the printable width, flattens alpha over white,
/// writes it as an 8-bit RGB PNG to a temp file and embeds it.
fn push_image(
    bytes: &[u8],
    temp_files: &mut Vec<NamedTempFile>,
    doc: &mut Document,
) -> Result<(), RenderError> {
    let img = load_from_memory(bytes).map_err(|e| RenderError::Image(e.to_string()))?;

    let content_width_in = (f64::from(PAGE_WIDTH_MM) - 2.0 * MARGIN_MM) / 25.4;
    let content_height_in = (f64::from(PAGE_HEIGHT_MM) - 2.0 * MARGIN_MM) / 25.4 / 2.0;
    let (orig_w, orig_h) = img.dimensions();
    let scale = (content_width_in * IMAGE_DPI / f64::from(orig_w))
        .min(content_height_in * IMAGE_DPI / f64::from(orig_h))
        .min(1.0);

    let resized: DynamicImage = if scale >= 1.0 {
        img
    } else {
        let new_w = (f64::from(orig_w) * scale).max(1.0).round() as u32;
        let new_h = (f64::from(orig_h) * scale).max(1.0).round() as u32;
        img.resize(new_w, new_h, FilterType::Lanczos3)
    };

    let rgba = resized.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut background = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
    image::imageops::overlay(&mut background, &rgba, 0, 0);
    let raw = DynamicImage::ImageRgba8(background).to_rgb8().into_raw();

    let mut tmp = NamedTempFile::new()?;
    {
        let mut encoder = PngEncoder::new(tmp.as_file_mut(), w, h);
        encoder.set_color(PngColorType::Rgb);
        encoder.set_depth(PngBitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| RenderError::Image(e.to_string()))?;
        writer
            .write_image_data(&raw)
            .map_err(|e| RenderError::Image(e.to_string()))?;
    }

    let mut element = PdfImage::from_path(tmp.path()).map_err(|e| RenderError::Image(e.to_string()))?;
    element.set_dpi(IMAGE_DPI);
    element.set_alignment(Alignment::Center);
    temp_files.push(tmp);
    doc.push(element);
    Ok(())
}

/// Earliest opening style tag, as its letter and byte offset.
fn find_next_tag(text: &str) -> Option<(&'static str, usize)> {
    ["b", "i"]
        .into_iter()
        .filter_map(|tag| text.find(&format!("<{tag}>")).map(|pos| (tag, pos)))
        .min_by_key(|&(_, pos)| pos)
}

/// Builds a centred paragraph from text containing `<b>...</b>` and/or
/// `<i>...</i>` runs. A missing closing tag leaves the remainder plain.
fn parse_styled_paragraph(text: &str) -> Paragraph {
    let mut paragraph = Paragraph::new("").aligned(Alignment::Center);
    let mut rest = text;

    while let Some((tag, start)) = find_next_tag(rest) {
        if start > 0 {
            paragraph.push(strip_style_tags(&rest[..start]));
        }

        let (open, close, style) = if tag == "b" {
            ("<b>", "</b>", Style::new().bold())
        } else {
            ("<i>", "</i>", Style::new().italic())
        };

        match rest[start + open.len()..].find(close) {
            Some(rel_end) => {
                let styled = &rest[start + open.len()..start + open.len() + rel_end];
                paragraph.push(StyledString::new(strip_style_tags(styled), style));
                rest = &rest[start + open.len() + rel_end + close.len()..];
            }
            None => {
                paragraph.push(strip_style_tags(&rest[start..]));
                return paragraph;
            }
        }
    }

    if !rest.is_empty() {
        paragraph.push(strip_style_tags(rest));
    }
    paragraph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_earliest_style_tag() {
        assert_eq!(find_next_tag("a <i>x</i> <b>y</b>"), Some(("i", 2)));
        assert_eq!(find_next_tag("<b>y</b>"), Some(("b", 0)));
        assert_eq!(find_next_tag("plain"), None);
    }

    #[test]
    fn missing_fonts_fail_the_render_not_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = GenpdfRenderer::new(dir.path(), "Nope");
        let err = renderer
            .render(TemplateType::Html, "<p>Hello {{participant_name}}</p>", &Variables::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::Font(_)), "{err}");
    }

    #[test]
    fn empty_markup_is_a_template_error() {
        let renderer = GenpdfRenderer::new("./fonts", "Arial");
        let err = renderer
            .render(TemplateType::Svg, "<svg><rect/></svg>", &Variables::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::Template(_)));
    }
}
