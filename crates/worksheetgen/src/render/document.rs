//! Printable worksheet as a single US Letter PDF page.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::images::{ImageMap, LoadedImage};
use super::{Artifact, ArtifactKind, DocumentRenderer};
use crate::error::RenderError;
use crate::model::{Element, Position, Size, TextStyle, WorksheetSpec, PAGE_HEIGHT, PAGE_WIDTH};

const MARGIN_X: f32 = 50.0;
const TITLE_FONT_SIZE: f32 = 16.0;
const TITLE_OFFSET: f32 = 50.0;
const INSTRUCTIONS_FONT_SIZE: f32 = 10.0;
const INSTRUCTIONS_OFFSET: f32 = 80.0;
const INSTRUCTIONS_LINE_HEIGHT: f32 = 15.0;
const INSTRUCTIONS_WRAP: usize = 80;
const LABEL_FONT_SIZE: f32 = 10.0;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

/// lopdf-based [`DocumentRenderer`].
#[derive(Debug, Clone, Default)]
pub struct PdfDocumentRenderer;

impl PdfDocumentRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentRenderer for PdfDocumentRenderer {
    fn render(&self, spec: &WorksheetSpec, images: &ImageMap) -> Result<Artifact, RenderError> {
        let bytes = create_worksheet_pdf(spec, images)?;
        Ok(Artifact::new(ArtifactKind::Document, bytes))
    }
}

/// Converts a top-left based y coordinate to PDF's bottom-left origin.
fn pdf_y(y: f32) -> f32 {
    PAGE_HEIGHT - y
}

/// Greedy word wrap: a line is flushed before it would reach `width` characters.
pub(crate) fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + word.chars().count() >= width {
            lines.push(line.trim_end().to_string());
            line.clear();
        }
        line.push_str(word);
        line.push(' ');
    }
    if !line.trim().is_empty() {
        lines.push(line.trim_end().to_string());
    }
    lines
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            c if c.is_ascii() && !c.is_control() => c.to_string(),
            _ => " ".to_string(),
        })
        .collect()
}

/// Accumulates page content operators and the image XObjects they reference.
struct PageBuilder {
    content: String,
    xobjects: Vec<(String, Stream)>,
}

impl PageBuilder {
    fn new() -> Self {
        Self {
            content: String::new(),
            xobjects: Vec::new(),
        }
    }

    fn text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
        self.content.push_str(&format!(
            "BT\n/{} {} Tf\n{} {} Td\n({}) Tj\nET\n",
            font,
            fmt_num(size),
            fmt_num(x),
            fmt_num(y),
            escape_pdf_string(text)
        ));
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.content.push_str(&format!(
            "q\n0.75 w\n{} {} {} {} re\nS\nQ\n",
            fmt_num(x),
            fmt_num(y),
            fmt_num(width),
            fmt_num(height)
        ));
    }

    fn image(&mut self, image: &LoadedImage, x: f32, y: f32, width: f32, height: f32) {
        let name = format!("Im{}", self.xobjects.len() + 1);
        self.content.push_str(&format!(
            "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
            fmt_num(width),
            fmt_num(height),
            fmt_num(x),
            fmt_num(y),
            name
        ));
        self.xobjects.push((name, image_xobject(image)));
    }
}

/// Formats a coordinate with at most two decimals and no trailing zeros.
fn fmt_num(value: f32) -> String {
    let formatted = format!("{:.2}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn image_xobject(image: &LoadedImage) -> Stream {
    if image.is_jpeg() {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.bytes.clone(),
        )
    } else {
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.to_rgb(),
        );
        // Raw pixels compress well; a failed compression leaves them unfiltered.
        let _ = stream.compress();
        stream
    }
}

/// Fits an image of `image_w x image_h` into `size`, keeping aspect ratio
/// and centering it. Returns (x offset, y offset, width, height).
fn fit_into(image_w: u32, image_h: u32, size: Size) -> (f32, f32, f32, f32) {
    let scale = (size.width / image_w as f32).min(size.height / image_h as f32);
    let width = image_w as f32 * scale;
    let height = image_h as f32 * scale;
    (
        (size.width - width) / 2.0,
        (size.height - height) / 2.0,
        width,
        height,
    )
}

fn draw_element(page: &mut PageBuilder, element: &Element, images: &ImageMap) {
    match element {
        Element::Text {
            content,
            position,
            style,
        } => draw_text(page, content, *position, *style),
        Element::InputField {
            placeholder,
            position,
            size,
        } => {
            let top = pdf_y(position.y);
            page.rect(position.x, top - size.height, size.width, size.height);
            if !placeholder.is_empty() {
                page.text(
                    FONT_REGULAR,
                    LABEL_FONT_SIZE,
                    position.x + 5.0,
                    top - size.height + 5.0,
                    placeholder,
                );
            }
        }
        Element::Image {
            description,
            position,
            size,
        } => {
            let top = pdf_y(position.y);
            let bottom = top - size.height;
            match images.load(description) {
                Some(image) => {
                    let (dx, dy, width, height) = fit_into(image.width, image.height, *size);
                    page.image(&image, position.x + dx, bottom + dy, width, height);
                }
                None => {
                    page.rect(position.x, bottom, size.width, size.height);
                    page.text(
                        FONT_REGULAR,
                        LABEL_FONT_SIZE,
                        position.x + 5.0,
                        top - 10.0 - LABEL_FONT_SIZE / 2.0,
                        &format!("[Image: {}]", description),
                    );
                }
            }
        }
    }
}

fn draw_text(page: &mut PageBuilder, content: &str, position: Position, style: TextStyle) {
    let font = if style.bold { FONT_BOLD } else { FONT_REGULAR };
    let line_height = style.font_size * 1.2;
    for (index, line) in content.lines().enumerate() {
        let y = pdf_y(position.y) - index as f32 * line_height;
        page.text(font, style.font_size, position.x, y, line);
    }
}

fn build_content(spec: &WorksheetSpec, images: &ImageMap) -> PageBuilder {
    let mut page = PageBuilder::new();

    page.text(
        FONT_BOLD,
        TITLE_FONT_SIZE,
        MARGIN_X,
        PAGE_HEIGHT - TITLE_OFFSET,
        &spec.title,
    );

    let mut y = PAGE_HEIGHT - INSTRUCTIONS_OFFSET;
    for line in wrap_text(&spec.instructions, INSTRUCTIONS_WRAP) {
        page.text(FONT_REGULAR, INSTRUCTIONS_FONT_SIZE, MARGIN_X, y, &line);
        y -= INSTRUCTIONS_LINE_HEIGHT;
    }

    for element in &spec.elements {
        draw_element(&mut page, element, images);
    }

    page
}

fn font_object(base_font: &str) -> Object {
    Object::Dictionary(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    })
}

fn create_worksheet_pdf(spec: &WorksheetSpec, images: &ImageMap) -> Result<Vec<u8>, RenderError> {
    let page = build_content(spec, images);

    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(font_object("Helvetica"));
    let bold_id = doc.add_object(font_object("Helvetica-Bold"));

    let mut xobjects = Dictionary::new();
    for (name, stream) in page.xobjects {
        let id: ObjectId = doc.add_object(Object::Stream(stream));
        xobjects.set(name, id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => regular_id,
            FONT_BOLD => bold_id,
        },
        "XObject" => xobjects,
    });

    let content_id = doc.add_object(Stream::new(dictionary! {}, page.content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), (PAGE_WIDTH as i64).into(), (PAGE_HEIGHT as i64).into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    Ok(buffer)
}
