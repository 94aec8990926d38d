//! Interactive worksheet as a self-contained HTML page (askama template).

use askama::Template;
use base64::Engine;

use super::images::ImageMap;
use super::{Artifact, ArtifactKind, InteractiveRenderer};
use crate::error::RenderError;
use crate::model::{Element, WorksheetSpec, PAGE_HEIGHT, PAGE_WIDTH};

/// One positioned element prepared for the template.
pub struct ElementView {
    pub kind: &'static str,
    /// Inline CSS built from numbers only.
    pub style: String,
    pub text: String,
    pub bold: bool,
    pub font_size: String,
    pub field_id: String,
    /// `data:` URI of the generated image, if one is available.
    pub image_src: Option<String>,
}

#[derive(Template)]
#[template(path = "interactive.html")]
pub struct InteractiveTemplate {
    pub title: String,
    pub instructions: String,
    pub page_width: u32,
    pub page_height: u32,
    pub storage_key: String,
    pub elements: Vec<ElementView>,
}

/// askama-based [`InteractiveRenderer`].
#[derive(Debug, Clone, Default)]
pub struct HtmlInteractiveRenderer;

impl HtmlInteractiveRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl InteractiveRenderer for HtmlInteractiveRenderer {
    fn render(&self, spec: &WorksheetSpec, images: &ImageMap) -> Result<Artifact, RenderError> {
        let html = build_template(spec, images).render()?;
        Ok(Artifact::new(ArtifactKind::Interactive, html.into_bytes()))
    }
}

fn px(value: f32) -> String {
    format!("{:.1}px", value)
}

/// Stable localStorage key for saved answers, derived from the title.
fn storage_key(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    format!("worksheet:{}", slug)
}

fn build_template(spec: &WorksheetSpec, images: &ImageMap) -> InteractiveTemplate {
    let mut field_count = 0;
    let elements = spec
        .elements
        .iter()
        .map(|element| {
            let position = element.position();
            let mut view = ElementView {
                kind: element.kind(),
                style: format!("left: {}; top: {};", px(position.x), px(position.y)),
                text: String::new(),
                bold: false,
                font_size: String::new(),
                field_id: String::new(),
                image_src: None,
            };
            match element {
                Element::Text { content, style, .. } => {
                    view.text = content.clone();
                    view.bold = style.bold;
                    view.font_size = px(style.font_size);
                }
                Element::InputField {
                    placeholder, size, ..
                } => {
                    field_count += 1;
                    view.text = placeholder.clone();
                    view.field_id = format!("field-{}", field_count);
                    view.style
                        .push_str(&format!(" width: {}; height: {};", px(size.width), px(size.height)));
                }
                Element::Image {
                    description, size, ..
                } => {
                    view.text = description.clone();
                    view.style
                        .push_str(&format!(" width: {}; height: {};", px(size.width), px(size.height)));
                    view.image_src = images.load(description).map(|image| {
                        format!(
                            "data:{};base64,{}",
                            image.mime_type(),
                            base64::engine::general_purpose::STANDARD.encode(&image.bytes)
                        )
                    });
                }
            }
            view
        })
        .collect();

    InteractiveTemplate {
        title: spec.title.clone(),
        instructions: spec.instructions.clone(),
        page_width: PAGE_WIDTH as u32,
        page_height: PAGE_HEIGHT as u32,
        storage_key: storage_key(&spec.title),
        elements,
    }
}
