//! Worksheet specification produced by the content provider.
//!
//! The provider's JSON is parsed into a tagged union over element kinds and
//! validated once at the provider boundary; everything downstream trusts it.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// US Letter width in PDF points.
pub const PAGE_WIDTH: f32 = 612.0;
/// US Letter height in PDF points.
pub const PAGE_HEIGHT: f32 = 792.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorksheetSpec {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub elements: Vec<Element>,
}

fn default_title() -> String {
    "Worksheet".to_string()
}

/// A single layout element. Positions are measured from the top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Text {
        content: String,
        #[serde(default)]
        position: Position,
        #[serde(default)]
        style: TextStyle,
    },
    Image {
        description: String,
        #[serde(default)]
        position: Position,
        #[serde(default = "Size::image_default")]
        size: Size,
    },
    InputField {
        #[serde(default)]
        placeholder: String,
        #[serde(default)]
        position: Position,
        #[serde(default = "Size::field_default")]
        size: Size,
    },
}

impl Element {
    pub fn position(&self) -> Position {
        match self {
            Element::Text { position, .. }
            | Element::Image { position, .. }
            | Element::InputField { position, .. } => *position,
        }
    }

    fn position_mut(&mut self) -> &mut Position {
        match self {
            Element::Text { position, .. }
            | Element::Image { position, .. }
            | Element::InputField { position, .. } => position,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Element::Text { .. } => "text",
            Element::Image { .. } => "image",
            Element::InputField { .. } => "input_field",
        }
    }

    /// The description of an image element, if this is one.
    pub fn image_description(&self) -> Option<&str> {
        match self {
            Element::Image { description, .. } => Some(description.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Default for Position {
    fn default() -> Self {
        Self { x: 50.0, y: 300.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    fn image_default() -> Self {
        Self {
            width: 200.0,
            height: 150.0,
        }
    }

    fn field_default() -> Self {
        Self {
            width: 300.0,
            height: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default)]
    pub bold: bool,
}

fn default_font_size() -> f32 {
    12.0
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            bold: false,
        }
    }
}

impl WorksheetSpec {
    /// Parses provider output into a validated specification.
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let spec: WorksheetSpec = serde_json::from_str(json)
            .map_err(|e| ProviderError::InvalidSpec(format!("malformed specification: {}", e)))?;
        spec.validated()
    }

    /// Checks geometry and clamps positions onto the page.
    pub fn validated(mut self) -> Result<Self, ProviderError> {
        if self.title.trim().is_empty() {
            self.title = default_title();
        }

        for (index, element) in self.elements.iter_mut().enumerate() {
            let position = element.position();
            if !position.x.is_finite() || !position.y.is_finite() {
                return Err(ProviderError::InvalidSpec(format!(
                    "element {} has a non-finite position",
                    index
                )));
            }

            match element {
                Element::Image { size, .. } | Element::InputField { size, .. } => {
                    if !(size.width.is_finite() && size.height.is_finite())
                        || size.width <= 0.0
                        || size.height <= 0.0
                    {
                        return Err(ProviderError::InvalidSpec(format!(
                            "element {} has a non-positive size",
                            index
                        )));
                    }
                }
                Element::Text { style, .. } => {
                    if !style.font_size.is_finite() || style.font_size <= 0.0 {
                        return Err(ProviderError::InvalidSpec(format!(
                            "element {} has an invalid font size",
                            index
                        )));
                    }
                }
            }

            let position = element.position_mut();
            position.x = position.x.clamp(0.0, PAGE_WIDTH);
            position.y = position.y.clamp(0.0, PAGE_HEIGHT);
        }

        Ok(self)
    }

    /// Image descriptions in document order, without duplicates or blanks.
    pub fn image_descriptions(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.elements
            .iter()
            .filter_map(Element::image_description)
            .filter(|d| !d.trim().is_empty())
            .filter(|d| seen.insert(*d))
            .collect()
    }

    pub fn image_element_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::Image { .. }))
            .count()
    }
}
