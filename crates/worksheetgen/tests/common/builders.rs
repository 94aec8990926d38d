//! Builders for requests and worksheet specifications.

#![allow(dead_code)]

use worksheetgen::model::{Element, Position, Size, TextStyle, WorksheetRequest, WorksheetSpec};

/// The grade 3 fractions request used throughout the tests.
pub fn fractions_request() -> WorksheetRequest {
    RequestBuilder::new().build()
}

pub struct RequestBuilder {
    request: WorksheetRequest,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            request: WorksheetRequest {
                grade_level: "3".to_string(),
                topic: "fractions".to_string(),
                activities: vec!["fill-in".to_string()],
                style: "fun".to_string(),
                images_allowed: false,
            },
        }
    }

    pub fn topic(mut self, topic: &str) -> Self {
        self.request.topic = topic.to_string();
        self
    }

    pub fn images_allowed(mut self, allowed: bool) -> Self {
        self.request.images_allowed = allowed;
        self
    }

    pub fn build(self) -> WorksheetRequest {
        self.request
    }
}

pub struct SpecBuilder {
    spec: WorksheetSpec,
    next_y: f32,
}

impl SpecBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            spec: WorksheetSpec {
                title: title.to_string(),
                instructions: "Answer every question.".to_string(),
                elements: Vec::new(),
            },
            next_y: 120.0,
        }
    }

    fn position(&mut self) -> Position {
        let position = Position {
            x: 50.0,
            y: self.next_y,
        };
        self.next_y += 60.0;
        position
    }

    pub fn text(mut self, content: &str) -> Self {
        let position = self.position();
        self.spec.elements.push(Element::Text {
            content: content.to_string(),
            position,
            style: TextStyle::default(),
        });
        self
    }

    pub fn input(mut self, placeholder: &str) -> Self {
        let position = self.position();
        self.spec.elements.push(Element::InputField {
            placeholder: placeholder.to_string(),
            position,
            size: Size {
                width: 300.0,
                height: 30.0,
            },
        });
        self
    }

    pub fn image(mut self, description: &str) -> Self {
        let position = self.position();
        self.spec.elements.push(Element::Image {
            description: description.to_string(),
            position,
            size: Size {
                width: 120.0,
                height: 50.0,
            },
        });
        self
    }

    pub fn build(self) -> WorksheetSpec {
        self.spec
    }
}

/// A fractions worksheet with text, two inputs and one image element.
pub fn fractions_spec() -> WorksheetSpec {
    SpecBuilder::new("Fun with Fractions")
        .text("What is 1/2 + 1/4?")
        .input("Your answer")
        .image("a pizza cut into four slices")
        .text("Which is bigger, 2/3 or 3/5?")
        .input("Your answer")
        .build()
}
