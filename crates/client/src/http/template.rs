//! URL templates with `{param}` placeholders.

use crate::source::{FetchParams, SourceError};

/// Error type for template parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("empty URL template")]
    Empty,

    #[error("unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),

    #[error("invalid placeholder name: {0:?}")]
    BadPlaceholder(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid JSON pointer: {0:?}")]
    BadPointer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed URL template. Placeholder values are percent-encoded when rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    /// Parse and validate a template.
    ///
    /// The template must render to an absolute http(s) URL with a host when
    /// every placeholder is filled.
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices();
        while let Some((at, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => return Err(TemplateError::UnbalancedBrace(at)),
                            Some((_, c)) => name.push(c),
                        }
                    }
                    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(TemplateError::BadPlaceholder(name));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Param(name));
                }
                '}' => return Err(TemplateError::UnbalancedBrace(at)),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let template = Self { raw: raw.to_string(), segments };
        template.check_shape()?;
        Ok(template)
    }

    fn check_shape(&self) -> Result<(), TemplateError> {
        let sample: String = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Param(_) => "x",
            })
            .collect();

        let parsed = url::Url::parse(&sample).map_err(|e| TemplateError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(TemplateError::UnsupportedScheme(scheme.to_string())),
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(TemplateError::InvalidUrl("missing host".into()));
        }
        Ok(())
    }

    /// Placeholder names in order of appearance.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fill every placeholder from `params`.
    pub fn render(&self, params: &FetchParams) -> Result<String, SourceError> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Param(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| SourceError::InvalidParams(format!("missing parameter: {name}")))?;
                    out.push_str(&urlencoding::encode(value));
                }
            }
        }
        Ok(out)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}
