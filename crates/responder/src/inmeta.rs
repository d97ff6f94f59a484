// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Inmeta document validation.
//!
//! Inbound job descriptions are XML validated against a schema before
//! anything touches the cluster. The schema is the subset of XSD the
//! inmeta format actually uses (declared elements, their nesting and
//! their required/optional attributes), compiled from the `.xsd` file
//! named by `INMETA_XSD`, or from the bundled copy.

use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Schema shipped with the responder, used when `INMETA_XSD` is unset.
const BUNDLED_XSD: &str = include_str!("../inmeta.xsd");

/// Errors from loading or compiling a schema.
#[derive(Debug, Error)]
pub enum InmetaError {
    #[error("could not read schema {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("schema did not parse as XML: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("schema declares no root element")]
    NoRootElement,
}

/// A document that failed validation, with the validator's error log.
#[derive(Debug)]
pub struct ValidationFailure {
    pub errors: Vec<String>,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.errors.join("\n"))
    }
}

impl std::error::Error for ValidationFailure {}

#[derive(Debug, Clone)]
struct AttributeDecl {
    name: String,
    required: bool,
}

#[derive(Debug, Clone, Default)]
struct ElementDecl {
    name: String,
    attributes: Vec<AttributeDecl>,
    children: Vec<ElementDecl>,
}

/// Compiled inmeta schema.
pub struct InmetaSchema {
    root: ElementDecl,
}

impl InmetaSchema {
    /// Compile the schema named by `INMETA_XSD`, or the bundled copy.
    pub fn load() -> Result<Self, InmetaError> {
        match std::env::var("INMETA_XSD") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| InmetaError::Read { path, source })?;
                Self::compile(&text)
            }
            Err(_) => Self::compile(BUNDLED_XSD),
        }
    }

    /// Compile a schema from XSD text.
    pub fn compile(xsd: &str) -> Result<Self, InmetaError> {
        let mut reader = Reader::from_str(xsd);
        reader.config_mut().trim_text(true);

        // Elements under construction; `xs:complexType`/`xs:sequence`
        // wrappers do not affect nesting.
        let mut stack: Vec<ElementDecl> = Vec::new();
        let mut root: Option<ElementDecl> = None;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(tag) => match tag.local_name().as_ref() {
                    b"element" => stack.push(element_decl(&tag)),
                    b"attribute" => attach_attribute(&mut stack, &tag),
                    _ => {}
                },
                Event::Empty(tag) => match tag.local_name().as_ref() {
                    b"element" => attach_element(&mut stack, &mut root, element_decl(&tag)),
                    b"attribute" => attach_attribute(&mut stack, &tag),
                    _ => {}
                },
                Event::End(tag) => {
                    if tag.local_name().as_ref() == b"element" {
                        if let Some(done) = stack.pop() {
                            attach_element(&mut stack, &mut root, done);
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(Self { root: root.ok_or(InmetaError::NoRootElement)? })
    }

    /// Validate a document. The error log lists every violation found,
    /// one entry per problem, in document order.
    pub fn validate(&self, document: &str) -> Result<(), ValidationFailure> {
        let mut errors = Vec::new();
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(true);

        // `None` entries mark subtrees under an undeclared element, so a
        // single unknown element does not cascade into one error per
        // descendant.
        let mut stack: Vec<Option<&ElementDecl>> = Vec::new();
        let mut saw_root = false;

        loop {
            match reader.read_event() {
                Err(e) => {
                    errors.push(format!("document did not parse as XML: {e}"));
                    break;
                }
                Ok(Event::Eof) => {
                    if !stack.is_empty() {
                        errors.push("document ended with unclosed elements".to_string());
                    } else if !saw_root {
                        errors.push("document has no root element".to_string());
                    }
                    break;
                }
                Ok(Event::Start(tag)) => {
                    saw_root = true;
                    let decl = self.check_element(&tag, &stack, &mut errors);
                    stack.push(decl);
                }
                Ok(Event::Empty(tag)) => {
                    saw_root = true;
                    self.check_element(&tag, &stack, &mut errors);
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(_) => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure { errors })
        }
    }

    fn check_element<'a>(
        &'a self,
        tag: &BytesStart,
        stack: &[Option<&'a ElementDecl>],
        errors: &mut Vec<String>,
    ) -> Option<&'a ElementDecl> {
        let name = String::from_utf8_lossy(tag.local_name().as_ref()).into_owned();
        let decl = match stack.last() {
            None => {
                if self.root.name == name {
                    Some(&self.root)
                } else {
                    errors.push(format!(
                        "element '{name}': expected document root '{}'",
                        self.root.name
                    ));
                    None
                }
            }
            Some(Some(parent)) => match parent.children.iter().find(|c| c.name == name) {
                Some(child) => Some(child),
                None => {
                    errors.push(format!(
                        "element '{name}' is not declared inside '{}'",
                        parent.name
                    ));
                    None
                }
            },
            Some(None) => None,
        };

        if let Some(decl) = decl {
            self.check_attributes(decl, tag, errors);
        }
        decl
    }

    fn check_attributes(&self, decl: &ElementDecl, tag: &BytesStart, errors: &mut Vec<String>) {
        let mut present: Vec<String> = Vec::new();
        for attr in tag.attributes() {
            match attr {
                Ok(attr) => {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    if key.starts_with("xmlns") {
                        continue;
                    }
                    if !decl.attributes.iter().any(|a| a.name == key) {
                        errors.push(format!(
                            "attribute '{key}' is not allowed on element '{}'",
                            decl.name
                        ));
                    }
                    present.push(key);
                }
                Err(e) => {
                    errors.push(format!("bad attribute on element '{}': {e}", decl.name));
                }
            }
        }
        for required in decl.attributes.iter().filter(|a| a.required) {
            if !present.iter().any(|p| *p == required.name) {
                errors.push(format!(
                    "element '{}' is missing required attribute '{}'",
                    decl.name, required.name
                ));
            }
        }
    }
}

fn element_decl(tag: &BytesStart) -> ElementDecl {
    ElementDecl { name: attr_value(tag, b"name").unwrap_or_default(), ..Default::default() }
}

fn attach_element(stack: &mut Vec<ElementDecl>, root: &mut Option<ElementDecl>, decl: ElementDecl) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(decl),
        None => {
            if root.is_none() {
                *root = Some(decl);
            }
        }
    }
}

fn attach_attribute(stack: &mut [ElementDecl], tag: &BytesStart) {
    if let Some(element) = stack.last_mut() {
        element.attributes.push(AttributeDecl {
            name: attr_value(tag, b"name").unwrap_or_default(),
            required: attr_value(tag, b"use").as_deref() == Some("required"),
        });
    }
}

fn attr_value(tag: &BytesStart, wanted: &[u8]) -> Option<String> {
    tag.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == wanted)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
#[path = "inmeta_tests.rs"]
mod tests;
