//! Generic ordered XML tree.
//!
//! Documents are read into [`Element`]s with quick-xml's event reader and
//! written back with its indenting writer. Nothing here knows the project
//! vocabulary; attribute order and unknown content are preserved as read.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder-style text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing it in place if already present.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Element children, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// First child element with the given name, appending an empty one if absent.
    pub fn child_or_insert(&mut self, name: &str) -> &mut Element {
        let index = match self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(e) if e.name == name))
        {
            Some(index) => index,
            None => {
                self.children.push(Node::Element(Element::new(name)));
                self.children.len() - 1
            }
        };
        match &mut self.children[index] {
            Node::Element(e) => e,
            Node::Text(_) => unreachable!("index points at an element"),
        }
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Depth-first walk over this element and all descendants.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(element) = stack.pop() {
            out.push(element);
            let mut kids: Vec<&Element> = element.elements().collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }
}

/// Error from reading or writing XML text.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML at byte {position}: {source}")]
    Malformed {
        position: usize,
        source: quick_xml::Error,
    },

    #[error("{0}")]
    Shape(String),

    #[error("XML write failed: {0}")]
    Write(#[from] quick_xml::Error),
}

/// Parse a document and return its root element.
///
/// Declarations, doctypes, comments and processing instructions are dropped.
/// Whitespace-only text is dropped when it sits between child elements or
/// spans lines; other text, including a leaf's spaces, is kept verbatim.
pub fn parse(text: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|source| XmlError::Malformed {
            position: reader.buffer_position(),
            source,
        })?;
        let malformed = |source: quick_xml::Error| XmlError::Malformed {
            position: reader.buffer_position(),
            source,
        };

        match event {
            Event::Start(start) => {
                stack.push(element_from_start(&start).map_err(malformed)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start).map_err(malformed)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| XmlError::Shape("unbalanced closing tag".to_string()))?;
                drop_indentation(&mut element);
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(malformed)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(c) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    parent.children.push(Node::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Shape(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| XmlError::Shape("document has no root element".to_string()))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, quick_xml::Error> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Whitespace between child elements, or spanning lines, is layout. Other
/// whitespace in a leaf is content.
fn drop_indentation(element: &mut Element) {
    let has_elements = element
        .children
        .iter()
        .any(|c| matches!(c, Node::Element(_)));
    element.children.retain(|c| match c {
        Node::Text(t) if t.trim().is_empty() => !has_elements && !t.contains('\n'),
        _ => true,
    });
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(XmlError::Shape(format!(
                "second root element <{}>",
                element.name
            )))
        }
    }
    Ok(())
}

/// Serialize a root element with an XML declaration and `<!DOCTYPE {root}>`.
pub fn write(root: &Element) -> Result<String, XmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::DocType(BytesText::from_escaped(root.name.as_str())))?;
    write_element(&mut writer, root)?;

    let mut out = String::from_utf8(writer.into_inner())
        .map_err(|e| XmlError::Shape(format!("writer produced invalid UTF-8: {e}")))?;
    out.push('\n');
    Ok(out)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE fcpxml>
<fcpxml version="1.13">
    <resources>
        <format id="r1" frameDuration="1001/24000s"/>
    </resources>
    <library>
        <!-- a comment -->
        <custom-thing answer="42" flag="yes">Tom &amp; Jerry</custom-thing>
    </library>
</fcpxml>
"#;

    #[test]
    fn test_parse_keeps_order_and_unknown_content() {
        let root = parse(SAMPLE).unwrap();
        assert_eq!(root.name, "fcpxml");
        assert_eq!(root.attr("version"), Some("1.13"));

        let names: Vec<_> = root.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["resources", "library"]);

        let custom = root.child("library").unwrap().child("custom-thing").unwrap();
        assert_eq!(custom.attributes[0], ("answer".to_string(), "42".to_string()));
        assert_eq!(custom.text(), "Tom & Jerry");
    }

    #[test]
    fn test_write_round_trips_structure() {
        let root = parse(SAMPLE).unwrap();
        let written = write(&root).unwrap();
        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(written.contains("<!DOCTYPE fcpxml>"));
        assert!(written.contains("Tom &amp; Jerry"));
        assert_eq!(parse(&written).unwrap(), root);
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let root = Element::new("title").with_attr("name", "\"Quotes\" <and> & more");
        let written = write(&root).unwrap();
        assert!(!written.contains("\"Quotes\" <and>"));
        assert_eq!(
            parse(&written).unwrap().attr("name"),
            Some("\"Quotes\" <and> & more")
        );
    }

    #[test]
    fn test_set_attr_replaces_in_place() {
        let mut e = Element::new("sequence")
            .with_attr("format", "r1")
            .with_attr("duration", "0s");
        e.set_attr("format", "r9");
        assert_eq!(e.attributes[0].1, "r9");
        assert_eq!(e.attributes.len(), 2);
    }

    #[test]
    fn test_child_or_insert_appends_once() {
        let mut seq = Element::new("sequence");
        seq.child_or_insert("spine").push_child(Element::new("gap"));
        seq.child_or_insert("spine");
        assert_eq!(seq.elements().count(), 1);
        assert_eq!(seq.child("spine").unwrap().elements().count(), 1);
    }

    #[test]
    fn test_leaf_whitespace_survives_round_trip() {
        let root = Element::new("text").with_child(
            Element::new("text-style")
                .with_attr("ref", "ts1")
                .with_text(" "),
        );
        let written = write(&root).unwrap();
        let reparsed = parse(&written).unwrap();
        assert_eq!(reparsed, root);
        assert_eq!(reparsed.child("text-style").unwrap().text(), " ");
    }

    #[test]
    fn test_indentation_between_elements_is_dropped() {
        let root = parse("<a>\n    <b/>\n    <c>  </c>\n    <d>\n    </d>\n</a>").unwrap();
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.child("c").unwrap().text(), "  ");
        assert!(root.child("d").unwrap().children.is_empty());
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(parse("<fcpxml><resources></fcpxml>").is_err());
        assert!(parse("").is_err());
        assert!(parse("<a/><b/>").is_err());
    }
}
