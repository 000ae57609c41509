//! Owned XML tree for `install.rdf` and `update.rdf`.
//!
//! Element names are kept exactly as written (`em:version`, `RDF:Description`),
//! which is how both documents address their nodes. Namespace declarations are
//! ordinary attributes and survive a parse/serialize cycle untouched, as do
//! comments, processing instructions and the doctype around the root element.

use crate::error::XmlError;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt::Display;

/// Result type for document operations
pub type Result<T> = std::result::Result<T, XmlError>;

/// A node in the element tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element
    Element(Element),
    /// Character data (unescaped)
    Text(String),
    /// CDATA section
    CData(String),
    /// Comment
    Comment(String),
    /// Processing instruction, target included (`xml-stylesheet href="..."`)
    ProcessingInstruction(String),
    /// Doctype declaration body, without the `<!DOCTYPE` keyword
    DocType(String),
}

/// An XML element with its qualified name, attributes in document order and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name, prefix included
    pub name: String,
    /// Attributes as `(qualified name, unescaped value)`
    pub attributes: Vec<(String, String)>,
    /// Child nodes
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element holding a single text node
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.children.push(Node::Text(text.into()));
        element
    }

    /// Namespace prefix, if the name has one
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Attribute value by qualified name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Concatenated text and CDATA content of the direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Node::Text(text) | Node::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Drop all children and replace them with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.clear();
        self.children.push(Node::Text(text.into()));
    }

    /// Append a child element
    pub fn append_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Append a child element on its own line, indented like the existing children.
    ///
    /// Falls back to [`Element::append_child`] when the children carry no
    /// whitespace layout.
    pub fn append_child_indented(&mut self, child: Element) {
        let indent = self
            .children
            .windows(2)
            .find_map(|pair| match pair {
                [Node::Text(text), Node::Element(_)] if text.trim().is_empty() => {
                    Some(text.clone())
                }
                _ => None,
            });
        let Some(indent) = indent else {
            self.append_child(child);
            return;
        };

        let at = match self.children.last() {
            Some(Node::Text(text)) if text.trim().is_empty() => self.children.len() - 1,
            _ => self.children.len(),
        };
        self.children
            .splice(at..at, [Node::Text(indent), Node::Element(child)]);
    }

    /// Direct child elements
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First descendant named `name`, in document order
    pub fn find_first(&self, name: &str) -> Option<&Element> {
        self.locate(name, None).and_then(|path| self.at_path(&path))
    }

    /// Mutable variant of [`Element::find_first`]
    pub fn find_first_mut(&mut self, name: &str) -> Option<&mut Element> {
        let path = self.locate(name, None)?;
        self.at_path_mut(&path)
    }

    /// First descendant named `name` that is not nested inside an element named `outside`
    pub fn find_first_outside(&self, name: &str, outside: &str) -> Option<&Element> {
        self.locate(name, Some(outside))
            .and_then(|path| self.at_path(&path))
    }

    /// Mutable variant of [`Element::find_first_outside`]
    pub fn find_first_outside_mut(&mut self, name: &str, outside: &str) -> Option<&mut Element> {
        let path = self.locate(name, Some(outside))?;
        self.at_path_mut(&path)
    }

    /// Parent of the first descendant named `name` outside `outside`
    pub fn parent_of_first_outside_mut(
        &mut self,
        name: &str,
        outside: &str,
    ) -> Option<&mut Element> {
        let path = self.locate(name, Some(outside))?;
        let (_, parent) = path.split_last()?;
        self.at_path_mut(parent)
    }

    /// Parent of the first descendant named `name`
    pub fn parent_of_first_mut(&mut self, name: &str) -> Option<&mut Element> {
        let path = self.locate(name, None)?;
        let (_, parent) = path.split_last()?;
        self.at_path_mut(parent)
    }

    /// All descendants named `name`, in document order
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    /// Apply `f` to every descendant named `name`, in document order
    pub fn for_each_named_mut(&mut self, name: &str, f: &mut dyn FnMut(&mut Element)) {
        for child in &mut self.children {
            if let Node::Element(element) = child {
                if element.name == name {
                    f(element);
                }
                element.for_each_named_mut(name, f);
            }
        }
    }

    /// Remove every descendant named `name`; returns how many were removed
    pub fn remove_all(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|child| !matches!(child, Node::Element(element) if element.name == name));
        let mut removed = before - self.children.len();
        for child in &mut self.children {
            if let Node::Element(element) = child {
                removed += element.remove_all(name);
            }
        }
        removed
    }

    /// Rename this element and every descendant whose local name is `local_name`
    pub fn rename_local(&mut self, local_name: &str, new_name: &str) {
        if self.local_name() == local_name {
            self.name = new_name.to_string();
        }
        for child in &mut self.children {
            if let Node::Element(element) = child {
                element.rename_local(local_name, new_name);
            }
        }
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for element in self.child_elements() {
            if element.name == name {
                found.push(element);
            }
            element.collect_named(name, found);
        }
    }

    /// Child-index path to the first matching descendant, skipping subtrees rooted at `outside`
    fn locate(&self, name: &str, outside: Option<&str>) -> Option<Vec<usize>> {
        for (index, child) in self.children.iter().enumerate() {
            let Node::Element(element) = child else {
                continue;
            };
            if element.name == name {
                return Some(vec![index]);
            }
            if outside == Some(element.name.as_str()) {
                continue;
            }
            if let Some(mut path) = element.locate(name, outside) {
                path.insert(0, index);
                return Some(path);
            }
        }
        None
    }

    fn at_path(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get(index)? {
                Node::Element(element) => element,
                _ => return None,
            };
        }
        Some(current)
    }

    fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get_mut(index)? {
                Node::Element(element) => element,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// A parsed XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Comments, processing instructions and doctype before the root
    prolog: Vec<Node>,
    root: Element,
    /// Comments and processing instructions after the root
    epilog: Vec<Node>,
}

impl Document {
    /// Wrap an element as the document root
    pub fn new(root: Element) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// Parse a document from UTF-8 bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let source = std::str::from_utf8(bytes).map_err(malformed)?;
        Self::parse_str(source)
    }

    /// Parse a document from a string
    pub fn parse_str(source: &str) -> Result<Self> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let mut reader = Reader::from_str(source);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();

        loop {
            match reader.read_event().map_err(malformed)? {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| XmlError::Malformed {
                        reason: "unexpected closing tag".to_string(),
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = text.unescape().map_err(malformed)?;
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let data = String::from_utf8_lossy(&data).into_owned();
                        parent.children.push(Node::CData(data));
                    }
                }
                Event::Comment(comment) => {
                    let comment = String::from_utf8_lossy(&comment).into_owned();
                    let outer = if root.is_some() { &mut epilog } else { &mut prolog };
                    place(&mut stack, outer, Node::Comment(comment));
                }
                Event::PI(pi) => {
                    let pi = String::from_utf8_lossy(&pi).into_owned();
                    let outer = if root.is_some() { &mut epilog } else { &mut prolog };
                    place(&mut stack, outer, Node::ProcessingInstruction(pi));
                }
                Event::DocType(doctype) => {
                    let doctype = String::from_utf8_lossy(&doctype).into_owned();
                    let outer = if root.is_some() { &mut epilog } else { &mut prolog };
                    place(&mut stack, outer, Node::DocType(doctype));
                }
                // The declaration is always rewritten as UTF-8 on output
                Event::Decl(_) => {}
                Event::Eof => break,
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Malformed {
                reason: format!("unclosed element <{}>", open.name),
            });
        }
        let root = root.ok_or_else(|| XmlError::Malformed {
            reason: "document has no root element".to_string(),
        })?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// Root element
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Mutable root element
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Serialize with a UTF-8 XML declaration
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(write_failed)?;
        write_newline(&mut writer)?;
        for node in &self.prolog {
            write_node(&mut writer, node)?;
            write_newline(&mut writer)?;
        }
        write_element(&mut writer, &self.root)?;
        write_newline(&mut writer)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
            write_newline(&mut writer)?;
        }
        Ok(writer.into_inner())
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<Element> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(malformed)?
        .to_string();
    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(malformed)?
            .to_string();
        let value = attribute.unescape_value().map_err(malformed)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Push `node` into the open element, or into `outer` at document level
fn place(stack: &mut [Element], outer: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => outer.push(node),
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::Malformed {
            reason: format!("second root element <{}>", element.name),
        });
    }
    *root = Some(element);
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_failed);
    }

    writer.write_event(Event::Start(start)).map_err(write_failed)?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_failed)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    let event = match node {
        Node::Element(element) => return write_element(writer, element),
        Node::Text(text) => Event::Text(BytesText::new(text)),
        Node::CData(data) => Event::CData(BytesCData::new(data.as_str())),
        Node::Comment(comment) => Event::Comment(BytesText::from_escaped(comment.as_str())),
        Node::ProcessingInstruction(pi) => Event::PI(BytesPI::new(pi.as_str())),
        Node::DocType(doctype) => Event::DocType(BytesText::from_escaped(doctype.as_str())),
    };
    writer.write_event(event).map_err(write_failed)
}

fn write_newline(writer: &mut Writer<Vec<u8>>) -> Result<()> {
    writer
        .write_event(Event::Text(BytesText::new("\n")))
        .map_err(write_failed)
}

fn malformed(error: impl Display) -> XmlError {
    XmlError::Malformed {
        reason: error.to_string(),
    }
}

fn write_failed(error: impl Display) -> XmlError {
    XmlError::Write {
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0"?>
<RDF xmlns="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:em="http://www.mozilla.org/2004/em-rdf#">
  <Description about="urn:mozilla:install-manifest">
    <em:targetApplication>
      <Description>
        <em:id>{ec8030f7-c20a-464f-9b0e-13a3a9e97384}</em:id>
        <em:minVersion>3.6</em:minVersion>
      </Description>
    </em:targetApplication>
    <em:id>ext@example.test</em:id>
    <em:name>Example &amp; Co</em:name>
  </Description>
</RDF>"#;

    #[test]
    fn test_parse_keeps_qualified_names_and_entities() {
        let doc = Document::parse_str(MANIFEST).expect("parse");
        assert_eq!(doc.root().name, "RDF");
        let name = doc.root().find_first("em:name").expect("em:name");
        assert_eq!(name.text(), "Example & Co");
        assert_eq!(name.prefix(), Some("em"));
        assert_eq!(name.local_name(), "name");
    }

    #[test]
    fn test_find_first_outside_skips_subtree() {
        let doc = Document::parse_str(MANIFEST).expect("parse");
        let first = doc.root().find_first("em:id").expect("em:id");
        assert!(first.text().starts_with('{'));

        let outside = doc
            .root()
            .find_first_outside("em:id", "em:targetApplication")
            .expect("main em:id");
        assert_eq!(outside.text(), "ext@example.test");
    }

    #[test]
    fn test_parent_of_first_outside() {
        let mut doc = Document::parse_str(MANIFEST).expect("parse");
        let parent = doc
            .root_mut()
            .parent_of_first_outside_mut("em:id", "em:targetApplication")
            .expect("parent");
        assert_eq!(parent.name, "Description");
        assert_eq!(parent.attribute("about"), Some("urn:mozilla:install-manifest"));
    }

    #[test]
    fn test_remove_all_and_rename() {
        let mut doc = Document::parse_str(MANIFEST).expect("parse");
        assert_eq!(doc.root_mut().remove_all("em:id"), 2);
        assert!(doc.root().find_first("em:id").is_none());

        doc.root_mut().rename_local("Description", "RDF:Description");
        assert_eq!(doc.root().find_all("RDF:Description").len(), 2);
        assert!(doc.root().find_first("Description").is_none());
    }

    #[test]
    fn test_serialize_round_trip_preserves_tree() {
        let doc = Document::parse_str(MANIFEST).expect("parse");
        let bytes = doc.to_bytes().expect("serialize");
        let text = String::from_utf8(bytes.clone()).expect("utf-8");
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(text.contains("Example &amp; Co"));

        let reparsed = Document::parse(&bytes).expect("reparse");
        assert_eq!(reparsed.root(), doc.root());
    }

    #[test]
    fn test_round_trip_keeps_prolog_and_epilog() {
        let source = format!(
            "<?xml version=\"1.0\"?>\n\
             <!-- This Source Code Form is subject to the terms of the Mozilla Public License -->\n\
             <?xml-stylesheet href=\"chrome://global/skin/\" type=\"text/css\"?>\n\
             <!DOCTYPE RDF>\n\
             {}\n<!-- trailer -->\n",
            MANIFEST.trim_start_matches("<?xml version=\"1.0\"?>\n")
        );
        let doc = Document::parse_str(&source).expect("parse");
        let text = String::from_utf8(doc.to_bytes().expect("serialize")).expect("utf-8");

        let license = text.find("<!-- This Source Code Form").expect("license comment");
        let stylesheet = text
            .find("<?xml-stylesheet href=\"chrome://global/skin/\" type=\"text/css\"?>")
            .expect("stylesheet instruction");
        let doctype = text.find("<!DOCTYPE RDF>").expect("doctype");
        let root = text.find("<RDF ").expect("root");
        let trailer = text.find("<!-- trailer -->").expect("trailing comment");
        assert!(license < stylesheet && stylesheet < doctype && doctype < root && root < trailer);

        let reparsed = Document::parse_str(&text).expect("reparse");
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_processing_instruction_inside_root_survives() {
        let doc = Document::parse_str("<RDF><?pi data?><em:id>x</em:id></RDF>").expect("parse");
        assert_eq!(
            doc.root().children[0],
            Node::ProcessingInstruction("pi data".to_string())
        );
        let text = String::from_utf8(doc.to_bytes().expect("serialize")).expect("utf-8");
        assert!(text.contains("<RDF><?pi data?><em:id>x</em:id></RDF>"));
    }

    #[test]
    fn test_append_child_indented_keeps_layout() {
        let mut doc =
            Document::parse_str("<RDF>\n  <em:id>x</em:id>\n</RDF>").expect("parse");
        doc.root_mut()
            .append_child_indented(Element::with_text("em:updateURL", "u"));
        let text = String::from_utf8(doc.to_bytes().expect("serialize")).expect("utf-8");
        assert!(text.contains("<RDF>\n  <em:id>x</em:id>\n  <em:updateURL>u</em:updateURL>\n</RDF>"));

        let mut flat = Element::new("RDF");
        flat.append_child_indented(Element::new("em:id"));
        assert_eq!(flat.children, vec![Node::Element(Element::new("em:id"))]);
    }

    #[test]
    fn test_rejects_unclosed_document() {
        let err = Document::parse_str("<RDF><em:id>x</em:id>").expect_err("unclosed");
        assert!(matches!(err, XmlError::Malformed { .. }));
    }

    #[test]
    fn test_rejects_empty_document() {
        assert!(Document::parse_str("<?xml version=\"1.0\"?>\n").is_err());
    }
}
