//! XML decoder for job telemetry documents
//!
//! Turns raw bytes into an owned, minimally-typed element tree. Names are kept
//! as local names (namespace prefixes dropped) so lookups never depend on the
//! prefixes a particular engine version emits.

use crate::utils::{AnalyzerError, AnalyzerResult};

/// A decoded XML element: local tag name, attributes and child elements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

/// Decoder for telemetry XML
pub struct XmlDecoder;

impl XmlDecoder {
    /// Decode raw bytes into an element tree rooted at the document element
    pub fn decode(bytes: &[u8]) -> AnalyzerResult<XmlElement> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| AnalyzerError::malformed("xml", format!("invalid UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{feff}');

        let mut options = roxmltree::ParsingOptions::default();
        options.allow_dtd = true;

        let document = roxmltree::Document::parse_with_options(text, options)
            .map_err(|e| AnalyzerError::malformed("xml", e.to_string()))?;

        Ok(Self::convert(document.root_element()))
    }

    fn convert(node: roxmltree::Node<'_, '_>) -> XmlElement {
        XmlElement {
            name: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|attr| (attr.name().to_string(), attr.value().to_string()))
                .collect(),
            children: node.children().filter(|c| c.is_element()).map(Self::convert).collect(),
        }
    }
}

impl XmlElement {
    /// Attribute value by local name
    ///
    /// Exact match wins; otherwise an ASCII case-insensitive match is accepted,
    /// since engine versions disagree on the casing of the first letter.
    pub fn attr(&self, name: &str) -> Option<&str> {
        let name = local_name(name);
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .or_else(|| self.attributes.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the element's local tag name matches, ignoring ASCII case
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(local_name(name))
    }

    /// First direct child with the given tag name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is_named(name))
    }

    /// All direct children with the given tag name, in document order
    pub fn children_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s XmlElement> + 's {
        self.children.iter().filter(move |c| c.is_named(name))
    }

    /// All descendants (excluding self) in document order
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: self.children.iter().rev().collect() }
    }

    /// Outermost descendants matching a predicate; matches are not searched further
    pub fn select_outermost<F>(&self, predicate: F) -> Vec<&XmlElement>
    where
        F: Fn(&XmlElement) -> bool,
    {
        let mut selected = Vec::new();
        self.collect_outermost(&predicate, &mut selected);
        selected
    }

    /// Outermost descendants whose `id` attribute starts with the prefix
    pub fn select_by_id_prefix(&self, prefix: &str) -> Vec<&XmlElement> {
        self.select_outermost(|el| el.attr("id").is_some_and(|id| id.starts_with(prefix)))
    }

    /// Outermost descendants whose tag name starts with the prefix
    pub fn select_by_name_prefix(&self, prefix: &str) -> Vec<&XmlElement> {
        self.select_outermost(|el| el.name.starts_with(prefix))
    }

    /// Outermost descendants with the given tag name
    pub fn select_named(&self, name: &str) -> Vec<&XmlElement> {
        self.select_outermost(|el| el.is_named(name))
    }

    fn collect_outermost<'s, F>(&'s self, predicate: &F, selected: &mut Vec<&'s XmlElement>)
    where
        F: Fn(&XmlElement) -> bool,
    {
        for child in &self.children {
            if predicate(child) {
                selected.push(child);
            } else {
                child.collect_outermost(predicate, selected);
            }
        }
    }
}

/// Pre-order iterator over descendants
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_namespace_prefixes() {
        let xml = br#"<?xml version="1.0"?>
<ns:Root xmlns:ns="urn:test" xmlns:x="urn:x">
  <ns:vertex x:id="SV1_Extract" kind="a"/>
</ns:Root>"#;
        let root = XmlDecoder::decode(xml).unwrap();
        assert_eq!(root.name, "Root");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "vertex");
        assert_eq!(root.children[0].attr("id"), Some("SV1_Extract"));
        assert_eq!(root.children[0].attr("x:id"), Some("SV1_Extract"));
    }

    #[test]
    fn test_decode_rejects_malformed_xml() {
        let err = XmlDecoder::decode(b"<Root><vertex></Root>").unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedDocument { .. }));

        let err = XmlDecoder::decode(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedDocument { .. }));
    }

    #[test]
    fn test_attr_falls_back_to_case_insensitive() {
        let root = XmlDecoder::decode(br#"<Time ElapsedTime="10" elapsedtime="20"/>"#).unwrap();
        assert_eq!(root.attr("ElapsedTime"), Some("10"));
        assert_eq!(root.attr("elapsedtime"), Some("20"));
        assert_eq!(root.attr("ELAPSEDTIME"), Some("10"));
        assert_eq!(root.attr("cpuTime"), None);
    }

    #[test]
    fn test_select_by_prefix_keeps_outermost_matches() {
        let xml = br#"<Stats>
  <Group>
    <SV1_Extract><SV_Nested/></SV1_Extract>
  </Group>
  <SV2_Aggregate/>
  <Other id="SV9"/>
</Stats>"#;
        let root = XmlDecoder::decode(xml).unwrap();

        let by_name: Vec<&str> =
            root.select_by_name_prefix("SV").iter().map(|e| e.name.as_str()).collect();
        assert_eq!(by_name, vec!["SV1_Extract", "SV2_Aggregate"]);

        let by_id: Vec<&str> = root.select_by_id_prefix("SV").iter().map(|e| e.name.as_str()).collect();
        assert_eq!(by_id, vec!["Other"]);
    }

    #[test]
    fn test_descendants_in_document_order() {
        let root = XmlDecoder::decode(b"<a><b><c/></b><d/></a>").unwrap();
        let names: Vec<&str> = root.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }
}
