//! Entry catalog
//!
//! Parses a decrypted vault document into its entries, in document order.
//! Entries are looked up by raw name; the first entry with a given name wins.
//! Listings are escaped so they can be embedded in selection markup, and the
//! rendered markup is what gets persisted for redisplay without decrypting.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Entry type listed without a "(type)" suffix
pub const DEFAULT_TYPE: &str = "website";
/// Field holding the account name
pub const USERNAME_FIELD: &str = "generic-username";
/// Field holding the account password
pub const PASSWORD_FIELD: &str = "generic-password";

/// Catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("malformed document: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// One credential record
#[derive(Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub kind: String,
    pub description: String,
    /// Field id to value; a repeated id keeps its last value
    pub fields: BTreeMap<String, String>,
}

impl Entry {
    pub fn field(&self, id: &str) -> Option<&str> {
        self.fields.get(id).map(String::as_str)
    }

    pub fn username(&self) -> Option<&str> {
        self.field(USERNAME_FIELD)
    }

    pub fn password(&self) -> Option<&str> {
        self.field(PASSWORD_FIELD)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One selectable item: escaped option value and escaped display label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    /// Raw entry name this choice selects
    pub fn name(&self) -> String {
        unescape(&self.value)
    }

    /// Label as plain text
    pub fn plain_label(&self) -> String {
        unescape(&self.label)
    }
}

/// Parsed entries of one document
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<Entry>,
    default_type: String,
}

fn text_content(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn child_text(node: roxmltree::Node<'_, '_>, tag: &str) -> String {
    node.children()
        .find(|c| c.has_tag_name(tag))
        .map(text_content)
        .unwrap_or_default()
}

impl Catalog {
    /// Parse with the default entry type
    pub fn parse(plaintext: &str) -> Result<Self, CatalogError> {
        Self::parse_with_default_type(plaintext, DEFAULT_TYPE)
    }

    pub fn parse_with_default_type(
        plaintext: &str,
        default_type: &str,
    ) -> Result<Self, CatalogError> {
        let doc = roxmltree::Document::parse(plaintext)?;

        let entries: Vec<Entry> = doc
            .descendants()
            .filter(|n| n.has_tag_name("entry"))
            .map(|node| {
                let fields = node
                    .children()
                    .filter(|c| c.has_tag_name("field"))
                    .filter_map(|c| Some((c.attribute("id")?.to_string(), text_content(c))))
                    .collect();

                Entry {
                    name: child_text(node, "name"),
                    kind: node.attribute("type").unwrap_or_default().to_string(),
                    description: child_text(node, "description"),
                    fields,
                }
            })
            .collect();

        tracing::debug!(entries = entries.len(), "document parsed");

        Ok(Self {
            entries,
            default_type: default_type.to_string(),
        })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Selectable names in document order
    pub fn list(&self) -> Vec<Choice> {
        self.entries
            .iter()
            .map(|entry| {
                let label = if entry.kind.is_empty() || entry.kind == self.default_type {
                    entry.name.clone()
                } else {
                    format!("{} ({})", entry.name, entry.kind)
                };
                Choice {
                    value: escape(&entry.name),
                    label: escape(&label),
                }
            })
            .collect()
    }

    /// First entry named exactly `name`
    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Selection markup for the listing, as persisted between runs
    pub fn render_options(&self) -> String {
        render_options(&self.list())
    }
}

/// Render choices as `<option>` markup
pub fn render_options(choices: &[Choice]) -> String {
    choices
        .iter()
        .map(|c| format!("<option value='{}'>{}</option>", c.value, c.label))
        .collect()
}

/// Read choices back from markup produced by [`render_options`]
pub fn parse_options(markup: &str) -> Vec<Choice> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?s)<option value='([^']*)'>(.*?)</option>").expect("valid regex")
    });

    re.captures_iter(markup)
        .map(|caps| Choice {
            value: caps[1].to_string(),
            label: caps[2].to_string(),
        })
        .collect()
}

/// Escape text for embedding in markup attribute values and content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape`]; also accepts the numeric `&#39;` form
pub fn unescape(text: &str) -> String {
    text.replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANK: &str = r#"<xml><entries><entry type="website"><name>Bank</name><description>d</description><field id="generic-username">alice</field><field id="generic-password">secret</field></entry></entries></xml>"#;

    #[test]
    fn test_bank_scenario() {
        let catalog = Catalog::parse(BANK).unwrap();
        assert_eq!(
            catalog.list(),
            vec![Choice {
                value: "Bank".into(),
                label: "Bank".into()
            }]
        );

        let entry = catalog.find("Bank").unwrap();
        assert_eq!(entry.username(), Some("alice"));
        assert_eq!(entry.password(), Some("secret"));
        assert_eq!(entry.description, "d");
        assert_eq!(entry.kind, "website");
    }

    #[test]
    fn test_non_default_type_label() {
        let doc = r#"<revelationdata>
            <entry type="folder"><name>Work</name>
              <entry type="email"><name>Mail</name></entry>
            </entry>
        </revelationdata>"#;
        let catalog = Catalog::parse(doc).unwrap();
        let labels: Vec<_> = catalog.list().into_iter().map(|c| c.label).collect();
        assert_eq!(labels, vec!["Work (folder)", "Mail (email)"]);
    }

    #[test]
    fn test_untyped_entry_has_no_suffix() {
        let doc = r#"<r><entry><name>Loose</name></entry></r>"#;
        let catalog = Catalog::parse(doc).unwrap();
        assert_eq!(catalog.list()[0].label, "Loose");
        assert_eq!(catalog.entries()[0].kind, "");
    }

    #[test]
    fn test_labels_are_escaped_but_find_uses_raw_name() {
        let doc = r#"<r>
            <entry type="website"><name>Bob's &lt;site&gt;</name></entry>
            <entry type="generic"><name>a&lt;b</name></entry>
        </r>"#;
        let catalog = Catalog::parse(doc).unwrap();
        let choices = catalog.list();

        for choice in &choices {
            assert!(!choice.label.contains('\''));
            assert!(!choice.label.contains('<'));
            assert!(!choice.value.contains('\''));
            assert!(!choice.value.contains('<'));
        }
        assert_eq!(choices[0].value, "Bob&apos;s &lt;site&gt;");
        assert_eq!(choices[1].label, "a&lt;b (generic)");

        assert!(catalog.find("Bob's <site>").is_some());
        assert!(catalog.find(&choices[0].value).is_none());
        assert_eq!(choices[0].name(), "Bob's <site>");
    }

    #[test]
    fn test_duplicates_first_wins() {
        let doc = r#"<r>
            <entry type="website"><name>Dup</name><description>first</description></entry>
            <entry type="website"><name>Dup</name><description>second</description></entry>
        </r>"#;
        let catalog = Catalog::parse(doc).unwrap();
        for _ in 0..3 {
            assert_eq!(catalog.find("Dup").unwrap().description, "first");
        }
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let a = Catalog::parse(BANK).unwrap();
        let b = Catalog::parse(BANK).unwrap();
        assert_eq!(a.entries(), b.entries());
        assert_eq!(a.list(), b.list());
    }

    #[test]
    fn test_malformed_document() {
        assert!(Catalog::parse("<xml><entry></xml>").is_err());
        assert!(Catalog::parse("not markup at all").is_err());
    }

    #[test]
    fn test_missing_parts_and_unknown_fields() {
        let doc = r#"<r><entry type="website">
            <field id="url">https://example.com</field>
            <field>no id</field>
        </entry></r>"#;
        let catalog = Catalog::parse(doc).unwrap();
        let entry = &catalog.entries()[0];
        assert_eq!(entry.name, "");
        assert_eq!(entry.username(), None);
        assert_eq!(entry.field("url"), Some("https://example.com"));
        assert_eq!(entry.fields.len(), 1);
    }

    #[test]
    fn test_options_markup_round_trip() {
        let doc = r#"<r><entry type="note"><name>It's</name></entry></r>"#;
        let catalog = Catalog::parse(doc).unwrap();
        let markup = catalog.render_options();
        assert_eq!(markup, "<option value='It&apos;s'>It&apos;s (note)</option>");

        let choices = parse_options(&markup);
        assert_eq!(choices, catalog.list());
        assert_eq!(choices[0].name(), "It's");
        assert_eq!(choices[0].plain_label(), "It's (note)");
    }
}
