//! Search indexing hooks.
//!
//! The engine notifies an [`EntryIndexer`] after entries are committed. An
//! indexer failure is logged by the caller and never undoes local changes.

use crate::error::Result;
use crate::models::{Entry, EntryId};
use crate::util::compact_text;

/// Fields handed to a search index for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchableAttributes {
    pub title: String,
    /// Start of the article text, tags stripped and whitespace collapsed
    pub snippet: String,
    pub domain: Option<String>,
    pub url: String,
}

impl From<&Entry> for SearchableAttributes {
    fn from(entry: &Entry) -> Self {
        Self {
            title: entry.display_title().to_string(),
            snippet: compact_text(
                &strip_tags(&entry.content)
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            domain: entry.domain_name.clone(),
            url: entry.url.clone(),
        }
    }
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text
}

/// Receives entry changes after they are persisted.
pub trait EntryIndexer: Send + Sync {
    fn index(&self, id: EntryId, attributes: &SearchableAttributes) -> Result<()>;

    fn remove(&self, id: EntryId) -> Result<()>;
}

/// Indexer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIndexer;

impl EntryIndexer for NoopIndexer {
    fn index(&self, _id: EntryId, _attributes: &SearchableAttributes) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _id: EntryId) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn attributes_strip_markup_from_snippet() {
        let entry = Entry {
            id: EntryId::new(1),
            title: String::new(),
            content: "<h1>Heading</h1>\n<p>First   <b>bold</b> words</p>".to_string(),
            url: "https://example.com/post".to_string(),
            domain_name: Some("example.com".to_string()),
            preview_picture: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_starred: false,
            is_archived: false,
            reading_time: 1,
            screen_position: 0.0,
        };

        let attributes = SearchableAttributes::from(&entry);
        assert_eq!(attributes.title, "https://example.com/post");
        assert_eq!(attributes.snippet, "Heading First bold words");
        assert_eq!(attributes.domain.as_deref(), Some("example.com"));
    }
}
