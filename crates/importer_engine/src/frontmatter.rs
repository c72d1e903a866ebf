use std::collections::BTreeMap;

use serde::Serialize;

use crate::filename::slugify;
use crate::types::{Author, Entry};

#[derive(Debug, Serialize)]
struct FrontMatter<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    authors: &'a [Author],
    date: String,
    metadata: Metadata<'a>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    draft: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Metadata<'a> {
    uuid: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    url: &'a str,
    #[serde(skip_serializing_if = "is_empty_map")]
    media: &'a BTreeMap<String, String>,
    #[serde(flatten)]
    extra: &'a BTreeMap<String, serde_json::Value>,
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

fn is_empty_map<K, V>(map: &&BTreeMap<K, V>) -> bool {
    map.is_empty()
}

/// Render `---\n<yaml>---\n<content>` for an entry.
pub fn build_document(entry: &Entry) -> Result<String, serde_yaml::Error> {
    let mut tags: Vec<String> = entry
        .tags
        .iter()
        .map(|tag| slugify(tag))
        .filter(|tag| !tag.is_empty())
        .collect();
    tags.dedup();

    let front_matter = FrontMatter {
        title: entry.title.as_deref(),
        authors: &entry.authors,
        date: entry.date.to_rfc3339(),
        metadata: Metadata {
            uuid: &entry.uuid,
            kind: &entry.kind,
            url: &entry.url,
            media: &entry.media,
            extra: &entry.metadata,
        },
        draft: entry.is_draft(),
        tags,
    };
    let yaml = serde_yaml::to_string(&front_matter)?;
    Ok(format!("---\n{yaml}---\n{}", entry.content))
}

#[cfg(test)]
mod tests {
    use super::build_document;
    use crate::types::{Author, Entry, EntryStatus};
    use chrono::{TimeZone, Utc};

    fn entry() -> Entry {
        let mut entry = Entry::new(
            "https://example.com/post",
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        );
        entry.title = Some("Hello: World".into());
        entry.uuid = "post-1".into();
        entry.kind = "json".into();
        entry.content = "Body".into();
        entry
    }

    #[test]
    fn document_has_fenced_front_matter_then_body() {
        let mut entry = entry();
        entry.authors = vec![Author {
            name: "Zach".into(),
            url: None,
        }];
        entry.tags = vec!["Rust Lang".into(), "rust lang".into()];
        let doc = build_document(&entry).unwrap();

        assert!(doc.starts_with("---\n"));
        assert!(doc.ends_with("---\nBody"));
        assert!(doc.contains("title: 'Hello: World'"), "{doc}");
        assert!(doc.contains("- name: Zach"));
        assert!(doc.contains("2024-01-02T03:04:05+00:00"));
        assert!(doc.contains("  uuid: post-1"));
        assert!(doc.contains("  type: json"));
        assert!(doc.contains("  url: https://example.com/post"));
        assert!(doc.contains("tags:\n- rust-lang\n"));
        assert!(!doc.contains("draft"));
    }

    #[test]
    fn drafts_are_flagged_and_media_listed() {
        let mut entry = entry();
        entry.status = EntryStatus::Draft;
        entry.media.insert("image".into(), "../assets/abc.png".into());
        let doc = build_document(&entry).unwrap();

        assert!(doc.contains("draft: true"));
        assert!(doc.contains("  media:\n    image: ../assets/abc.png"));
    }
}
