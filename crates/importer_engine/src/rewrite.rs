//! Asset URL rewriting inside HTML bodies.
//!
//! Bodies are parsed with `scraper`, so only real element attributes are
//! considered. Markup in comments, script text or other attribute values is
//! never touched. A body with nothing to replace comes back unchanged;
//! otherwise it is re-serialized from the parsed tree.

use std::collections::{BTreeSet, HashMap};

use ego_tree::NodeId;
use scraper::node::Node;
use scraper::Html;
use url::Url;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "ogg", "wav", "flac"];

/// URL-bearing attributes rewritten for each tag.
fn rewritable(tag: &str, attr: &str) -> bool {
    match tag {
        "img" | "source" => matches!(attr, "src" | "srcset"),
        "video" => matches!(attr, "src" | "poster"),
        "script" | "track" => attr == "src",
        "link" | "a" => attr == "href",
        _ => false,
    }
}

/// Every remote asset URL referenced by `html`, de-duplicated.
pub fn collect_asset_urls(html: &str) -> Vec<String> {
    let mut doc = Html::parse_fragment(html);
    let mut urls = BTreeSet::new();
    visit_attributes(&mut doc, |url| {
        urls.insert(url.to_string());
        None
    });
    urls.into_iter().collect()
}

/// Replace asset URLs that have an entry in `resolved`; everything else is left as is.
pub fn rewrite_asset_urls(html: &str, resolved: &HashMap<String, String>) -> String {
    if resolved.is_empty() {
        return html.to_string();
    }
    let mut doc = Html::parse_fragment(html);
    if visit_attributes(&mut doc, |url| resolved.get(url).cloned()) {
        doc.root_element().inner_html()
    } else {
        html.to_string()
    }
}

/// Offer each eligible attribute URL to `visit`, which returns a replacement
/// or `None` to keep it. Returns whether any attribute changed.
fn visit_attributes<F>(doc: &mut Html, mut visit: F) -> bool
where
    F: FnMut(&str) -> Option<String>,
{
    let elements: Vec<NodeId> = doc
        .tree
        .nodes()
        .filter(|node| node.value().is_element())
        .map(|node| node.id())
        .collect();

    let mut changed = false;
    for id in elements {
        let Some(mut node) = doc.tree.get_mut(id) else {
            continue;
        };
        let Node::Element(element) = node.value() else {
            continue;
        };
        let tag = element.name().to_ascii_lowercase();
        for (name, value) in element.attrs.iter_mut() {
            let attr: &str = &name.local;
            if !rewritable(&tag, attr) {
                continue;
            }
            let rewritten = if attr == "srcset" {
                rewrite_srcset(value, &mut visit)
            } else {
                rewrite_single(value, &tag, &mut visit)
            };
            if let Some(local) = rewritten {
                *value = local.as_str().into();
                changed = true;
            }
        }
    }
    changed
}

fn rewrite_single<F>(raw: &str, tag: &str, visit: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let url = raw.trim();
    if !is_remote(url) || (tag == "a" && !is_audio(url)) {
        return None;
    }
    visit(url)
}

fn rewrite_srcset<F>(raw: &str, visit: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut changed = false;
    let candidates: Vec<String> = raw
        .split(',')
        .map(|candidate| {
            let candidate = candidate.trim();
            let (url, descriptor) = candidate
                .split_once(char::is_whitespace)
                .map_or((candidate, ""), |(u, d)| (u, d.trim()));
            let replacement = if is_remote(url) { visit(url) } else { None };
            let url = match replacement {
                Some(local) => {
                    changed = true;
                    local
                }
                None => url.to_string(),
            };
            if descriptor.is_empty() {
                url
            } else {
                format!("{url} {descriptor}")
            }
        })
        .collect();
    changed.then(|| candidates.join(", "))
}

fn is_remote(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

fn is_audio(value: &str) -> bool {
    Url::parse(value)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|last| {
            last.rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
        })
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::{collect_asset_urls, rewrite_asset_urls};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn collects_only_eligible_urls() {
        let html = r#"
            <p><img src="https://x/y.png" alt="y"></p>
            <a href="https://x/page">page</a>
            <a href="https://x/episode.MP3">listen</a>
            <video poster='https://x/poster.jpg' src=https://x/v.mp4></video>
            <link rel="stylesheet" href="https://x/site.css">
            <img src="/relative.png">
            <iframe src="https://x/embed"></iframe>
        "#;
        assert_eq!(
            collect_asset_urls(html),
            vec![
                "https://x/episode.MP3",
                "https://x/poster.jpg",
                "https://x/site.css",
                "https://x/v.mp4",
                "https://x/y.png",
            ]
        );
    }

    #[test]
    fn markup_inside_comments_and_scripts_is_not_an_asset() {
        let html = r#"<!-- <img src="https://x/old.png"> --><script>var s = '<img src="https://x/js.png">';</script>"#;
        assert!(collect_asset_urls(html).is_empty());
    }

    #[test]
    fn attribute_text_that_looks_like_src_is_left_alone() {
        let html = r#"<img alt="see src=https://x/z.png" src="https://x/y.png">"#;
        assert_eq!(collect_asset_urls(html), vec!["https://x/y.png"]);

        let resolved = HashMap::from([
            ("https://x/y.png".to_string(), "assets/y.png".to_string()),
            ("https://x/z.png".to_string(), "assets/z.png".to_string()),
        ]);
        assert_eq!(
            rewrite_asset_urls(html, &resolved),
            r#"<img alt="see src=https://x/z.png" src="assets/y.png">"#
        );
    }

    #[test]
    fn rewrites_resolved_urls_and_keeps_the_rest() {
        let html = r#"<img class="hero" src="https://x/y.png?a=1&amp;b=2"><a href="https://x/y.png?a=1&amp;b=2">full</a>"#;
        let resolved = HashMap::from([(
            "https://x/y.png?a=1&b=2".to_string(),
            "../assets/abc.png".to_string(),
        )]);
        assert_eq!(
            rewrite_asset_urls(html, &resolved),
            r#"<img class="hero" src="../assets/abc.png"><a href="https://x/y.png?a=1&amp;b=2">full</a>"#
        );
    }

    #[test]
    fn unchanged_bodies_are_returned_verbatim() {
        let html = "<p>Fish &amp; chips<br/></p><img src='https://x/keep.png'>";
        let resolved = HashMap::from([("https://x/other.png".to_string(), "o.png".to_string())]);
        assert_eq!(rewrite_asset_urls(html, &resolved), html);
    }

    #[test]
    fn rewrites_srcset_candidates() {
        let html = r#"<img srcset="https://x/a.png 1x, https://x/b.png 2x">"#;
        let resolved = HashMap::from([("https://x/b.png".to_string(), "b.png".to_string())]);
        assert_eq!(
            rewrite_asset_urls(html, &resolved),
            r#"<img srcset="https://x/a.png 1x, b.png 2x">"#
        );
    }
}
