use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ego_tree::NodeId;
use importer_logging::import_debug;
use scraper::node::{Node, Text};
use scraper::{ElementRef, Html, Selector};

use crate::types::{ConvertStats, Entry};

/// Elements dropped before conversion; each removal counts as "cleaned".
const NOISE_SELECTOR: &str = "script, style, noscript, template";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid preserved selector `{0}`")]
    InvalidSelector(String),
    #[error("conversion failed for {url}: {message}")]
    Failed { url: String, message: String },
}

/// HTML to Markdown conversion shared by every entry of a run.
#[async_trait::async_trait]
pub trait MarkdownService: Send + Sync {
    /// Prepare shared state. Safe to call any number of times.
    async fn init(&self) -> Result<(), ConvertError>;

    async fn to_markdown(&self, html: &str, entry: &Entry) -> Result<String, ConvertError>;

    /// Subtrees matching `selector` are emitted as raw HTML instead of converted.
    fn add_preserved_selector(&self, selector: &str);

    /// Release shared state. The next conversion re-initializes.
    async fn cleanup(&self);

    fn stats(&self) -> ConvertStats;
}

struct Compiled {
    preserved: Vec<Selector>,
    noise: Selector,
}

#[derive(Default)]
pub struct Html2MdService {
    selectors: Mutex<Vec<String>>,
    compiled: Mutex<Option<Arc<Compiled>>>,
    converted: AtomicUsize,
    cleaned: AtomicUsize,
}

impl Html2MdService {
    pub fn new() -> Self {
        Self::default()
    }

    fn compiled(&self) -> Result<Arc<Compiled>, ConvertError> {
        let mut slot = self
            .compiled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(compiled) = slot.as_ref() {
            return Ok(compiled.clone());
        }

        let selectors = self
            .selectors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let preserved = selectors
            .iter()
            .map(|raw| {
                Selector::parse(raw).map_err(|_| ConvertError::InvalidSelector(raw.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let noise = Selector::parse(NOISE_SELECTOR)
            .map_err(|_| ConvertError::InvalidSelector(NOISE_SELECTOR.to_string()))?;

        let compiled = Arc::new(Compiled { preserved, noise });
        *slot = Some(compiled.clone());
        import_debug!(
            "Markdown service ready ({} preserved selectors)",
            selectors.len()
        );
        Ok(compiled)
    }
}

#[async_trait::async_trait]
impl MarkdownService for Html2MdService {
    async fn init(&self) -> Result<(), ConvertError> {
        self.compiled().map(|_| ())
    }

    async fn to_markdown(&self, html: &str, entry: &Entry) -> Result<String, ConvertError> {
        let compiled = self.compiled()?;
        let (markdown, cleaned) = convert_html(&compiled, html);
        self.converted.fetch_add(1, Ordering::Relaxed);
        self.cleaned.fetch_add(cleaned, Ordering::Relaxed);
        import_debug!("Converted {} ({cleaned} elements cleaned)", entry.url);
        Ok(markdown)
    }

    fn add_preserved_selector(&self, selector: &str) {
        self.selectors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(selector.to_string());
        // Recompile on next use.
        *self
            .compiled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    async fn cleanup(&self) {
        *self
            .compiled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn stats(&self) -> ConvertStats {
        ConvertStats {
            converted: self.converted.load(Ordering::Relaxed),
            cleaned: self.cleaned.load(Ordering::Relaxed),
        }
    }
}

fn convert_html(compiled: &Compiled, html: &str) -> (String, usize) {
    let mut doc = Html::parse_fragment(html);

    // Preserved subtrees go first so noise inside them survives verbatim.
    let mut preserved = Vec::new();
    for id in outermost_matches(&doc, &compiled.preserved) {
        let Some(raw) = doc.tree.get(id).and_then(ElementRef::wrap).map(|el| el.html()) else {
            continue;
        };
        let marker = placeholder(preserved.len());
        preserved.push(raw);
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.insert_before(Node::Text(Text {
                text: marker.as_str().into(),
            }));
            node.detach();
        }
    }

    let noise = outermost_matches(&doc, std::slice::from_ref(&compiled.noise));
    for id in &noise {
        if let Some(mut node) = doc.tree.get_mut(*id) {
            node.detach();
        }
    }

    let mut markdown = html2md::parse_html(&doc.root_element().inner_html());
    for (index, raw) in preserved.iter().enumerate() {
        markdown = markdown.replace(&placeholder(index), raw);
    }
    (markdown, noise.len())
}

/// Matching elements in document order, minus those nested inside another match.
fn outermost_matches(doc: &Html, selectors: &[Selector]) -> Vec<NodeId> {
    let mut ordered = Vec::new();
    let mut seen = HashSet::new();
    for selector in selectors {
        for element in doc.select(selector) {
            if seen.insert(element.id()) {
                ordered.push(element.id());
            }
        }
    }
    ordered.retain(|id| {
        doc.tree
            .get(*id)
            .is_some_and(|node| node.ancestors().all(|a| !seen.contains(&a.id())))
    });
    ordered
}

fn placeholder(index: usize) -> String {
    format!("PRESERVEDHTMLBLOCK{index}X")
}
