use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use importer_logging::{import_debug, import_warn};

use crate::assets::AssetFetcher;
use crate::convert::{ConvertError, MarkdownService};
use crate::rewrite::{collect_asset_urls, rewrite_asset_urls};
use crate::types::{ContentType, OutputFormat, ResolvedEntry};

/// Rewrites asset references and converts a single entry body.
pub struct ContentTransformer {
    fetcher: Arc<dyn AssetFetcher>,
    markdown: Arc<dyn MarkdownService>,
    /// Stand-in document location for entries that will not be written.
    fallback_document: PathBuf,
}

impl ContentTransformer {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        markdown: Arc<dyn MarkdownService>,
        output_folder: &Path,
    ) -> Self {
        Self {
            fetcher,
            markdown,
            fallback_document: output_folder.join("index"),
        }
    }

    fn document_path(&self, resolved: &ResolvedEntry) -> PathBuf {
        resolved
            .file_path()
            .as_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.fallback_document.clone())
    }

    /// Replace each related media URL with a local reference, one at a time.
    /// Unavailable media keeps its remote URL.
    pub async fn resolve_media(&self, resolved: &mut ResolvedEntry) {
        if !self.fetcher.downloads_enabled() || resolved.entry().media.is_empty() {
            return;
        }
        let document = self.document_path(resolved);
        let entry = resolved.entry_mut();
        for (kind, url) in entry.media.iter_mut() {
            match self.fetcher.fetch_asset(url, &document).await {
                Ok(local) => *url = local,
                Err(err) => import_warn!("Keeping remote {kind} {url}: {err}"),
            }
        }
    }

    /// Transform the body for its target format. Consumes the entry and hands it back.
    pub async fn transform(
        &self,
        mut resolved: ResolvedEntry,
    ) -> Result<ResolvedEntry, ConvertError> {
        let to_markdown = resolved.target() == OutputFormat::Markdown;
        let document = self.document_path(&resolved);
        let entry = resolved.entry_mut();

        match entry.content_type {
            ContentType::Html => {
                if !to_markdown {
                    // Nothing downstream decodes entities for HTML output.
                    entry.content = html_escape::decode_html_entities(&entry.content).into_owned();
                }
                if self.fetcher.downloads_enabled() {
                    entry.content = self.rewrite_assets(&entry.content, &document).await;
                }
                if to_markdown {
                    self.markdown.init().await?;
                    let markdown = self.markdown.to_markdown(&entry.content, entry).await?;
                    entry.content = markdown;
                }
            }
            ContentType::Text => {
                if to_markdown {
                    entry.content = entry.content.replace("\\n", "\n");
                }
            }
            ContentType::Markdown => {}
        }

        Ok(resolved)
    }

    async fn rewrite_assets(&self, html: &str, document: &Path) -> String {
        let urls = collect_asset_urls(html);
        if urls.is_empty() {
            return html.to_string();
        }
        let lookups = urls.into_iter().map(|url| async move {
            let result = self.fetcher.fetch_asset(&url, document).await;
            (url, result)
        });
        let resolved: HashMap<String, String> = join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(url, result)| match result {
                Ok(local) => Some((url, local)),
                Err(err) => {
                    import_debug!("Leaving {url} unchanged: {err}");
                    None
                }
            })
            .collect();
        rewrite_asset_urls(html, &resolved)
    }
}
