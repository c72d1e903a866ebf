use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use futures_util::StreamExt;
use importer_logging::{import_verbose, import_warn};

use crate::convert::MarkdownService;
use crate::error::ImportError;
use crate::resolve::PathResolver;
use crate::skip::SkipPolicy;
use crate::source::Source;
use crate::transform::ContentTransformer;
use crate::types::{EntryFailure, OutputFormat, PipelineReport, ResolvedEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectOptions {
    pub format: OutputFormat,
    pub within: Option<DateTime<Utc>>,
    /// Apply the skip policy up front because the result is headed for disk.
    pub for_write: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    /// Newest first; equal dates keep their collection order.
    pub entries: Vec<ResolvedEntry>,
    pub report: PipelineReport,
}

/// Gathers entries from every source and transforms them concurrently.
pub struct EntryPipeline {
    resolver: PathResolver,
    transformer: ContentTransformer,
    skip: SkipPolicy,
    markdown: Arc<dyn MarkdownService>,
    dry_run: bool,
}

impl EntryPipeline {
    pub fn new(
        resolver: PathResolver,
        transformer: ContentTransformer,
        skip: SkipPolicy,
        markdown: Arc<dyn MarkdownService>,
        dry_run: bool,
    ) -> Self {
        Self {
            resolver,
            transformer,
            skip,
            markdown,
            dry_run,
        }
    }

    pub async fn collect(
        &self,
        sources: &mut [Box<dyn Source>],
        options: &CollectOptions,
    ) -> Result<Collected, ImportError> {
        let mut report = PipelineReport::default();
        for source in sources.iter_mut() {
            source.set_within(options.within);
        }

        let mut pending = Vec::new();
        for source in sources.iter_mut() {
            let mut raw = Vec::new();
            {
                let mut stream = source.entries();
                while let Some(entry) = stream.next().await {
                    raw.push(entry?);
                }
            }

            let source: &dyn Source = &**source;
            let target = if options.format == OutputFormat::Markdown && source.supports_markdown() {
                OutputFormat::Markdown
            } else {
                OutputFormat::Html
            };
            for entry in raw {
                report.found += 1;
                let file_path = match self.resolver.resolve(&entry, source, target) {
                    Ok(file_path) => file_path,
                    Err(err) => {
                        import_warn!("Dropping {}: {err}", entry.url);
                        report.failures.push(EntryFailure {
                            url: entry.url,
                            message: err.to_string(),
                        });
                        continue;
                    }
                };
                let resolved = ResolvedEntry::new(entry, file_path, target);
                if options.for_write && self.skip.should_skip(&resolved) {
                    report.skipped += 1;
                    import_verbose!(
                        "Skipping {} from {}",
                        resolved.file_path(),
                        resolved.entry().url
                    );
                    continue;
                }
                pending.push(resolved);
            }
        }

        let tasks = pending.into_iter().map(|mut resolved| async move {
            let url = resolved.entry().url.clone();
            self.transformer.resolve_media(&mut resolved).await;
            self.transformer
                .transform(resolved)
                .await
                .map_err(|err| EntryFailure {
                    url,
                    message: err.to_string(),
                })
        });
        let mut entries = Vec::new();
        for outcome in join_all(tasks).await {
            match outcome {
                Ok(resolved) => entries.push(resolved),
                Err(failure) => {
                    import_warn!("Failed to transform {}: {}", failure.url, failure.message);
                    report.failures.push(failure);
                }
            }
        }

        if !self.dry_run {
            self.markdown.cleanup().await;
        }

        entries.sort_by(|a, b| b.entry().date.cmp(&a.entry().date));
        Ok(Collected { entries, report })
    }
}
