use std::sync::Arc;
use std::time::Instant;

use importer_logging::{import_info, import_warn};

use crate::assets::{AssetFetcher, AssetSettings, LocalAssetFetcher};
use crate::config::{ImportConfig, ImportOptions};
use crate::convert::{Html2MdService, MarkdownService};
use crate::dircache::DirectoryCache;
use crate::error::ImportError;
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::persist::{DirectoryPersist, PersistSink};
use crate::pipeline::{CollectOptions, Collected, EntryPipeline};
use crate::resolve::PathResolver;
use crate::skip::SkipPolicy;
use crate::source::{Source, SourceContext, SourceRegistry};
use crate::transform::ContentTransformer;
use crate::types::{ResolvedEntry, RunReport, WriteReport};
use crate::writer::Writer;

/// The pluggable services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub assets: Arc<dyn AssetFetcher>,
    pub markdown: Arc<dyn MarkdownService>,
    pub persist: Arc<dyn PersistSink>,
    pub dirs: Arc<DirectoryCache>,
}

/// Owns the sources and stages of one import.
pub struct Importer {
    options: ImportOptions,
    sources: Vec<Box<dyn Source>>,
    pipeline: EntryPipeline,
    writer: Writer,
    collaborators: Collaborators,
}

impl Importer {
    pub fn new(options: ImportOptions, collaborators: Collaborators) -> Self {
        for selector in &options.preserved_selectors {
            collaborators.markdown.add_preserved_selector(selector);
        }
        let skip = SkipPolicy::from_options(&options);
        let transformer = ContentTransformer::new(
            collaborators.assets.clone(),
            collaborators.markdown.clone(),
            &options.output_folder,
        );
        let pipeline = EntryPipeline::new(
            PathResolver::from_options(&options),
            transformer,
            skip,
            collaborators.markdown.clone(),
            options.dry_run,
        );
        let writer = Writer::new(
            skip,
            collaborators.dirs.clone(),
            collaborators.persist.clone(),
            options.dry_run,
        );
        Self {
            options,
            sources: Vec::new(),
            pipeline,
            writer,
            collaborators,
        }
    }

    /// Wire the stock collaborators and every configured source.
    pub fn from_config(config: &ImportConfig) -> Result<Self, ImportError> {
        let options = config.validate()?;
        importer_logging::set_verbose(options.verbose);

        let dirs = Arc::new(DirectoryCache::new(options.dry_run));
        let asset_http: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(FetchSettings::default()));
        let assets = Arc::new(LocalAssetFetcher::new(
            asset_http,
            AssetSettings::from_options(&options),
            dirs.clone(),
        ));
        let mut persist = DirectoryPersist::new(&options.output_folder);
        if let Some(target) = &config.persist {
            persist.set_target(target)?;
        }

        let registry = SourceRegistry::with_defaults();
        let context = SourceContext {
            http: Arc::new(ReqwestFetcher::new(FetchSettings::for_feeds())),
        };
        let sources = config
            .sources
            .iter()
            .map(|source| registry.build(source, &context))
            .collect::<Result<Vec<_>, _>>()?;

        let mut importer = Self::new(
            options,
            Collaborators {
                assets,
                markdown: Arc::new(Html2MdService::new()),
                persist: Arc::new(persist),
                dirs,
            },
        );
        for source in sources {
            importer.add_source(source);
        }
        Ok(importer)
    }

    pub fn add_source(&mut self, source: Box<dyn Source>) {
        self.sources.push(source);
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Gather and transform entries without writing. With `for_write`, entries
    /// the writer would skip are dropped early.
    pub async fn collect(&mut self, for_write: bool) -> Result<Collected, ImportError> {
        let options = CollectOptions {
            format: self.options.format,
            within: self.options.within,
            for_write,
        };
        self.pipeline.collect(&mut self.sources, &options).await
    }

    pub async fn write(&self, entries: &[ResolvedEntry]) -> Result<WriteReport, ImportError> {
        self.writer.write(entries).await
    }

    /// Collect then write.
    pub async fn run(&mut self) -> Result<RunReport, ImportError> {
        let started = Instant::now();
        if self.sources.is_empty() {
            import_warn!("No sources configured; nothing to import");
        }

        let collected = self.collect(true).await?;
        let write = self.write(&collected.entries).await?;
        let report = RunReport {
            pipeline: collected.report,
            write,
            assets: self.collaborators.assets.stats(),
            convert: self.collaborators.markdown.stats(),
            dry_run: self.options.dry_run,
            elapsed: started.elapsed(),
        };
        import_info!("{report}");
        Ok(report)
    }
}
