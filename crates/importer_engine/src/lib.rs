//! Import engine: turns source entries into files on disk.
mod assets;
mod config;
mod convert;
mod dircache;
mod error;
mod fetch;
mod filename;
mod frontmatter;
mod importer;
mod persist;
mod pipeline;
mod resolve;
mod rewrite;
mod skip;
mod source;
mod transform;
mod types;
mod writer;

pub use assets::{relative_reference, AssetFetcher, AssetSettings, LocalAssetFetcher};
pub use config::{parse_duration, AssetMode, ConfigError, ImportConfig, ImportOptions, SourceConfig};
pub use convert::{ConvertError, Html2MdService, MarkdownService};
pub use dircache::DirectoryCache;
pub use error::ImportError;
pub use fetch::{FetchMetadata, FetchOutput, FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::{content_hash, normalize_path, slugify};
pub use frontmatter::build_document;
pub use importer::{Collaborators, Importer};
pub use persist::{write_atomic, DirectoryPersist, PersistError, PersistKind, PersistMeta, PersistSink};
pub use pipeline::{CollectOptions, Collected, EntryPipeline};
pub use resolve::{PathResolver, ResolveError};
pub use rewrite::{collect_asset_urls, rewrite_asset_urls};
pub use skip::SkipPolicy;
pub use source::{
    JsonFeedSource, JsonFileSource, PathOverrideFn, Source, SourceContext, SourceError,
    SourceFactory, SourceRegistry,
};
pub use transform::ContentTransformer;
pub use types::{
    AssetStats, Author, ContentType, ConvertStats, Entry, EntryFailure, EntryStatus,
    FailureKind, FetchError, FilePath, OutputFormat, PathOverride, PipelineReport, ResolvedEntry,
    RunReport, WriteReport,
};
pub use writer::Writer;
