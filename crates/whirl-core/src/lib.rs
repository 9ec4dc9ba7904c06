pub mod index;
pub mod io;
pub mod pipeline;
pub mod reporter;
pub mod select;

pub use index::{ReleaseRecord, parse_releases, resolve_url};
pub use io::fetch::{Fetcher, IndexPage};
pub use io::http::{FetchError, HttpClient, HttpResponse, ReqwestClient};
pub use io::install::{ArtifactInstaller, InstallError, WheelUnpacker};
pub use pipeline::{Pipeline, PipelineConfig, Report};
pub use reporter::{NullReporter, Reporter};
pub use select::{NoCompatibleArtifact, Selection, select_candidate};

/// User Agent string for index and artifact requests
pub const USER_AGENT: &str = concat!("whirl/", env!("CARGO_PKG_VERSION"));

/// Index used when none is configured.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple";
