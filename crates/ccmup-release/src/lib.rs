mod download;
mod fetcher;
mod http;
mod repo;
mod source;
mod tag;

pub use download::{download_file, DownloadTool};
pub use fetcher::{FetchedRelease, ReleaseFetcher};
pub use http::{parse_latest_release_json, tag_from_location, GithubLookup};
pub use repo::RepoId;
pub use source::{GithubSource, OfflineSource, ReleaseSource};
pub use tag::{
    resolve_latest_tag, resolve_release_ref, LatestTagLookup, ReleaseRef, TagRequest, TagStrategy,
    LATEST,
};
