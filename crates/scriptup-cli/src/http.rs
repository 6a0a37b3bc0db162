use reqwest::blocking::Client;
use scriptup_core::{UpdateError, UpdateSettings, VersionDocument};
use scriptup_updater::ReleaseSource;
use serde::Deserialize;
use tracing::debug;

/// One release as returned by a releases-by-tag endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseListing {
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl ReleaseListing {
    pub fn from_json_str(input: &str) -> Result<Self, UpdateError> {
        serde_json::from_str(input)
            .map_err(|err| UpdateError::Download(format!("invalid release listing: {err}")))
    }

    /// Exact file-name match only; near-misses never count.
    pub fn find_asset(&self, asset_name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == asset_name)
    }
}

pub struct HttpReleaseSource {
    client: Client,
    metadata_url: String,
    release_root: String,
}

impl HttpReleaseSource {
    pub fn new(settings: &UpdateSettings) -> Self {
        Self {
            client: Client::new(),
            metadata_url: settings.metadata_url.clone(),
            release_root: settings.release_root.trim_end_matches('/').to_string(),
        }
    }

    fn get_text(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client.get(url).send()?.error_for_status()?.text()
    }
}

impl ReleaseSource for HttpReleaseSource {
    fn fetch_version_document(&self) -> Result<VersionDocument, UpdateError> {
        debug!("fetching version document from {}", self.metadata_url);
        let raw = self
            .get_text(&self.metadata_url)
            .map_err(|err| UpdateError::Metadata(format!("fetch failed: {err}")))?;
        VersionDocument::from_json_str(&raw)
    }

    fn fetch_release_asset(&self, tag: &str, asset_name: &str) -> Result<Vec<u8>, UpdateError> {
        let listing_url = format!("{}/{tag}", self.release_root);
        debug!("fetching release listing from {listing_url}");
        let raw = self
            .get_text(&listing_url)
            .map_err(|err| UpdateError::Download(format!("release lookup failed: {err}")))?;
        let listing = ReleaseListing::from_json_str(&raw)?;

        let asset = listing
            .find_asset(asset_name)
            .ok_or_else(|| UpdateError::AssetNotFound {
                asset: asset_name.to_string(),
                tag: tag.to_string(),
            })?;

        debug!("downloading asset from {}", asset.browser_download_url);
        let bytes = self
            .client
            .get(&asset.browser_download_url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(|err| UpdateError::Download(format!("asset download failed: {err}")))?;

        Ok(bytes.to_vec())
    }
}
