use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use base64::Engine;
use tracing::debug;

use super::{ConfigFetcher, Device};
use crate::error::{FetchErrorKind, Result, TrackerError};

/// Reads saved documents from `<dir>/<device name>.xml`.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    dir: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, device: &Device) -> PathBuf {
        self.dir.join(format!("{}.xml", device.name))
    }
}

impl ConfigFetcher for DirectoryFetcher {
    fn fetch(&self, device: &Device) -> Result<String> {
        let path = self.path_for(device);
        debug!(device = %device.name, path = %path.display(), "reading configuration");

        fs::read_to_string(&path).map_err(|e| {
            let kind = match e.kind() {
                ErrorKind::NotFound => FetchErrorKind::NotFound,
                ErrorKind::PermissionDenied => FetchErrorKind::AuthFailed,
                ErrorKind::InvalidData => FetchErrorKind::InvalidData,
                _ => FetchErrorKind::Transport,
            };
            TrackerError::fetch(kind, &device.name, format!("{}: {}", path.display(), e))
        })
    }
}

/// Retrieves documents over HTTP(S).
///
/// The URL template may contain `{address}` (management address) and
/// `{name}` (device name) placeholders.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    url_template: String,
    credentials: Option<(String, String)>,
}

impl HttpFetcher {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            credentials: None,
        }
    }

    /// Send HTTP basic authentication with every request
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn url_for(&self, device: &Device) -> String {
        self.url_template
            .replace("{address}", &device.management_address)
            .replace("{name}", &device.name)
    }

    fn authorization(&self) -> Option<String> {
        self.credentials.as_ref().map(|(username, password)| {
            let credentials = format!("{}:{}", username, password);
            format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode(credentials)
            )
        })
    }
}

impl ConfigFetcher for HttpFetcher {
    fn fetch(&self, device: &Device) -> Result<String> {
        if self.url_template.trim().is_empty() {
            return Err(TrackerError::fetch(
                FetchErrorKind::NotConfigured,
                &device.name,
                "no URL template configured",
            ));
        }

        let url = self.url_for(device);
        debug!(device = %device.name, url = %url, "downloading configuration");

        let mut request = ureq::get(url.as_str());
        if let Some(auth) = self.authorization() {
            request = request.header("Authorization", auth);
        }

        let response = request.call().map_err(|e| {
            let kind = match e {
                ureq::Error::StatusCode(401 | 403) => FetchErrorKind::AuthFailed,
                ureq::Error::StatusCode(404) => FetchErrorKind::NotFound,
                _ => FetchErrorKind::Transport,
            };
            TrackerError::fetch(kind, &device.name, format!("Download failed: {}", e))
        })?;

        let (_, body) = response.into_parts();
        let mut reader = body.into_reader();
        let mut text = String::new();
        reader.read_to_string(&mut text).map_err(|e| {
            TrackerError::fetch(FetchErrorKind::InvalidData, &device.name, e.to_string())
        })?;
        Ok(text)
    }
}
