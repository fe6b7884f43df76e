use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, REFERER};
use reqwest::{Client, StatusCode};
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::config::Config;
use crate::ident::ChallengeId;
use crate::{info_time, Error, Result};

/// Upper bound on the buffer reserved up front for a media entry.
const MAX_MEDIA_PREALLOC: u64 = 16 << 20;

/// Where challenge pages and images come from.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Raw markup of the challenge page.
    async fn page(&self, id: ChallengeId) -> Result<String>;

    /// Stores the challenge image and returns its reference, if the challenge has one.
    async fn image(&self, id: ChallengeId) -> Result<Option<String>>;
}

/// Fetches from the NEJM site over HTTP.
#[derive(Debug, Clone)]
pub struct NejmClient {
    // Client uses Arc so we can clone cheaply
    client: Client,
    page_url: String,
    media_url: String,
    /// Directory image references are relative to.
    image_root: PathBuf,
    images_dir: PathBuf,
}

impl NejmClient {
    /// Images are written to `image_root/<images_dir>`; the stored reference
    /// is relative to `image_root`.
    pub fn new(config: &Config, image_root: impl Into<PathBuf>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, header_value(&config.referer)?);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            page_url: config.page_url.clone(),
            media_url: config.media_url.clone(),
            image_root: image_root.into(),
            images_dir: config.images_dir.clone(),
        })
    }

    async fn get(
        &self,
        id: ChallengeId,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let res = self.client.get(url).query(query).send().await?;
        match res.status() {
            s if s.is_success() => Ok(res),
            StatusCode::NOT_FOUND => Err(Error::NotFound(id)),
            s => Err(Error::Network(format!("HTTP {s} for {}", res.url()))),
        }
    }
}

#[async_trait]
impl Fetcher for NejmClient {
    async fn page(&self, id: ChallengeId) -> Result<String> {
        let start_time = Local::now();
        let res = self.get(id, &self.page_url, &page_query(id)).await?;
        let html = res.text().await?;
        info_time!(start_time, "Requested challenge page {id}");
        Ok(html)
    }

    async fn image(&self, id: ChallengeId) -> Result<Option<String>> {
        let res = self.get(id, &self.media_url, &bundle_query(id)).await?;
        let bundle = res.bytes().await?.to_vec();

        let Some(image) = spawn_blocking(move || slide_image(&bundle)).await?? else {
            debug!(%id, "slide bundle holds no challenge image");
            return Ok(None);
        };

        let reference = self.images_dir.join(image_file_name(id));
        let target = self.image_root.join(&reference);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, image).await?;
        debug!(%id, path = %target.display(), "wrote challenge image");

        Ok(Some(reference_string(&reference)))
    }
}

fn page_query(id: ChallengeId) -> [(&'static str, String); 3] {
    [
        ("ci", id.to_string()),
        ("startFrom", "41".into()),
        ("startPage", "3".into()),
    ]
}

fn bundle_query(id: ChallengeId) -> [(&'static str, String); 2] {
    [("id", format!("IC{id}")), ("format", "pptx".into())]
}

pub fn image_file_name(id: ChallengeId) -> String {
    format!("nejm_{id}.jpg")
}

/// Forward slashes on every platform so the store stays portable.
fn reference_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// The slide bundle is a zip archive. Its first media entry is the publisher
/// banner, the second is the challenge image.
pub fn slide_image(bundle: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bundle))?;

    let mut media_seen = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || !entry.name().starts_with("ppt/media/") {
            continue;
        }
        media_seen += 1;
        if media_seen == 2 {
            let mut buf = Vec::with_capacity(prealloc(entry.size()));
            entry.read_to_end(&mut buf)?;
            return Ok(Some(buf));
        }
    }
    Ok(None)
}

/// The declared size comes from the downloaded archive and isn't trusted.
fn prealloc(declared: u64) -> usize {
    declared.min(MAX_MEDIA_PREALLOC) as usize
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Config(format!("invalid header value: {value}")))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use super::*;

    fn bundle(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn id() -> ChallengeId {
        "20051013".parse().unwrap()
    }

    #[test]
    fn test_slide_image_takes_second_media_entry() {
        let data = bundle(&[
            ("[Content_Types].xml", "<xml/>"),
            ("ppt/media/image1.png", "banner"),
            ("ppt/slides/slide1.xml", "<slide/>"),
            ("ppt/media/image2.jpeg", "challenge"),
            ("ppt/media/image3.jpeg", "answer"),
        ]);
        assert_eq!(slide_image(&data).unwrap().as_deref(), Some(&b"challenge"[..]));
    }

    #[test]
    fn test_slide_image_needs_two_media_entries() {
        let data = bundle(&[("ppt/media/image1.png", "banner")]);
        assert_eq!(slide_image(&data).unwrap(), None);
    }

    #[test]
    fn test_slide_image_rejects_non_zip() {
        assert!(matches!(slide_image(b"<html>blocked</html>"), Err(Error::Zip(_))));
    }

    #[test]
    fn test_declared_entry_size_is_capped() {
        assert_eq!(prealloc(6), 6);
        assert_eq!(prealloc(0xFFFF_FFF0), MAX_MEDIA_PREALLOC as usize);
        assert_eq!(prealloc(u64::MAX), MAX_MEDIA_PREALLOC as usize);
    }

    #[test]
    fn test_queries_carry_the_id() {
        assert_eq!(page_query(id())[0], ("ci", "20051013".to_string()));
        assert_eq!(bundle_query(id())[0], ("id", "IC20051013".to_string()));
        assert_eq!(image_file_name(id()), "nejm_20051013.jpg");
    }

    #[test]
    fn test_reference_uses_forward_slashes() {
        let path = Path::new("data").join("images").join("nejm_20051013.jpg");
        assert_eq!(reference_string(&path), "data/images/nejm_20051013.jpg");
    }

    #[test]
    fn test_client_builds_from_default_config() {
        assert!(NejmClient::new(&Config::default(), ".").is_ok());
    }
}
