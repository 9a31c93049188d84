//! Game identification against the BoardGameGeek catalog.
//!
//! An upload's filename carries the catalog ID (`<ID>_<type>.pdf` or
//! `<ID>.pdf`). The game's display name is the part of the catalog page's
//! `<title>` before the first `" |"`. The catalog answers unknown IDs with a
//! generic page titled `BoardGameGeek`, which is treated as "not found".

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::CatalogConfig;
use crate::error::{QaError, Result};
use crate::extract::extract_pdf_text_blocking;
use crate::models::IdentifiedRulebook;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid entity regex")
});

/// Resolves a catalog ID to the game's display name.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn lookup_title(&self, catalog_id: &str) -> Result<String>;
}

/// HTTP client for the catalog's game pages.
pub struct BggCatalog {
    client: reqwest::Client,
    base_url: String,
    not_found_title: String,
}

impl BggCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("rulebook-qa/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QaError::Catalog(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            not_found_title: config.not_found_title.clone(),
        })
    }

    pub fn page_url(&self, catalog_id: &str) -> String {
        format!("{}{}", self.base_url, catalog_id)
    }
}

#[async_trait]
impl Catalog for BggCatalog {
    async fn lookup_title(&self, catalog_id: &str) -> Result<String> {
        let url = self.page_url(catalog_id);
        tracing::debug!(%url, "fetching catalog page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QaError::Catalog(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(QaError::GameNotFound(catalog_id.to_string()));
        }
        if !status.is_success() {
            return Err(QaError::Catalog(format!("{} returned {}", url, status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| QaError::Catalog(e.to_string()))?;

        let title = parse_game_title(&html)
            .ok_or_else(|| QaError::Catalog(format!("no <title> in page for ID {}", catalog_id)))?;

        if title == self.not_found_title || title.is_empty() {
            return Err(QaError::GameNotFound(catalog_id.to_string()));
        }

        Ok(title)
    }
}

/// Reads the catalog ID out of an upload filename.
///
/// The ID ends at the first `_` when one appears after the first character,
/// otherwise at the first `.`. Only ASCII digits are accepted.
pub fn parse_catalog_id(file_name: &str) -> Result<String> {
    let end = match file_name.find('_') {
        Some(pos) if pos > 0 => pos,
        _ => file_name
            .find('.')
            .ok_or_else(|| QaError::BadFilename(file_name.to_string()))?,
    };

    let id = &file_name[..end];
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QaError::BadFilename(file_name.to_string()));
    }
    Ok(id.to_string())
}

/// Extracts the game name from a catalog page: the `<title>` text up to the
/// first `" |"`, entity-decoded and trimmed.
pub fn parse_game_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let decoded = decode_entities(raw);
    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    let name = match collapsed.find(" |") {
        Some(pos) => &collapsed[..pos],
        None => collapsed.as_str(),
    };
    Some(name.trim().to_string())
}

fn decode_entities(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Identifies the game behind an uploaded rulebook and extracts its text.
///
/// Steps run in order and stop at the first failure: filename → catalog ID,
/// ID → title, PDF → text.
pub async fn identify_rulebook(
    catalog: &dyn Catalog,
    file_name: &str,
    bytes: &[u8],
) -> Result<IdentifiedRulebook> {
    let catalog_id = parse_catalog_id(file_name)?;
    let title = catalog.lookup_title(&catalog_id).await?;
    let text = extract_pdf_text_blocking(file_name, bytes).await?;

    tracing::info!(%catalog_id, %title, chars = text.len(), "identified rulebook");

    Ok(IdentifiedRulebook {
        catalog_id,
        title,
        text,
    })
}
