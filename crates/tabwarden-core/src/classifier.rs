//! Distracting-site classifier

use thiserror::Error;

/// Why a site could not be added to the blacklist
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddSiteError {
    #[error("Site cannot be empty")]
    Empty,

    #[error("Site is already blacklisted: {0}")]
    Duplicate(String),
}

/// Blacklisted URL substrings, in the order they were added
///
/// Matching is a plain case-sensitive substring test against the whole URL,
/// with no scheme or host parsing, so `x.com` also matches `netflix.com`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    sites: Vec<String>,
}

impl Blacklist {
    pub fn new<I, S>(sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        for site in sites {
            let site = site.into();
            // Persisted lists come from older versions too; skip junk silently
            if !site.trim().is_empty() && !list.contains(&site) {
                list.sites.push(site);
            }
        }
        list
    }

    /// Whether any blacklisted entry occurs in `url`
    pub fn is_distracting(&self, url: &str) -> bool {
        self.sites.iter().any(|site| url.contains(site.as_str()))
    }

    /// Append a site. Surrounding whitespace is trimmed first.
    pub fn add<'a>(&mut self, site: &'a str) -> Result<&'a str, AddSiteError> {
        let site = site.trim();
        if site.is_empty() {
            return Err(AddSiteError::Empty);
        }
        if self.contains(site) {
            return Err(AddSiteError::Duplicate(site.to_string()));
        }
        self.sites.push(site.to_string());
        Ok(site)
    }

    pub fn contains(&self, site: &str) -> bool {
        self.sites.iter().any(|s| s == site)
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
