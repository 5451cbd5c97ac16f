//! Target addresses and their (bucket, object) resolution.
//!
//! A [`Locator`] is parsed once from an address such as
//! `https://my-bucket.s3.us-west-2.amazonaws.com/photos/a.jpg` or
//! `http://localhost:9000/my-bucket/photos/a.jpg` and never changes.
//! [`Locator::resolve`] splits it into bucket and object, taking the bucket
//! from the host name when the address is virtual-host style.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use ruststack_core::BucketLookup;

/// Separator used when none is given.
pub const DEFAULT_SEPARATOR: char = '/';

/// Host names of services that carry the bucket as the leading host label.
///
/// Group 1 is the bucket, group 2 the service host. Regional, dualstack and
/// accelerated Amazon hosts and Google Cloud Storage are recognized.
static BUCKET_IN_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(.+)\.(s3[.-](?:dualstack\.)?(?:[a-z0-9-]+\.)*amazonaws\.com(?:\.cn)?|storage\.googleapis\.com)$",
    )
    .expect("static pattern is valid")
});

static AMAZON_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\.)s3[.-](?:dualstack\.)?(?:[a-z0-9-]+\.)*amazonaws\.com(?:\.cn)?$")
        .expect("static pattern is valid")
});

static AMAZON_CHINA_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^s3\.(cn.*?)\.amazonaws\.com\.cn$").expect("static pattern is valid")
});

/// A parsed target address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    scheme: String,
    host: String,
    path: String,
    separator: char,
    virtual_host: bool,
}

impl Locator {
    /// Parse an address, deciding virtual-host style from `lookup`.
    ///
    /// Accepts `scheme://host[:port]/path` and bare paths. Parsing never
    /// fails; missing parts are left empty.
    #[must_use]
    pub fn parse(address: &str, lookup: BucketLookup) -> Self {
        let (scheme, host, path) = match address.split_once("://") {
            Some((scheme, rest)) => match rest.find('/') {
                Some(pos) => (scheme, &rest[..pos], rest[pos..].to_owned()),
                None => (scheme, rest, String::new()),
            },
            None if address.is_empty() || address.starts_with(DEFAULT_SEPARATOR) => {
                ("", "", address.to_owned())
            }
            None => ("", "", format!("{DEFAULT_SEPARATOR}{address}")),
        };

        Self {
            scheme: scheme.to_owned(),
            host: host.to_owned(),
            path,
            separator: DEFAULT_SEPARATOR,
            virtual_host: !host.is_empty() && is_virtual_host_style(host, lookup),
        }
    }

    /// A path-style locator on `host`.
    #[must_use]
    pub fn path_style(scheme: &str, host: &str, path: &str) -> Self {
        Self {
            scheme: scheme.to_owned(),
            host: host.to_owned(),
            path: path.to_owned(),
            separator: DEFAULT_SEPARATOR,
            virtual_host: false,
        }
    }

    /// URL scheme, empty for bare paths.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host with optional port.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path component.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Key separator.
    #[must_use]
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Whether the bucket may be carried in the host name.
    #[must_use]
    pub fn is_virtual_host(&self) -> bool {
        self.virtual_host
    }

    /// `scheme://host` of this locator, or empty for bare paths.
    #[must_use]
    pub fn endpoint(&self) -> String {
        if self.scheme.is_empty() {
            self.host.clone()
        } else {
            format!("{}://{}", self.scheme, self.host)
        }
    }

    /// Split into (bucket, object).
    ///
    /// Absent parts come back as empty strings.
    #[must_use]
    pub fn resolve(&self) -> (String, String) {
        let sep = self.separator;
        let path = match self.host_bucket() {
            Some((bucket, _)) => format!("{sep}{bucket}{}", self.path),
            None => self.path.clone(),
        };

        let mut tokens = path.splitn(3, sep);
        let _ = tokens.next();
        let bucket = tokens.next().unwrap_or_default().to_owned();
        let object = tokens.next().unwrap_or_default().to_owned();
        (bucket, object)
    }

    /// Fully qualified, path-style locator for `key` in `bucket`.
    #[must_use]
    pub fn child(&self, bucket: &str, key: &str) -> Self {
        let host = match self.host_bucket() {
            Some((_, service)) => service.to_owned(),
            None => self.host.clone(),
        };
        let sep = self.separator;
        Self {
            scheme: self.scheme.clone(),
            host,
            path: format!("{sep}{bucket}{sep}{key}"),
            separator: sep,
            virtual_host: false,
        }
    }

    /// Bucket label and service host, when the host carries a bucket.
    fn host_bucket(&self) -> Option<(&str, &str)> {
        if !self.virtual_host {
            return None;
        }
        let caps = BUCKET_IN_HOST.captures(strip_port(&self.host))?;
        let bucket = caps.get(1)?.as_str();
        // Keep any port on the service host.
        let service = &self.host[bucket.len() + 1..];
        Some((bucket, service))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme.is_empty() {
            write!(f, "{}{}", self.host, self.path)
        } else {
            write!(f, "{}://{}{}", self.scheme, self.host, self.path)
        }
    }
}

/// Whether requests to `host` should carry the bucket in the host name.
#[must_use]
pub fn is_virtual_host_style(host: &str, lookup: BucketLookup) -> bool {
    match lookup {
        BucketLookup::Dns => true,
        BucketLookup::Path => false,
        BucketLookup::Auto => {
            let host = strip_port(host);
            (is_amazon(host) && !is_amazon_china(host)) || is_google(host) || is_accelerated(host)
        }
    }
}

fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}

fn is_amazon(host: &str) -> bool {
    host == "s3.amazonaws.com" || AMAZON_HOST.is_match(host)
}

fn is_amazon_china(host: &str) -> bool {
    AMAZON_CHINA_HOST.is_match(host)
}

fn is_accelerated(host: &str) -> bool {
    host == "s3-accelerate.amazonaws.com" || host.ends_with(".s3-accelerate.amazonaws.com")
}

fn is_google(host: &str) -> bool {
    host == "storage.googleapis.com" || host.ends_with(".storage.googleapis.com")
}
