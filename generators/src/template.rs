//! File-sampled HTTP generator

use std::path::Path;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use stampede_core::{Request, RequestGenerator};
use url::Url;

use crate::error::SourceError;
use crate::{load_entries, seeded_rng};

/// One entry of an HTTP request file
///
/// Every field is optional; unset fields fall back to the base request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpTemplate {
    /// Full target URL, replacing the base one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Host (optionally `host:port`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Path, optionally with a query string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// HTTP method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HttpTemplate {
    /// Apply this template over `base`, validating every override
    pub fn resolve(&self, base: &Request) -> Result<Request, String> {
        let mut url = match &self.url {
            Some(raw) => Url::parse(raw).map_err(|e| format!("invalid url {:?}: {}", raw, e))?,
            None => Url::parse(&base.target)
                .map_err(|e| format!("invalid base url {:?}: {}", base.target, e))?,
        };

        if let Some(host) = non_empty(&self.host) {
            set_authority(&mut url, host)?;
        }

        if let Some(path) = non_empty(&self.path) {
            match path.split_once('?') {
                Some((path, query)) => {
                    url.set_path(path);
                    url.set_query(Some(query));
                }
                None => url.set_path(path),
            }
        }

        let method = match non_empty(&self.method) {
            Some(method) if is_token(method) => method.to_string(),
            Some(method) => return Err(format!("invalid method {:?}", method)),
            None => base.method.clone(),
        };

        let mut request = Request::new(method, url.to_string());
        request.body = self.body.clone().or_else(|| base.body.clone());
        request.deadline = base.deadline;
        Ok(request)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn set_authority(url: &mut Url, authority: &str) -> Result<(), String> {
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port))
            if !host.contains(':') || (host.starts_with('[') && host.ends_with(']')) =>
        {
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("invalid port in host {:?}", authority))?;
            (host, Some(port))
        }
        _ => (authority, None),
    };

    url.set_host(Some(host))
        .map_err(|e| format!("invalid host {:?}: {}", authority, e))?;
    if let Some(port) = port {
        url.set_port(Some(port))
            .map_err(|_| format!("url cannot carry port {}", port))?;
    }
    Ok(())
}

/// RFC 9110 token characters
fn is_token(method: &str) -> bool {
    !method.is_empty()
        && method.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

/// Picks one pre-resolved template uniformly at random per emission
///
/// Sampling is with replacement, so the source is never exhausted.
#[derive(Debug)]
pub struct TemplateGenerator {
    requests: Vec<Request>,
    rng: StdRng,
}

impl TemplateGenerator {
    /// Load templates from `path` and resolve them against `base`
    ///
    /// # Errors
    ///
    /// Fails if the file is unreadable, not a JSON array, empty, or if any
    /// entry resolves to an invalid request (reported by index).
    pub fn from_file(
        path: &Path,
        base: &Request,
        seed: Option<u64>,
    ) -> Result<Self, SourceError> {
        let templates: Vec<HttpTemplate> = load_entries(path)?;
        let generator = Self::from_templates(&templates, base, seed)?;
        tracing::info!(
            count = generator.len(),
            path = %path.display(),
            "Loaded request templates"
        );
        Ok(generator)
    }

    /// Resolve in-memory templates against `base`
    pub fn from_templates(
        templates: &[HttpTemplate],
        base: &Request,
        seed: Option<u64>,
    ) -> Result<Self, SourceError> {
        if templates.is_empty() {
            return Err(SourceError::InvalidBase("no templates given".to_string()));
        }

        let requests = templates
            .iter()
            .enumerate()
            .map(|(index, template)| {
                template
                    .resolve(base)
                    .map_err(|reason| SourceError::entry(index, reason))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            requests,
            rng: seeded_rng(seed),
        })
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Always false for a constructed generator
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl RequestGenerator for TemplateGenerator {
    fn name(&self) -> &str {
        "from_json"
    }

    fn next_request(&mut self) -> Option<Request> {
        let index = self.rng.gen_range(0..self.requests.len());
        Some(self.requests[index].clone())
    }
}
