//! Domain pattern compilation
//!
//! Turns a user-supplied domain entry into the engine's URL filters:
//!
//! - `google.com` -> `*://google.com/*` and `*://*.google.com/*`
//! - `*.amazon.com` -> `*://*.amazon.com/*`
//! - `localhost/core/*` -> `*://localhost/core/*`
//!
//! Entries are validated first; a bare `*` or a wildcard in the middle of a
//! host never reaches the engine.

/// Error type for domain pattern validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Domain pattern is empty")]
    Empty,
    #[error("Wildcard must be followed by a domain")]
    BareWildcard,
    #[error("Wildcard is only allowed as the leading label: {0}")]
    MisplacedWildcard(String),
    #[error("Invalid character {0:?} in host")]
    InvalidHostCharacter(char),
    #[error("Empty label in host: {0}")]
    EmptyLabel(String),
    #[error("Invalid port: {0}")]
    InvalidPort(String),
    #[error("Invalid character {0:?} in path")]
    InvalidPathCharacter(char),
}

/// A validated domain entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPattern {
    /// Lower-cased host, with `:port` if one was given, without the wildcard label
    host: String,
    /// Entry started with `*.`
    wildcard: bool,
    /// Path after the host, without the leading slash
    path: Option<String>,
}

impl DomainPattern {
    /// Validate a domain entry.
    pub fn parse(input: &str) -> Result<Self, PatternError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }

        let rest = strip_scheme(trimmed);

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
            None => (rest, None),
        };
        // `host/` is a host-only entry with a trailing slash
        let path = path.filter(|p| !p.is_empty());

        let (wildcard, bare) = match authority.strip_prefix("*.") {
            Some(bare) => (true, bare),
            None => (false, authority),
        };

        if authority == "*" || (wildcard && bare.is_empty()) {
            return Err(PatternError::BareWildcard);
        }
        if bare.is_empty() {
            return Err(PatternError::Empty);
        }
        if bare.contains('*') || (wildcard && bare.starts_with('[')) {
            return Err(PatternError::MisplacedWildcard(authority.to_string()));
        }

        let host = validate_authority(bare)?;

        if let Some(path) = path {
            if let Some(bad) = path
                .chars()
                .find(|c| c.is_whitespace() || *c == '|' || *c == '^')
            {
                return Err(PatternError::InvalidPathCharacter(bad));
            }
        }

        Ok(Self {
            host,
            wildcard,
            path: path.map(str::to_string),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn is_path_scoped(&self) -> bool {
        self.path.is_some()
    }

    /// Engine URL filters for this entry: one for path-scoped or wildcard
    /// entries, exact host plus every subdomain otherwise.
    pub fn url_filters(&self) -> Vec<String> {
        let host = if self.wildcard {
            format!("*.{}", self.host)
        } else {
            self.host.clone()
        };

        match &self.path {
            Some(path) => {
                let suffix = if path.ends_with('*') { "" } else { "*" };
                vec![format!("*://{}/{}{}", host, path, suffix)]
            }
            // No subdomains under an IP literal
            None if self.wildcard || self.host.starts_with('[') => vec![format!("*://{}/*", host)],
            None => vec![
                format!("*://{}/*", host),
                format!("*://*.{}/*", host),
            ],
        }
    }
}

/// Validate and compile a domain entry in one step.
pub fn compile_domain_pattern(input: &str) -> Result<Vec<String>, PatternError> {
    DomainPattern::parse(input).map(|pattern| pattern.url_filters())
}

fn strip_scheme(input: &str) -> &str {
    let Some(pos) = input.find("://") else {
        return input;
    };

    let scheme = &input[..pos];
    let is_scheme = scheme == "*"
        || (!scheme.is_empty()
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'));

    if is_scheme {
        &input[pos + 3..]
    } else {
        input
    }
}

fn validate_authority(authority: &str) -> Result<String, PatternError> {
    let (host, port) = split_port(authority);

    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PatternError::InvalidPort(port.to_string()));
        }
    }

    if let Some(literal) = host.strip_prefix('[') {
        // IPv6 literal
        let inner = literal.strip_suffix(']').unwrap_or(literal);
        if let Some(bad) = inner
            .chars()
            .find(|c| !(c.is_ascii_hexdigit() || *c == ':' || *c == '.'))
        {
            return Err(PatternError::InvalidHostCharacter(bad));
        }
        if !literal.ends_with(']') || inner.is_empty() {
            return Err(PatternError::EmptyLabel(host.to_string()));
        }
        return Ok(authority.to_ascii_lowercase());
    }

    if let Some(bad) = host
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
    {
        return Err(PatternError::InvalidHostCharacter(bad));
    }

    if host.is_empty() || host.split('.').any(str::is_empty) {
        return Err(PatternError::EmptyLabel(host.to_string()));
    }

    Ok(authority.to_ascii_lowercase())
}

/// Split an optional `:port`, leaving the colons of a bracketed IPv6 host alone.
fn split_port(authority: &str) -> (&str, Option<&str>) {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => match authority[end + 1..].strip_prefix(':') {
                Some(port) => (&authority[..=end], Some(port)),
                None if end + 1 == authority.len() => (authority, None),
                None => (authority, Some(&authority[end + 1..])),
            },
            None => (authority, None),
        };
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    }
}
