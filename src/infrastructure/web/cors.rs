use actix_cors::Cors;

use crate::settings::AppConfig;

/// One entry of the CORS allow-list.
#[derive(Debug, Clone, PartialEq)]
pub enum OriginPattern {
    Any,
    Exact(String),
    /// `https://*.vercel.app` style entry: any single-or-multi-label subdomain.
    Subdomain { scheme: String, suffix: String },
}

impl OriginPattern {
    pub fn parse(entry: &str) -> Self {
        let entry = entry.trim().trim_end_matches('/');
        if entry == "*" {
            return OriginPattern::Any;
        }
        match entry.split_once("://*.") {
            Some((scheme, suffix)) if !suffix.is_empty() => OriginPattern::Subdomain {
                scheme: format!("{}://", scheme),
                suffix: format!(".{}", suffix),
            },
            _ => OriginPattern::Exact(entry.to_string()),
        }
    }

    pub fn matches(&self, origin: &str) -> bool {
        match self {
            OriginPattern::Any => true,
            OriginPattern::Exact(allowed) => allowed == origin,
            OriginPattern::Subdomain { scheme, suffix } => origin
                .strip_prefix(scheme.as_str())
                .and_then(|host| host.strip_suffix(suffix.as_str()))
                .is_some_and(|label| !label.is_empty() && !label.contains('/')),
        }
    }
}

pub fn build_cors(config: &AppConfig) -> Cors {
    let patterns: Vec<OriginPattern> = config
        .cors_origins()
        .iter()
        .map(|origin| OriginPattern::parse(origin))
        .collect();
    let allow_any = patterns.contains(&OriginPattern::Any);

    let mut cors = Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            origin
                .to_str()
                .map(|origin| patterns.iter().any(|p| p.matches(origin)))
                .unwrap_or(false)
        })
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    // Credentials cannot be combined with a wildcard origin.
    if config.cors_allow_credentials && !allow_any {
        cors = cors.supports_credentials();
    }
    cors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcard_origins() {
        let exact = OriginPattern::parse("http://localhost:3000/");
        assert!(exact.matches("http://localhost:3000"));
        assert!(!exact.matches("http://localhost:3001"));

        let preview = OriginPattern::parse("https://*.vercel.app");
        assert!(preview.matches("https://plant-journey-git-main.vercel.app"));
        assert!(!preview.matches("https://vercel.app"));
        assert!(!preview.matches("http://x.vercel.app"));
        assert!(!preview.matches("https://evil.com/.vercel.app"));
    }

    #[test]
    fn star_allows_everything() {
        assert!(OriginPattern::parse("*").matches("https://anything.example"));
    }
}
