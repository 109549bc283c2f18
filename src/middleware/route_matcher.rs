use regex::Regex;

use crate::error::{Error, Result};

/// Compiled set of ignore routes.
///
/// Each `*` in a route matches one or more characters, greedily, so
/// `/v1/accounts/*` covers `/v1/accounts/42` and `/v1/accounts/42/holder` but
/// not `/v1/accounts` itself. Matching is anchored at both ends and
/// case-insensitive. Every other character keeps its regex meaning.
#[derive(Debug, Clone, Default)]
pub struct RouteMatcher {
    patterns: Vec<Regex>,
}

impl RouteMatcher {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn compile<I, S>(routes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = routes
            .into_iter()
            .map(|route| compile_route(route.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn should_ignore(&self, path: &str) -> bool {
        let path = path.trim();
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn compile_route(route: &str) -> Result<Regex> {
    let expanded = route.replace('*', ".+");
    Regex::new(&format!("(?i)^{}$", expanded)).map_err(|source| Error::InvalidIgnorePattern {
        pattern: route.to_string(),
        source,
    })
}
