//! Authorization policy: one ordered table of route rules
//!
//! Rules are kept most-specific first (more literal segments, then no `**`,
//! then method-bound before method-agnostic); rules of equal specificity
//! keep their table order. The first matching rule decides. A request that
//! matches no rule is denied.

use axum::http::Method;
use thiserror::Error;

use crate::models::user::Role;

use super::identity::RequestIdentity;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("pattern must start with '/': {0}")]
    NotAbsolute(String),
    #[error("'**' may only appear as the last segment: {0}")]
    RestNotLast(String),
}

/// What a caller needs to pass a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    Role(Role),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment
    Any,
    /// `**`: zero or more trailing segments
    Rest,
}

/// Path pattern such as `/api/v1/books/*` or `/api/v1/auth/**`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PolicyError> {
        if !pattern.starts_with('/') {
            return Err(PolicyError::NotAbsolute(pattern.to_string()));
        }
        let segments: Vec<Segment> = split_path(pattern)
            .map(|s| match s {
                "*" => Segment::Any,
                "**" => Segment::Rest,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        if let Some(pos) = segments.iter().position(|s| *s == Segment::Rest) {
            if pos + 1 != segments.len() {
                return Err(PolicyError::RestNotLast(pattern.to_string()));
            }
        }
        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = split_path(path).collect();
        let mut i = 0;
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Any => {
                    if i >= parts.len() {
                        return false;
                    }
                }
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return false;
                    }
                }
            }
            i += 1;
        }
        i == parts.len()
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    fn has_rest(&self) -> bool {
        self.segments.last() == Some(&Segment::Rest)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    /// `None` matches every method
    pub method: Option<Method>,
    pub pattern: PathPattern,
    pub requirement: Requirement,
}

impl Rule {
    pub fn new(method: Option<Method>, pattern: &str, requirement: Requirement) -> Result<Self, PolicyError> {
        Ok(Self {
            method,
            pattern: PathPattern::parse(pattern)?,
            requirement,
        })
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().map_or(true, |m| m == method) && self.pattern.matches(path)
    }

    fn specificity(&self) -> (usize, bool, bool) {
        (
            self.pattern.literal_count(),
            !self.pattern.has_rest(),
            self.method.is_some(),
        )
    }
}

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No usable identity (401)
    Unauthenticated,
    /// Identity lacks the required role (403)
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

#[derive(Debug, Clone)]
pub struct Policy {
    rules: Vec<Rule>,
}

impl Policy {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        // stable: equal specificity keeps table order
        rules.sort_by(|a, b| b.specificity().cmp(&a.specificity()));
        Self { rules }
    }

    /// Route table of the HTTP API
    pub fn default_rules() -> Result<Self, PolicyError> {
        let public = Requirement::Public;
        let authenticated = Requirement::Authenticated;
        let admin = Requirement::Role(Role::Admin);

        let table: [(Option<Method>, &str, Requirement); 10] = [
            (Some(Method::GET), "/api/v1/health", public),
            (Some(Method::GET), "/api/v1/auth/me", authenticated),
            (None, "/api/v1/auth/**", public),
            (Some(Method::GET), "/api/v1/books", public),
            (Some(Method::GET), "/api/v1/books/*", public),
            (Some(Method::GET), "/api/v1/borrows", admin),
            (Some(Method::PUT), "/api/v1/users/*/role", admin),
            (None, "/api/v1/**", authenticated),
            (Some(Method::GET), "/swagger-ui/**", public),
            (Some(Method::GET), "/api-docs/**", public),
        ];

        let rules = table
            .into_iter()
            .map(|(method, pattern, requirement)| Rule::new(method, pattern, requirement))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// First rule matching the request, if any
    pub fn rule_for(&self, method: &Method, path: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.matches(method, path))
    }

    pub fn decide(&self, method: &Method, path: &str, identity: &RequestIdentity) -> Decision {
        let Some(rule) = self.rule_for(method, path) else {
            tracing::debug!("No rule for {} {}, denying", method, path);
            return match identity {
                RequestIdentity::Anonymous => Decision::Deny(Denial::Unauthenticated),
                RequestIdentity::Authenticated(_) => Decision::Deny(Denial::Forbidden),
            };
        };

        let decision = match (rule.requirement, identity.principal()) {
            (Requirement::Public, _) => Decision::Allow,
            (_, None) => Decision::Deny(Denial::Unauthenticated),
            (Requirement::Authenticated, Some(_)) => Decision::Allow,
            (Requirement::Role(required), Some(principal)) => {
                if principal.role.satisfies(required) {
                    Decision::Allow
                } else {
                    Decision::Deny(Denial::Forbidden)
                }
            }
        };
        tracing::debug!(
            "{} {} matched {} -> {:?}",
            method,
            path,
            rule.pattern.as_str(),
            decision
        );
        decision
    }
}
