//! Longest-literal-segment route matching.
//!
//! Patterns are split into segments once, at registration time. Matching a
//! request walks every same-length pattern, scores it by how many segments
//! matched literally (as opposed to binding to a path variable), and picks
//! the highest score; ties go to whichever pattern was registered first.

use std::collections::HashMap;

use super::Handler;
use crate::error::DispatchError;
use crate::meta::RouteMethod;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn split(path: &str) -> Vec<Segment> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Segment::Param(name.to_string())
            } else {
                Segment::Literal(s.to_string())
            }
        })
        .collect()
}

struct RouteEntry {
    method: RouteMethod,
    raw_path: String,
    segments: Vec<Segment>,
    handler: Handler,
}

/// The frozen set of routes a [`HttpDispatcher`](super::HttpDispatcher) serves.
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

/// The result of matching a request against the table.
pub enum MatchOutcome {
    Matched { handler: Handler, path_vars: HashMap<String, String> },
    /// The path matches some registered route, but not for this method.
    MethodNotAllowed,
    NotFound,
}

impl RouteTable {
    pub fn new() -> Self {
        RouteTable { entries: Vec::new() }
    }

    pub fn has(&self, method: RouteMethod, path: &str) -> bool {
        let segments = split(path);
        self.entries.iter().any(|e| e.method == method && e.segments == segments)
    }

    pub fn insert(&mut self, method: RouteMethod, path: String, handler: Handler) -> Result<(), DispatchError> {
        let segments = split(&path);
        if self.entries.iter().any(|e| e.method == method && e.segments == segments) {
            return Err(DispatchError::DuplicateRoute { method: method.to_string(), path });
        }
        self.entries.push(RouteEntry { method, raw_path: path, segments, handler });
        Ok(())
    }

    /// Try to match `path` (already-split-free, e.g. `/users/7`) for `method`.
    pub fn match_request(&self, method: RouteMethod, path: &str) -> MatchOutcome {
        let request_segments = split(path);

        let mut best: Option<(usize, usize)> = None; // (entry index, literal score)
        let mut any_path_match = false;

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.segments.len() != request_segments.len() {
                continue;
            }
            let Some(score) = fit_score(&entry.segments, &request_segments) else { continue };
            any_path_match = true;
            if entry.method != method {
                continue;
            }
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((index, score)),
            }
        }

        match best {
            Some((index, _)) => {
                let entry = &self.entries[index];
                let mut path_vars = HashMap::new();
                for (segment, value) in entry.segments.iter().zip(request_segments.iter()) {
                    if let Segment::Param(name) = segment {
                        let Segment::Literal(value) = value else { unreachable!() };
                        path_vars.insert(name.clone(), value.clone());
                    }
                }
                MatchOutcome::Matched { handler: entry.handler.clone(), path_vars }
            }
            None if any_path_match => MatchOutcome::MethodNotAllowed,
            None => MatchOutcome::NotFound,
        }
    }

    pub fn routes(&self) -> Vec<(RouteMethod, String)> {
        self.entries.iter().map(|e| (e.method, e.raw_path.clone())).collect()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// `None` if the pattern doesn't fit the request path at all; `Some(score)`
/// (count of literal segments) otherwise. Request segments are always
/// literal — only registered patterns carry `Param`.
fn fit_score(pattern: &[Segment], request: &[Segment]) -> Option<usize> {
    let mut score = 0;
    for (p, r) in pattern.iter().zip(request.iter()) {
        let Segment::Literal(value) = r else {
            unreachable!("request segments are always literal")
        };
        match p {
            Segment::Literal(expected) if expected == value => score += 1,
            Segment::Literal(_) => return None,
            Segment::Param(_) => {}
        }
    }
    Some(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn noop_handler() -> Handler {
        Arc::new(|_container, _request| {
            Box::pin(async { Ok(super::super::HandlerResponse::ok(serde_json::json!({}))) })
        })
    }

    #[test]
    fn literal_route_beats_param_route() {
        let mut table = RouteTable::new();
        table.insert(RouteMethod::Get, "/users/{id}".to_string(), noop_handler()).unwrap();
        table.insert(RouteMethod::Get, "/users/list".to_string(), noop_handler()).unwrap();
        match table.match_request(RouteMethod::Get, "/users/list") {
            MatchOutcome::Matched { path_vars, .. } => assert!(path_vars.is_empty()),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn first_registered_wins_ties() {
        let mut table = RouteTable::new();
        let first = noop_handler();
        table.insert(RouteMethod::Get, "/a/{x}".to_string(), first).unwrap();
        table.insert(RouteMethod::Get, "/{y}/b".to_string(), noop_handler()).unwrap();
        match table.match_request(RouteMethod::Get, "/a/b") {
            MatchOutcome::Matched { path_vars, .. } => assert!(path_vars.contains_key("x")),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn method_mismatch_is_distinguished_from_not_found() {
        let mut table = RouteTable::new();
        table.insert(RouteMethod::Get, "/widgets".to_string(), noop_handler()).unwrap();
        assert!(matches!(
            table.match_request(RouteMethod::Post, "/widgets"),
            MatchOutcome::MethodNotAllowed
        ));
        assert!(matches!(
            table.match_request(RouteMethod::Get, "/gadgets"),
            MatchOutcome::NotFound
        ));
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let mut table = RouteTable::new();
        table.insert(RouteMethod::Get, "/widgets".to_string(), noop_handler()).unwrap();
        let err = table.insert(RouteMethod::Get, "/widgets".to_string(), noop_handler()).unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateRoute { .. }));
    }

    #[test]
    fn path_vars_are_extracted_by_name() {
        let mut table = RouteTable::new();
        table.insert(RouteMethod::Get, "/users/{id}/posts/{postId}".to_string(), noop_handler()).unwrap();
        match table.match_request(RouteMethod::Get, "/users/42/posts/9") {
            MatchOutcome::Matched { path_vars, .. } => {
                assert_eq!(path_vars.get("id").unwrap(), "42");
                assert_eq!(path_vars.get("postId").unwrap(), "9");
            }
            _ => panic!("expected a match"),
        }
    }
}
