//! Configured routes adapter
//!
//! Implements the `RouteResolver` port over a static table of routes.
//!
//! ```text
//! path pattern     users/:id/*
//! request path     users/42/profile/edit
//!                  └──┬───┘ └────┬─────┘
//!                  matched    remaining (for `*`: captured as parameter "*")
//! ```
//!
//! The longest match wins; equal lengths prefer more static segments, then
//! the route declared first. A route with an empty path only matches the
//! empty path.

use crate::domain::instruction::{InstructionParameters, RoutingInstruction};
use crate::domain::parser::InstructionParser;
use crate::error::{RouterError, RouterResult, RoutingMode};
use crate::ports::outbound::{FoundRoute, RouteResolver};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A configured route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    /// Segments separated by `/`; `:name` captures one segment, `*` the rest.
    pub path: String,
    /// Instruction text the route expands to. `:name` is substituted.
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub redirect_to: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl Route {
    pub fn new(id: impl Into<String>, path: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            instructions: instructions.into(),
            redirect_to: None,
            title: None,
        }
    }

    pub fn redirect(id: impl Into<String>, path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            redirect_to: Some(target.into()),
            ..Self::new(id, path, "")
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

struct Recognized<'a> {
    route: &'a Route,
    matched: Vec<&'a str>,
    remaining: Vec<&'a str>,
    parameters: BTreeMap<String, String>,
    statics: usize,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn recognize<'a>(route: &'a Route, path: &[&'a str]) -> Option<Recognized<'a>> {
    let pattern = segments(&route.path);
    if pattern.is_empty() && !path.is_empty() {
        return None;
    }
    let mut parameters = BTreeMap::new();
    let mut statics = 0;

    for (index, part) in pattern.iter().enumerate() {
        if *part == "*" {
            parameters.insert("*".to_string(), path.get(index..).unwrap_or_default().join("/"));
            return Some(Recognized {
                route,
                matched: path.to_vec(),
                remaining: Vec::new(),
                parameters,
                statics,
            });
        }
        let segment = path.get(index)?;
        match part.strip_prefix(':') {
            Some(name) => {
                parameters.insert(name.to_string(), segment.to_string());
            }
            None if part == segment => statics += 1,
            None => return None,
        }
    }

    Some(Recognized {
        route,
        matched: path[..pattern.len()].to_vec(),
        remaining: path[pattern.len()..].to_vec(),
        parameters,
        statics,
    })
}

/// Static route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    parser: InstructionParser,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes,
            parser: InstructionParser::default(),
        }
    }

    pub fn with_parser(mut self, parser: InstructionParser) -> Self {
        self.parser = parser;
        self
    }

    /// Load routes from a JSON array.
    pub fn from_json(json: &str) -> RouterResult<Self> {
        let routes: Vec<Route> = serde_json::from_str(json)
            .map_err(|e| RouterError::internal(format!("invalid route table: {e}")))?;
        Ok(Self::new(routes))
    }

    pub fn add(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    fn best<'a>(&'a self, path: &[&'a str]) -> Option<Recognized<'a>> {
        let mut best: Option<Recognized<'a>> = None;
        for candidate in self.routes.iter().filter_map(|route| recognize(route, path)) {
            let better = match &best {
                None => true,
                Some(current) => {
                    (candidate.matched.len(), candidate.statics)
                        > (current.matched.len(), current.statics)
                }
            };
            if better {
                best = Some(candidate);
            }
        }
        best
    }

    fn expand(
        &self,
        route: &Route,
        path: String,
        remaining: String,
        mut parameters: BTreeMap<String, String>,
        bag: &BTreeMap<String, String>,
    ) -> RouterResult<FoundRoute> {
        for (key, value) in bag {
            parameters.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let mut text = route.instructions.clone();
        let mut substituted = false;
        // Longest names first so `:id` does not eat into `:idx`.
        let mut names: Vec<&String> = parameters.keys().collect();
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));
        for name in names {
            let token = format!(":{name}");
            if text.contains(&token) {
                text = text.replace(&token, &parameters[name]);
                substituted = true;
            }
        }

        let mut instructions = self.parser.parse(&text)?;
        if !substituted && !parameters.is_empty() {
            let positional: BTreeMap<String, String> = parameters
                .iter()
                .filter(|(key, _)| key.as_str() != "*")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            if !positional.is_empty() {
                for instruction in instructions.iter_mut().filter(|i| i.parameters.is_empty()) {
                    instruction.parameters = InstructionParameters::Map(positional.clone());
                }
            }
        }
        mark_route(&mut instructions, &route.id);

        Ok(FoundRoute {
            id: route.id.clone(),
            path,
            instructions,
            remaining,
            parameters,
            title: route.title.clone(),
        })
    }
}

fn mark_route(instructions: &mut [RoutingInstruction], id: &str) {
    for (index, instruction) in instructions.iter_mut().enumerate() {
        instruction.route = Some(id.to_string());
        instruction.route_start = index == 0;
    }
}

#[async_trait]
impl RouteResolver for RouteTable {
    async fn find(
        &self,
        path: &str,
        parameters: &BTreeMap<String, String>,
    ) -> RouterResult<Option<FoundRoute>> {
        let requested = segments(path);
        let Some(mut found) = self.best(&requested) else {
            debug!(%path, "No configured route");
            return Ok(None);
        };

        if let Some(target) = found.route.redirect_to.as_deref() {
            let redirected = segments(target);
            let remaining = found.remaining.clone();
            let Some(next) = self.best(&redirected) else {
                warn!(route = %found.route.id, %target, "Redirect target has no route");
                return Ok(None);
            };
            if next.route.redirect_to.is_some() {
                return Err(RouterError::UnresolvedConfiguration {
                    segment: target.to_string(),
                    mode: RoutingMode::Configured,
                });
            }
            debug!(from = %found.route.id, to = %next.route.id, "Route redirected");
            let mut next = next;
            next.remaining.extend(remaining);
            found = next;
        }

        let matched = found.matched.join("/");
        let remaining = found.remaining.join("/");
        self.expand(found.route, matched, remaining, found.parameters, parameters)
            .map(Some)
    }

    async fn find_by_id(&self, id: &str) -> RouterResult<Option<FoundRoute>> {
        let Some(route) = self.routes.iter().find(|route| route.id == id) else {
            return Ok(None);
        };
        self.expand(route, route.path.clone(), String::new(), BTreeMap::new(), &BTreeMap::new())
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(vec![
            Route::new("home", "", "home").with_title("Home"),
            Route::new("users", "users", "user-list"),
            Route::new("user", "users/:id", "user"),
            Route::new("user-edit", "users/:id/edit", "user-edit(:id)"),
            Route::new("files", "files/*", "browser"),
            Route::redirect("old", "people", "users"),
            Route::redirect("loop", "a", "b"),
            Route::redirect("loop-b", "b", "a"),
        ])
    }

    #[tokio::test]
    async fn test_longest_match_wins() {
        let found = table().find("users/7", &BTreeMap::new()).await.unwrap().unwrap();
        assert_eq!(found.id, "user");
        assert_eq!(found.parameters["id"], "7");
        assert_eq!(
            found.instructions[0].parameters,
            InstructionParameters::Map(BTreeMap::from([("id".into(), "7".into())]))
        );
        assert!(found.instructions[0].route_start);
        assert_eq!(found.instructions[0].route.as_deref(), Some("user"));
    }

    #[tokio::test]
    async fn test_remaining_path_is_carried() {
        let found = table().find("users/7/posts/3", &BTreeMap::new()).await.unwrap().unwrap();
        assert_eq!(found.id, "user");
        assert_eq!(found.path, "users/7");
        assert_eq!(found.remaining, "posts/3");
    }

    #[tokio::test]
    async fn test_parameters_substituted_into_text() {
        let found = table().find("users/7/edit", &BTreeMap::new()).await.unwrap().unwrap();
        assert_eq!(found.instructions[0].parameters, InstructionParameters::Text("7".into()));
    }

    #[tokio::test]
    async fn test_wildcard_captures_rest() {
        let found = table().find("files/a/b.txt", &BTreeMap::new()).await.unwrap().unwrap();
        assert_eq!(found.parameters["*"], "a/b.txt");
        assert!(found.remaining.is_empty());
        assert!(found.instructions[0].parameters.is_empty());
    }

    #[tokio::test]
    async fn test_one_level_redirect() {
        let found = table().find("people", &BTreeMap::new()).await.unwrap().unwrap();
        assert_eq!(found.id, "users");

        let err = table().find("a", &BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, RouterError::UnresolvedConfiguration { .. }));
    }

    #[tokio::test]
    async fn test_empty_path_and_lookup_by_id() {
        let found = table().find("", &BTreeMap::new()).await.unwrap().unwrap();
        assert_eq!(found.title.as_deref(), Some("Home"));

        let by_id = table().find_by_id("users").await.unwrap().unwrap();
        assert_eq!(by_id.instructions[0].component_name(), "user-list");
        assert!(table().find_by_id("nope").await.unwrap().is_none());
        assert!(table().find("nowhere", &BTreeMap::new()).await.unwrap().is_none());
    }

    #[test]
    fn test_from_json() {
        let table = RouteTable::from_json(
            r#"[{"id":"home","path":"","instructions":"home"},{"id":"x","path":"x","redirectTo":""}]"#,
        )
        .unwrap();
        assert_eq!(table.routes().len(), 2);
        assert_eq!(table.routes()[1].redirect_to.as_deref(), Some(""));
    }
}
