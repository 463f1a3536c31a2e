//! Endpoint router
//!
//! Matches `(method, path)` against the program's endpoints in definition
//! order and runs the first match in a fresh root scope holding:
//! - every top-level body field, by name
//! - `body`: the whole request body (null when absent)
//! - `query`: the query string as an object of strings
//! - path parameters, as strings (these win over body fields of the same name)

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use uuid::Uuid;

use crate::context::RuntimeContext;
use crate::errors::EngineError;
use crate::executor::{json_to_val, Val, VM};
use crate::types::{EndpointDef, Method};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct Route {
    segments: Vec<Segment>,
    def: EndpointDef,
}

impl Route {
    fn new(def: EndpointDef) -> Self {
        let segments = split_path(&def.path)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self { segments, def }
    }

    /// Captured parameters when every segment matches
    fn matches(&self, path: &str) -> Option<HashMap<String, Val>> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), Val::str(part));
                }
            }
        }
        Some(params)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn parse_query(query: &str) -> HashMap<String, Val> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), Val::str(value)),
            None => (pair.to_string(), Val::str("")),
        })
        .collect()
}

pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new(endpoints: Vec<EndpointDef>) -> Self {
        Self {
            routes: endpoints.into_iter().map(Route::new).collect(),
        }
    }

    /// Registered `(method, pattern)` pairs in definition order
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.routes
            .iter()
            .map(|route| (route.def.method, route.def.path.clone()))
            .collect()
    }

    /// Run the first endpoint matching `method` and `path`
    ///
    /// `method` is case-insensitive. A body without a `return` yields null.
    pub fn dispatch(
        &self,
        ctx: &RuntimeContext,
        method: &str,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<Val, EngineError> {
        let not_found = || EngineError::EndpointNotFound {
            method: method.to_string(),
            path: path.to_string(),
        };
        let method: Method = method.parse().map_err(|_| not_found())?;
        let (path_only, query) = match path.split_once('?') {
            Some((path_only, query)) => (path_only, query),
            None => (path, ""),
        };

        let (route, params) = self
            .routes
            .iter()
            .filter(|route| route.def.method == method)
            .find_map(|route| route.matches(path_only).map(|params| (route, params)))
            .ok_or_else(not_found)?;

        let mut bindings = HashMap::new();
        if let Some(JsonValue::Object(fields)) = &body {
            for (name, value) in fields {
                bindings.insert(name.clone(), json_to_val(value));
            }
        }
        bindings.insert(
            "body".to_string(),
            body.as_ref().map_or(Val::Null, json_to_val),
        );
        bindings.insert("query".to_string(), Val::Obj(parse_query(query)));
        bindings.extend(params);

        let _gate = ctx.lock_invocation();
        let invocation = Uuid::new_v4();
        tracing::debug!(%method, pattern = %route.def.path, %invocation, "dispatch");

        let result = VM::with_bindings(ctx, bindings).execute_block(&route.def.body);
        if let Err(err) = &result {
            tracing::debug!(%method, pattern = %route.def.path, %invocation, error = %err, "endpoint failed");
        }
        Ok(result?)
    }
}
