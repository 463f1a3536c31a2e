//! Program definitions handed over by the front end
//!
//! A program is plain JSON: models, endpoints and jobs, each body being the
//! statement tree the executor runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::db::EntityEventKind;
use crate::executor::Stmt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub endpoints: Vec<EndpointDef>,
    #[serde(default)]
    pub jobs: Vec<JobDef>,
}

impl Program {
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).context("Failed to parse program JSON")
    }

    /// Read and parse a program file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read program file {}", path.display()))?;
        Self::from_json(&source).with_context(|| format!("Invalid program in {}", path.display()))
    }
}

/* ===================== Models ===================== */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub default: Option<JsonValue>,
}

/* ===================== Endpoints ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(format!("unsupported method '{}'", s)),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDef {
    pub method: Method,
    /// Path pattern, `:name` segments capture parameters
    pub path: String,
    #[serde(default)]
    pub body: Vec<Stmt>,
    /// Declared response shape; documentation only
    #[serde(default)]
    pub returns: Option<JsonValue>,
}

/* ===================== Jobs ===================== */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDef {
    pub name: String,
    pub trigger: Trigger,
    /// Wait before the first timer fire, or after each lifecycle event
    #[serde(default)]
    pub delay: Option<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Trigger {
    /// Five-field cron pattern, evaluated in UTC
    Cron { pattern: String },
    /// Natural-language cadence such as `every 5 minutes`
    Every { cadence: String },
    /// Entity lifecycle event
    Entity {
        entity: String,
        event: EntityEventKind,
    },
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Cron { pattern } => write!(f, "cron '{}'", pattern),
            Trigger::Every { cadence } => f.write_str(cadence),
            Trigger::Entity { entity, event } => {
                let event = match event {
                    EntityEventKind::Created => "created",
                    EntityEventKind::Updated => "updated",
                    EntityEventKind::Deleted => "deleted",
                };
                write!(f, "on {} {}", entity, event)
            }
        }
    }
}
