// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of renderable components a generated document may contain.
//!
//! The rendering grammar itself is opaque to the pipeline: a component is a
//! `type` tag plus an object of `data`. Only the tag set is checked. Anything
//! else is carried through as-is.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::AmbiaError;

/// Display priority hint attached to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentPriority {
    High,
    Medium,
    Low,
}

/// Fields shared by every component kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentBody {
    pub title: Option<String>,
    pub priority: Option<ComponentPriority>,
    pub data: Map<String, Value>,
}

/// A single UI component. Tags outside the known set decode as [`Component::Unknown`]
/// so stored payloads never fail to load, but [`parse_document`] rejects them.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Weather(ComponentBody),
    Calendar(ComponentBody),
    Tasks(ComponentBody),
    Movies(ComponentBody),
    Books(ComponentBody),
    News(ComponentBody),
    Recipes(ComponentBody),
    Sports(ComponentBody),
    Unknown { kind: String, raw: Value },
}

/// Tags accepted by [`parse_document`].
pub const KNOWN_KINDS: &[&str] = &[
    "weather", "calendar", "tasks", "movies", "books", "news", "recipes", "sports",
];

impl Component {
    /// The `type` tag of this component.
    pub fn kind(&self) -> &str {
        match self {
            Component::Weather(_) => "weather",
            Component::Calendar(_) => "calendar",
            Component::Tasks(_) => "tasks",
            Component::Movies(_) => "movies",
            Component::Books(_) => "books",
            Component::News(_) => "news",
            Component::Recipes(_) => "recipes",
            Component::Sports(_) => "sports",
            Component::Unknown { kind, .. } => kind,
        }
    }

    pub fn body(&self) -> Option<&ComponentBody> {
        match self {
            Component::Weather(b)
            | Component::Calendar(b)
            | Component::Tasks(b)
            | Component::Movies(b)
            | Component::Books(b)
            | Component::News(b)
            | Component::Recipes(b)
            | Component::Sports(b) => Some(b),
            Component::Unknown { .. } => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Component::Unknown { .. })
    }

    fn from_kind(kind: &str, body: ComponentBody) -> Option<Self> {
        Some(match kind {
            "weather" => Component::Weather(body),
            "calendar" => Component::Calendar(body),
            "tasks" => Component::Tasks(body),
            "movies" => Component::Movies(body),
            "books" => Component::Books(body),
            "news" => Component::News(body),
            "recipes" => Component::Recipes(body),
            "sports" => Component::Sports(body),
            _ => return None,
        })
    }

    /// Decodes one component object. Errors describe the first violation found.
    fn from_value(value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("component must be an object, got {}", type_name(value)))?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "component is missing a string `type`".to_string())?;

        if !KNOWN_KINDS.contains(&kind) {
            return Ok(Component::Unknown {
                kind: kind.to_string(),
                raw: value.clone(),
            });
        }

        let data = match obj.get("data") {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(format!(
                    "component `{kind}` has non-object data ({})",
                    type_name(other)
                ));
            }
            None => return Err(format!("component `{kind}` is missing `data`")),
        };
        let title = match obj.get("title") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(format!(
                    "component `{kind}` has non-string title ({})",
                    type_name(other)
                ));
            }
        };
        let priority = match obj.get("priority") {
            None | Some(Value::Null) => None,
            Some(p) => Some(
                serde_json::from_value::<ComponentPriority>(p.clone())
                    .map_err(|e| format!("component `{kind}` has invalid priority: {e}"))?,
            ),
        };

        let body = ComponentBody {
            title,
            priority,
            data,
        };
        Component::from_kind(kind, body).ok_or_else(|| format!("unknown component kind `{kind}`"))
    }

    fn to_value(&self) -> Value {
        match self {
            Component::Unknown { raw, .. } => raw.clone(),
            known => {
                let mut obj = Map::new();
                obj.insert("type".into(), Value::String(known.kind().to_string()));
                if let Some(body) = known.body() {
                    if let Some(title) = &body.title {
                        obj.insert("title".into(), Value::String(title.clone()));
                    }
                    if let Some(priority) = body.priority {
                        // Infallible for a unit enum.
                        if let Ok(p) = serde_json::to_value(priority) {
                            obj.insert("priority".into(), p);
                        }
                    }
                    obj.insert("data".into(), Value::Object(body.data.clone()));
                }
                Value::Object(obj)
            }
        }
    }
}

impl Serialize for Component {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Component {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Component::from_value(&value).map_err(D::Error::custom)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validates a generated document against the closed component set.
///
/// Accepts a bare array or an object with a `components` array. An empty
/// array is valid. A single unknown kind or malformed component fails the
/// whole document.
pub fn parse_document(document: &Value) -> Result<Vec<Component>, AmbiaError> {
    let items = match document {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("components") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(AmbiaError::SchemaValidation(format!(
                    "`components` must be an array, got {}",
                    type_name(other)
                )));
            }
            None => {
                return Err(AmbiaError::SchemaValidation(
                    "document object has no `components` array".into(),
                ));
            }
        },
        other => {
            return Err(AmbiaError::SchemaValidation(format!(
                "document must be an array or object, got {}",
                type_name(other)
            )));
        }
    };

    let mut components = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let component = Component::from_value(item)
            .map_err(|e| AmbiaError::SchemaValidation(format!("component {idx}: {e}")))?;
        if !component.is_known() {
            return Err(AmbiaError::SchemaValidation(format!(
                "component {idx}: unknown component kind `{}`",
                component.kind()
            )));
        }
        components.push(component);
    }
    Ok(components)
}
