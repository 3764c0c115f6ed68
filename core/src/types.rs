//! Schema node definitions for data-shape modeling.
//!
//! A [`SchemaNode`] is a closed recursive tree: primitives at the leaves,
//! objects and arrays as containers, and three wrapper layers
//! (`Optional`, `Nullable`, `Default`) that annotate the node they wrap.
//! Because wrappers always hold a boxed node, unwrapping them always ends at
//! a primitive, object or array.
//!
//! # Document format
//!
//! Nodes (de)serialize as internally tagged maps, so schemas can be written
//! by hand in JSON or YAML:
//!
//! ```yaml
//! type: object
//! fields:
//!   id: { type: string }
//!   age: { type: optional, of: { type: integer } }
//!   tags: { type: array, items: { type: string } }
//! ```
//!
//! Object fields keep their declaration order through a round trip.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Format annotation on a string primitive.
///
/// Only [`StringFormat::DateTime`] changes the mapped SQL type; the other
/// formats are carried for documentation and map to `TEXT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringFormat {
    /// ISO-8601 date-time.
    #[serde(alias = "date-time")]
    DateTime,
    /// E-mail address.
    Email,
    /// UUID text.
    Uuid,
    /// URL.
    Url,
}

/// Leaf value kinds.
///
/// # Examples
///
/// ```
/// use tableshape_core::{Dialect, Primitive, map_primitive};
///
/// assert_eq!(map_primitive(&Primitive::Integer, Dialect::Mysql), "INT");
/// assert_eq!(map_primitive(&Primitive::Any, Dialect::Postgres), "TEXT");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    /// Text, optionally annotated with a format.
    String(Option<StringFormat>),
    /// Integer-constrained number.
    Integer,
    /// Unconstrained (floating point) number.
    Number,
    /// Boolean.
    Boolean,
    /// Calendar date or instant.
    Date,
    /// One of a fixed set of string values.
    Enum(Vec<String>),
    /// Explicitly untyped value.
    Any,
    /// A node kind this library does not recognize.
    Unknown,
}

/// A node in a data-shape description.
///
/// Build trees with the constructor functions and chain the wrapper
/// combinators:
///
/// ```
/// use tableshape_core::SchemaNode;
/// use serde_json::json;
///
/// let user = SchemaNode::object([
///     ("id", SchemaNode::string()),
///     ("nickname", SchemaNode::string().optional()),
///     ("active", SchemaNode::boolean().with_default(json!(true))),
///     ("profile", SchemaNode::object([
///         ("bio", SchemaNode::string().nullable()),
///     ])),
/// ]);
///
/// let fields = user.as_object().unwrap();
/// assert_eq!(fields.names().collect::<Vec<_>>(), ["id", "nickname", "active", "profile"]);
/// assert!(fields.get("nickname").unwrap().unwrap_modifiers().nullable);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeDoc", into = "NodeDoc")]
pub enum SchemaNode {
    /// A leaf value.
    Primitive(Primitive),
    /// A nested object with ordered fields.
    Object(Fields),
    /// A homogeneous list.
    Array(Box<SchemaNode>),
    /// The value may be absent.
    Optional(Box<SchemaNode>),
    /// The value may be null.
    Nullable(Box<SchemaNode>),
    /// The value falls back to `value` when absent.
    Default {
        /// Wrapped node.
        inner: Box<SchemaNode>,
        /// Fallback value.
        value: Value,
    },
}

/// The shape a node takes once its wrapper layers are removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape<'a> {
    /// A leaf value.
    Primitive(&'a Primitive),
    /// A nested object.
    Object(&'a Fields),
    /// A list with the given element node.
    Array(&'a SchemaNode),
}

/// Result of [`SchemaNode::unwrap_modifiers`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unwrapped<'a> {
    /// The underlying primitive, object or array.
    pub shape: Shape<'a>,
    /// Whether an `Optional` or `Nullable` layer was present.
    pub nullable: bool,
    /// The outermost `Default` value, if any.
    pub default: Option<&'a Value>,
}

impl SchemaNode {
    /// A plain string.
    pub fn string() -> Self {
        SchemaNode::Primitive(Primitive::String(None))
    }

    /// A string with a format annotation.
    pub fn formatted_string(format: StringFormat) -> Self {
        SchemaNode::Primitive(Primitive::String(Some(format)))
    }

    /// A datetime-formatted string.
    pub fn datetime() -> Self {
        Self::formatted_string(StringFormat::DateTime)
    }

    /// An integer.
    pub fn integer() -> Self {
        SchemaNode::Primitive(Primitive::Integer)
    }

    /// A floating point number.
    pub fn number() -> Self {
        SchemaNode::Primitive(Primitive::Number)
    }

    /// A boolean.
    pub fn boolean() -> Self {
        SchemaNode::Primitive(Primitive::Boolean)
    }

    /// A date.
    pub fn date() -> Self {
        SchemaNode::Primitive(Primitive::Date)
    }

    /// An enumeration of string values.
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemaNode::Primitive(Primitive::Enum(values.into_iter().map(Into::into).collect()))
    }

    /// An explicitly untyped value.
    pub fn any() -> Self {
        SchemaNode::Primitive(Primitive::Any)
    }

    /// An object with the given fields, in order.
    pub fn object<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, SchemaNode)>,
        S: Into<String>,
    {
        SchemaNode::Object(fields.into_iter().collect())
    }

    /// An array of `element`.
    pub fn array(element: SchemaNode) -> Self {
        SchemaNode::Array(Box::new(element))
    }

    /// Wraps this node as optional.
    pub fn optional(self) -> Self {
        SchemaNode::Optional(Box::new(self))
    }

    /// Wraps this node as nullable.
    pub fn nullable(self) -> Self {
        SchemaNode::Nullable(Box::new(self))
    }

    /// Wraps this node with a default value.
    pub fn with_default(self, value: Value) -> Self {
        SchemaNode::Default {
            inner: Box::new(self),
            value,
        }
    }

    /// Strips `Optional`, `Nullable` and `Default` layers.
    ///
    /// `Default` alone does not make a node nullable.
    pub fn unwrap_modifiers(&self) -> Unwrapped<'_> {
        let mut node = self;
        let mut nullable = false;
        let mut default = None;
        loop {
            match node {
                SchemaNode::Optional(inner) | SchemaNode::Nullable(inner) => {
                    nullable = true;
                    node = inner;
                }
                SchemaNode::Default { inner, value } => {
                    default.get_or_insert(value);
                    node = inner;
                }
                SchemaNode::Primitive(p) => {
                    return Unwrapped {
                        shape: Shape::Primitive(p),
                        nullable,
                        default,
                    };
                }
                SchemaNode::Object(fields) => {
                    return Unwrapped {
                        shape: Shape::Object(fields),
                        nullable,
                        default,
                    };
                }
                SchemaNode::Array(element) => {
                    return Unwrapped {
                        shape: Shape::Array(element),
                        nullable,
                        default,
                    };
                }
            }
        }
    }

    /// Returns the object fields if this node unwraps to an object.
    pub fn as_object(&self) -> Option<&Fields> {
        match self.unwrap_modifiers().shape {
            Shape::Object(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Ordered field map of an object node.
///
/// Declaration order is significant: it determines column order in every
/// derived structure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fields(Vec<(String, SchemaNode)>);

impl Fields {
    /// Creates an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, replacing an existing field of the same name in
    /// place.
    pub fn insert(&mut self, name: impl Into<String>, node: SchemaNode) {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = node,
            None => self.0.push((name, node)),
        }
    }

    /// Looks up a field by name.
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    /// Iterates fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.0.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Iterates field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Collects fields as declared. Repeated names are kept, like repeated keys
/// in a schema document, and rejected as a column collision when the
/// structure is derived.
impl<S: Into<String>> FromIterator<(S, SchemaNode)> for Fields {
    fn from_iter<T: IntoIterator<Item = (S, SchemaNode)>>(iter: T) -> Self {
        Fields(iter.into_iter().map(|(name, node)| (name.into(), node)).collect())
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, node) in &self.0 {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to schema nodes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Fields, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, SchemaNode>()? {
                    fields.push(entry);
                }
                Ok(Fields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// Flat tagged document representation of a [`SchemaNode`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum NodeDoc {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<StringFormat>,
    },
    Integer,
    Number,
    Boolean,
    Date,
    Enum {
        #[serde(default)]
        values: Vec<String>,
    },
    Any,
    Object {
        #[serde(default)]
        fields: Fields,
    },
    Array {
        items: Box<SchemaNode>,
    },
    Optional {
        of: Box<SchemaNode>,
    },
    Nullable {
        of: Box<SchemaNode>,
    },
    Default {
        of: Box<SchemaNode>,
        value: Value,
    },
    #[serde(other)]
    Unknown,
}

impl From<NodeDoc> for SchemaNode {
    fn from(doc: NodeDoc) -> Self {
        match doc {
            NodeDoc::String { format } => SchemaNode::Primitive(Primitive::String(format)),
            NodeDoc::Integer => SchemaNode::Primitive(Primitive::Integer),
            NodeDoc::Number => SchemaNode::Primitive(Primitive::Number),
            NodeDoc::Boolean => SchemaNode::Primitive(Primitive::Boolean),
            NodeDoc::Date => SchemaNode::Primitive(Primitive::Date),
            NodeDoc::Enum { values } => SchemaNode::Primitive(Primitive::Enum(values)),
            NodeDoc::Any => SchemaNode::Primitive(Primitive::Any),
            NodeDoc::Unknown => SchemaNode::Primitive(Primitive::Unknown),
            NodeDoc::Object { fields } => SchemaNode::Object(fields),
            NodeDoc::Array { items } => SchemaNode::Array(items),
            NodeDoc::Optional { of } => SchemaNode::Optional(of),
            NodeDoc::Nullable { of } => SchemaNode::Nullable(of),
            NodeDoc::Default { of, value } => SchemaNode::Default { inner: of, value },
        }
    }
}

impl From<SchemaNode> for NodeDoc {
    fn from(node: SchemaNode) -> Self {
        match node {
            SchemaNode::Primitive(p) => match p {
                Primitive::String(format) => NodeDoc::String { format },
                Primitive::Integer => NodeDoc::Integer,
                Primitive::Number => NodeDoc::Number,
                Primitive::Boolean => NodeDoc::Boolean,
                Primitive::Date => NodeDoc::Date,
                Primitive::Enum(values) => NodeDoc::Enum { values },
                Primitive::Any => NodeDoc::Any,
                Primitive::Unknown => NodeDoc::Unknown,
            },
            SchemaNode::Object(fields) => NodeDoc::Object { fields },
            SchemaNode::Array(items) => NodeDoc::Array { items },
            SchemaNode::Optional(of) => NodeDoc::Optional { of },
            SchemaNode::Nullable(of) => NodeDoc::Nullable { of },
            SchemaNode::Default { inner, value } => NodeDoc::Default { of: inner, value },
        }
    }
}
