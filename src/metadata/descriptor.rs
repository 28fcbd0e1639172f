//! Parameter and method descriptors
//!
//! Value objects that describe how to call one RIP endpoint: where each
//! parameter goes, its type, and an example request.

use serde::Serialize;
use serde_json::Value;

/// Where a parameter is carried in the HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Header,
    Query,
    Body,
}

/// HTTP verb of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
}

/// Shape of one element of an array-typed body parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamElement {
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

impl ParamElement {
    pub fn new(description: &str, kind: &str) -> Self {
        Self {
            description: description.to_string(),
            kind: kind.to_string(),
            subtype: None,
        }
    }

    pub fn array_of(description: &str, subtype: &str) -> Self {
        Self {
            description: description.to_string(),
            kind: "array".to_string(),
            subtype: Some(subtype.to_string()),
        }
    }
}

/// One piece of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub required: bool,
    pub location: ParamLocation,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Fixed or expected value, e.g. a literal JSON-RPC method name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<ParamElement>>,
}

impl Parameter {
    fn new(name: &str, location: ParamLocation) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            location,
            kind: None,
            value: None,
            subtype: None,
            elements: None,
        }
    }

    pub fn header(name: &str) -> Self {
        Self::new(name, ParamLocation::Header)
    }

    pub fn query(name: &str) -> Self {
        Self::new(name, ParamLocation::Query)
    }

    pub fn body(name: &str) -> Self {
        Self::new(name, ParamLocation::Body)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn of_type(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn with_value<V: Into<Value>>(mut self, value: V) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_string());
        self
    }

    pub fn with_elements(mut self, elements: Vec<ParamElement>) -> Self {
        self.elements = Some(elements);
        self
    }
}

/// One externally callable operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDescriptor {
    pub url: String,
    pub description: String,
    #[serde(rename = "type")]
    pub verb: HttpVerb,
    pub params: Vec<Parameter>,
    /// MIME type of the response
    pub returns: String,
    pub example: Value,
}
