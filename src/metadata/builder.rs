//! Server info document
//!
//! Builds the discovery payload returned by `info`: the server identity plus
//! every readable and writable variable, each group paired with the concrete
//! endpoints that act on it. Examples are filled in with the declared
//! variable names so a client can copy them verbatim.

use super::descriptor::{HttpVerb, MethodDescriptor, ParamElement, Parameter};
use crate::config::ServerIdentity;
use crate::error::{Result, RipError};
use crate::registry::{Registry, VariableSpec};
use serde::Serialize;
use serde_json::{json, Value};

/// Path of the server-push subscription endpoint
pub const SSE_PATH: &str = "/RIP/SSE";
/// Path of the JSON-RPC endpoint
pub const POST_PATH: &str = "/RIP/POST";

/// Variables of one access class with the methods that act on them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariablesListing {
    pub list: Vec<VariableSpec>,
    pub methods: Vec<MethodDescriptor>,
    pub read_notwrite: bool,
}

/// The full discovery payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfoDocument {
    #[serde(flatten)]
    pub identity: ServerIdentity,
    pub readables: VariablesListing,
    pub writables: VariablesListing,
}

impl ServerInfoDocument {
    /// Every URL advertised by the document
    pub fn urls(&self) -> Vec<&str> {
        self.readables
            .methods
            .iter()
            .chain(&self.writables.methods)
            .map(|method| method.url.as_str())
            .collect()
    }
}

/// Build the document for clients reaching the server at `address`
pub fn build_info(
    registry: &Registry,
    identity: &ServerIdentity,
    address: &str,
) -> Result<ServerInfoDocument> {
    let address = address.trim().trim_end_matches('/');
    if address.is_empty() || address.contains(char::is_whitespace) {
        return Err(RipError::build_failure(format!(
            "invalid server address '{address}'"
        )));
    }

    let readable_names = registry.readable_names();
    let writable_names = registry.writable_names();
    verify_names(registry, &readable_names, &writable_names)?;

    Ok(ServerInfoDocument {
        identity: identity.clone(),
        readables: VariablesListing {
            list: registry.readables().to_vec(),
            methods: vec![
                sse_get_method(address, &identity.name),
                post_get_method(address, &identity.name, &readable_names),
            ],
            read_notwrite: true,
        },
        writables: VariablesListing {
            list: registry.writables().to_vec(),
            methods: vec![post_set_method(
                address,
                &identity.name,
                registry.writables(),
            )],
            read_notwrite: false,
        },
    })
}

/// Names used in examples must resolve in the registry, in the right class
fn verify_names(registry: &Registry, readables: &[String], writables: &[String]) -> Result<()> {
    for name in readables {
        registry
            .lookup_readable(name)
            .map_err(|_| RipError::build_failure(format!("readable '{name}' is inconsistent")))?;
    }
    for name in writables {
        registry
            .lookup_writable(name)
            .map_err(|_| RipError::build_failure(format!("writable '{name}' is inconsistent")))?;
    }
    Ok(())
}

fn json_headers() -> Vec<Parameter> {
    vec![
        Parameter::header("Accept").with_value("application/json"),
        Parameter::header("Content-Type")
            .required()
            .of_type("application/json"),
    ]
}

fn json_rpc_body(method: &str, elements: Vec<ParamElement>) -> Vec<Parameter> {
    vec![
        Parameter::body("jsonrpc")
            .required()
            .of_type("string")
            .with_value("2.0"),
        Parameter::body("method")
            .required()
            .of_type("string")
            .with_value(method),
        Parameter::body("params")
            .required()
            .of_type("array")
            .with_elements(elements),
        Parameter::body("id").required().of_type("int"),
    ]
}

/// Examples for POST methods are keyed by the URL they are sent to
fn post_example(url: &str, body: Value) -> Value {
    let mut example = serde_json::Map::new();
    example.insert(
        url.to_string(),
        json!({
            "headers": {"Accept": "application/json", "Content-Type": "application/json"},
            "body": body,
        }),
    );
    Value::Object(example)
}

fn sse_get_method(address: &str, exp_id: &str) -> MethodDescriptor {
    let url = format!("{address}{SSE_PATH}");
    MethodDescriptor {
        example: Value::String(format!("{url}?expId={exp_id}")),
        url,
        description: "Subscribes to an SSE to get regular updates on the server's variables"
            .to_string(),
        verb: HttpVerb::Get,
        params: vec![
            Parameter::header("Accept").with_value("application/json"),
            Parameter::query("expId").required().of_type("string"),
            Parameter::query("variables")
                .of_type("array")
                .with_subtype("string"),
        ],
        returns: "text/event-stream".to_string(),
    }
}

fn post_get_method(address: &str, exp_id: &str, readables: &[String]) -> MethodDescriptor {
    let url = format!("{address}{POST_PATH}");
    let mut params = json_headers();
    params.extend(json_rpc_body(
        "get",
        vec![
            ParamElement::new("Experience id", "string"),
            ParamElement::array_of("Name of variables to be retrieved", "string"),
        ],
    ));

    MethodDescriptor {
        example: post_example(
            &url,
            json!({"jsonrpc": "2.0", "method": "get", "params": [exp_id, readables], "id": "1"}),
        ),
        url,
        description:
            "Sends a request to retrieve the value of one or more server's variables on demand"
                .to_string(),
        verb: HttpVerb::Post,
        params,
        returns: "application/json".to_string(),
    }
}

fn post_set_method(address: &str, exp_id: &str, writables: &[VariableSpec]) -> MethodDescriptor {
    let url = format!("{address}{POST_PATH}");
    let mut params = json_headers();
    params.extend(json_rpc_body(
        "set",
        vec![
            ParamElement::new("Experience id", "string"),
            ParamElement::array_of("Name of variables to write", "string"),
            ParamElement::array_of("Value for variables", "mixed"),
        ],
    ));
    let names: Vec<&str> = writables.iter().map(|spec| spec.name.as_str()).collect();
    let values: Vec<Value> = writables.iter().map(VariableSpec::initial_value).collect();

    MethodDescriptor {
        example: post_example(
            &url,
            json!({
                "jsonrpc": "2.0",
                "method": "set",
                "params": [exp_id, names, values],
                "id": "1"
            }),
        ),
        url,
        description: "Sends a request to write the value of one or more server's variables"
            .to_string(),
        verb: HttpVerb::Post,
        params,
        returns: "application/json".to_string(),
    }
}
