//! JSON-Cadence interchange format
//!
//! Script results and transaction arguments travel over the Access API as
//! JSON-Cadence documents: `{"type": "<Type>", "value": <payload>}`.
//!
//! Reference: <https://cadence-lang.org/docs/json-cadence-spec>

use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("malformed JSON-Cadence: {0}")]
    Malformed(String),
    #[error("expected {expected}, found {found}")]
    Type {
        expected: &'static str,
        found: String,
    },
    #[error("missing field `{0}`")]
    MissingField(String),
    #[error("invalid number {0:?}")]
    Number(String),
}

/// A decoded JSON-Cadence value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Optional(Option<Box<Value>>),
    Bool(bool),
    String(String),
    Address(String),
    /// Integer and fixed-point types keep their decimal text
    Number { ty: String, repr: String },
    Array(Vec<Value>),
    Dictionary(Vec<(Value, Value)>),
    Composite {
        kind: String,
        id: String,
        fields: Vec<(String, Value)>,
    },
    /// Paths, types, capabilities and anything newer
    Other { ty: String, raw: Json },
}

const NUMBER_TYPES: &[&str] = &[
    "Int", "Int8", "Int16", "Int32", "Int64", "Int128", "Int256", "UInt", "UInt8", "UInt16",
    "UInt32", "UInt64", "UInt128", "UInt256", "Word8", "Word16", "Word32", "Word64", "Word128",
    "Word256", "Fix64", "UFix64",
];

const COMPOSITE_TYPES: &[&str] = &["Struct", "Resource", "Event", "Contract", "Enum"];

impl Value {
    pub fn from_json(doc: &Json) -> Result<Self, CadenceError> {
        let ty = doc
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| CadenceError::Malformed(format!("no type tag in {}", doc)))?;
        let value = doc.get("value").unwrap_or(&Json::Null);

        match ty {
            "Void" => Ok(Value::Void),
            "Optional" => match value {
                Json::Null => Ok(Value::Optional(None)),
                inner => Ok(Value::Optional(Some(Box::new(Value::from_json(inner)?)))),
            },
            "Bool" => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| malformed(ty, value)),
            "String" | "Character" => value
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(|| malformed(ty, value)),
            "Address" => value
                .as_str()
                .map(|s| Value::Address(s.to_string()))
                .ok_or_else(|| malformed(ty, value)),
            t if NUMBER_TYPES.contains(&t) => value
                .as_str()
                .map(|s| Value::Number {
                    ty: t.to_string(),
                    repr: s.to_string(),
                })
                .ok_or_else(|| malformed(ty, value)),
            "Array" => value
                .as_array()
                .ok_or_else(|| malformed(ty, value))?
                .iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            "Dictionary" => value
                .as_array()
                .ok_or_else(|| malformed(ty, value))?
                .iter()
                .map(|entry| {
                    let key = entry
                        .get("key")
                        .ok_or_else(|| malformed("Dictionary entry", entry))?;
                    let val = entry
                        .get("value")
                        .ok_or_else(|| malformed("Dictionary entry", entry))?;
                    Ok((Value::from_json(key)?, Value::from_json(val)?))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Dictionary),
            t if COMPOSITE_TYPES.contains(&t) => {
                let id = value
                    .get("id")
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_string();
                let fields = value
                    .get("fields")
                    .and_then(Json::as_array)
                    .ok_or_else(|| malformed(ty, value))?
                    .iter()
                    .map(|field| {
                        let name = field
                            .get("name")
                            .and_then(Json::as_str)
                            .ok_or_else(|| malformed("field", field))?;
                        let val = field
                            .get("value")
                            .ok_or_else(|| malformed("field", field))?;
                        Ok((name.to_string(), Value::from_json(val)?))
                    })
                    .collect::<Result<Vec<_>, CadenceError>>()?;
                Ok(Value::Composite {
                    kind: t.to_string(),
                    id,
                    fields,
                })
            }
            other => Ok(Value::Other {
                ty: other.to_string(),
                raw: value.clone(),
            }),
        }
    }

    /// Strip any number of `Optional` wrappers; `None` for a nil optional
    pub fn optional(&self) -> Option<&Value> {
        match self {
            Value::Optional(None) => None,
            Value::Optional(Some(inner)) => inner.optional(),
            other => Some(other),
        }
    }

    pub fn field(&self, name: &str) -> Result<&Value, CadenceError> {
        match self.optional() {
            Some(Value::Composite { fields, .. }) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or_else(|| CadenceError::MissingField(name.to_string())),
            Some(Value::Dictionary(entries)) => entries
                .iter()
                .find(|(k, _)| k.as_str().ok() == Some(name))
                .map(|(_, v)| v)
                .ok_or_else(|| CadenceError::MissingField(name.to_string())),
            _ => Err(self.type_error("composite")),
        }
    }

    pub fn as_u64(&self) -> Result<u64, CadenceError> {
        match self.optional() {
            Some(Value::Number { repr, .. }) => {
                repr.parse().map_err(|_| CadenceError::Number(repr.clone()))
            }
            _ => Err(self.type_error("integer")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, CadenceError> {
        match self.optional() {
            Some(Value::Number { repr, .. }) => {
                repr.parse().map_err(|_| CadenceError::Number(repr.clone()))
            }
            _ => Err(self.type_error("number")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, CadenceError> {
        match self.optional() {
            Some(Value::Bool(b)) => Ok(*b),
            _ => Err(self.type_error("Bool")),
        }
    }

    pub fn as_str(&self) -> Result<&str, CadenceError> {
        match self.optional() {
            Some(Value::String(s)) | Some(Value::Address(s)) => Ok(s),
            _ => Err(self.type_error("String")),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], CadenceError> {
        match self.optional() {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(self.type_error("Array")),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Void => "Void",
            Value::Optional(_) => "Optional",
            Value::Bool(_) => "Bool",
            Value::String(_) => "String",
            Value::Address(_) => "Address",
            Value::Number { ty, .. } => ty.as_str(),
            Value::Array(_) => "Array",
            Value::Dictionary(_) => "Dictionary",
            Value::Composite { kind, .. } => kind.as_str(),
            Value::Other { ty, .. } => ty.as_str(),
        }
    }

    fn type_error(&self, expected: &'static str) -> CadenceError {
        CadenceError::Type {
            expected,
            found: self.type_name().to_string(),
        }
    }
}

fn malformed(ty: &str, value: &Json) -> CadenceError {
    CadenceError::Malformed(format!("bad {} payload: {}", ty, value))
}

/// A transaction or script argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    UInt64(u64),
    Int(i64),
    UFix64(f64),
    Fix64(f64),
    Bool(bool),
    String(String),
    Address(String),
}

impl Argument {
    pub fn to_json(&self) -> Json {
        match self {
            Argument::UInt64(v) => json!({ "type": "UInt64", "value": v.to_string() }),
            Argument::Int(v) => json!({ "type": "Int", "value": v.to_string() }),
            Argument::UFix64(v) => json!({ "type": "UFix64", "value": format_fix64(*v) }),
            Argument::Fix64(v) => json!({ "type": "Fix64", "value": format_fix64(*v) }),
            Argument::Bool(v) => json!({ "type": "Bool", "value": v }),
            Argument::String(v) => json!({ "type": "String", "value": v }),
            Argument::Address(v) => json!({ "type": "Address", "value": with_hex_prefix(v) }),
        }
    }

    /// Encoded bytes as signed and sent on the wire
    pub fn encode(&self) -> Vec<u8> {
        // serde_json::Value always serializes
        serde_json::to_vec(&self.to_json()).unwrap_or_default()
    }
}

/// Fixed-point values carry exactly eight decimal places
pub fn format_fix64(v: f64) -> String {
    format!("{:.8}", v)
}

pub fn with_hex_prefix(address: &str) -> String {
    if address.starts_with("0x") {
        address.to_string()
    } else {
        format!("0x{}", address)
    }
}

/// Replace `0xContractName` import placeholders with configured addresses
///
/// Placeholders with no alias are left as-is so the access node reports the
/// unresolved import.
pub fn resolve_imports(code: &str, aliases: &BTreeMap<String, String>) -> String {
    code.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if !trimmed.starts_with("import ") {
                return line.to_string();
            }
            match trimmed.rsplit_once(" from ") {
                Some((head, placeholder)) => {
                    let name = placeholder.trim().trim_start_matches("0x");
                    match aliases.get(name) {
                        Some(address) => {
                            let indent = &line[..line.len() - trimmed.len()];
                            format!("{}{} from {}", indent, head, with_hex_prefix(address))
                        }
                        None => line.to_string(),
                    }
                }
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_optional_ufix64() {
        let some = Value::from_json(&json!({
            "type": "Optional",
            "value": { "type": "UFix64", "value": "49.24629200" }
        }))
        .unwrap();
        assert_eq!(some.as_f64().unwrap(), 49.246292);

        let none = Value::from_json(&json!({ "type": "Optional", "value": null })).unwrap();
        assert!(none.optional().is_none());
        assert!(none.as_f64().is_err());
    }

    #[test]
    fn test_decode_struct_fields() {
        let value = Value::from_json(&json!({
            "type": "Struct",
            "value": {
                "id": "A.cc6a3536f37381a2.HotspotRegistry.Hotspot",
                "fields": [
                    { "name": "id", "value": { "type": "UInt64", "value": "7" } },
                    { "name": "online", "value": { "type": "Bool", "value": true } },
                    { "name": "owner", "value": { "type": "Address", "value": "0x01" } }
                ]
            }
        }))
        .unwrap();

        assert_eq!(value.field("id").unwrap().as_u64().unwrap(), 7);
        assert!(value.field("online").unwrap().as_bool().unwrap());
        assert_eq!(value.field("owner").unwrap().as_str().unwrap(), "0x01");
        assert!(matches!(
            value.field("lat"),
            Err(CadenceError::MissingField(_))
        ));
    }

    #[test]
    fn test_decode_dictionary_and_unknown_types() {
        let value = Value::from_json(&json!({
            "type": "Dictionary",
            "value": [
                { "key": { "type": "String", "value": "name" },
                  "value": { "type": "String", "value": "Operator #1" } }
            ]
        }))
        .unwrap();
        assert_eq!(value.field("name").unwrap().as_str().unwrap(), "Operator #1");

        let path = Value::from_json(&json!({
            "type": "Path",
            "value": { "domain": "storage", "identifier": "flowTokenVault" }
        }))
        .unwrap();
        assert_eq!(path.type_name(), "Path");
    }

    #[test]
    fn test_malformed_documents() {
        assert!(Value::from_json(&json!({ "value": 1 })).is_err());
        assert!(Value::from_json(&json!({ "type": "Bool", "value": "yes" })).is_err());
        assert!(Value::from_json(&json!({ "type": "UInt64", "value": 5 })).is_err());
    }

    #[test]
    fn test_argument_encoding() {
        assert_eq!(
            Argument::UFix64(250.5).to_json(),
            json!({ "type": "UFix64", "value": "250.50000000" })
        );
        assert_eq!(
            Argument::UInt64(27487790823746).to_json(),
            json!({ "type": "UInt64", "value": "27487790823746" })
        );
        assert_eq!(
            Argument::Address("cc6a3536f37381a2".into()).to_json(),
            json!({ "type": "Address", "value": "0xcc6a3536f37381a2" })
        );
        assert_eq!(
            Argument::Bool(false).to_json(),
            json!({ "type": "Bool", "value": false })
        );
    }

    #[test]
    fn test_resolve_imports() {
        let aliases: BTreeMap<String, String> = [
            ("HotspotRegistry".to_string(), "0xcc6a3536f37381a2".to_string()),
            ("NonFungibleToken".to_string(), "631e88ae7f1d7c20".to_string()),
        ]
        .into_iter()
        .collect();

        let code = "  import HotspotRegistry from 0xHotspotRegistry\n\
                    import NonFungibleToken from 0xNonFungibleToken\n\
                    import Missing from 0xMissing\n\
                    access(all) fun main() {}";
        let resolved = resolve_imports(code, &aliases);
        let lines: Vec<_> = resolved.lines().collect();

        assert_eq!(lines[0], "  import HotspotRegistry from 0xcc6a3536f37381a2");
        assert_eq!(lines[1], "import NonFungibleToken from 0x631e88ae7f1d7c20");
        assert_eq!(lines[2], "import Missing from 0xMissing");
        assert_eq!(lines[3], "access(all) fun main() {}");
    }
}
