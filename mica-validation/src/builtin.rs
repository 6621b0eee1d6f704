//! Schemas of the catalog's own kinds

use serde_json::{json, Value};

/// `/mica/kind/v1`: `data.schema` must be a schema document
pub fn kind_schema() -> Value {
    json!({
        "type": "object",
        "required": ["schema"],
        "properties": {
            "schema": {"type": ["object", "boolean"], "additionalProperties": true},
            "description": {"type": "string"}
        }
    })
}

/// `/mica/view/v1`
pub fn view_schema() -> Value {
    json!({
        "type": "object",
        "required": ["selector", "data"],
        "properties": {
            "description": {"type": "string"},
            "selector": {
                "type": "object",
                "required": ["entityKind"],
                "properties": {
                    "entityKind": {"type": "string", "minLength": 1},
                    "source": {"type": "string", "minLength": 1},
                    "limit": {"type": "integer", "minimum": 1}
                }
            },
            "data": {
                "type": "object",
                "required": ["jsonPath"],
                "properties": {
                    "jsonPath": {"type": "string", "pattern": "^\\$"},
                    "jsonPatch": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["op", "path"],
                            "properties": {
                                "op": {"enum": ["add", "remove", "replace", "move", "copy", "test"]},
                                "path": {"type": "string"}
                            },
                            "additionalProperties": true
                        }
                    },
                    "flatten": {"type": "boolean"},
                    "merge": {"type": "boolean"},
                    "script": {
                        "type": "object",
                        "minProperties": 1,
                        "maxProperties": 1,
                        "properties": {
                            "source": {"type": "string"},
                            "ref": {"type": "string"}
                        }
                    }
                }
            },
            "parameters": {
                "type": "object",
                "additionalProperties": {
                    "type": ["object", "boolean"],
                    "additionalProperties": true
                }
            },
            "outputSchema": {"type": ["object", "boolean"], "additionalProperties": true}
        }
    })
}

/// `/mica/script/v1`
pub fn script_schema() -> Value {
    json!({
        "type": "object",
        "required": ["source"],
        "properties": {
            "source": {"type": "string", "minLength": 1},
            "description": {"type": "string"}
        }
    })
}
