//! Structured-output contract for the repair report.
//!
//! One declarative tree describes every [`MechanicResponse`] field. It is sent
//! natively to providers with constrained decoding, embedded as text in the
//! prompt for providers without it, and used to validate every reply before
//! it is deserialized.
//!
//! [`MechanicResponse`]: crate::models::MechanicResponse

use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone)]
pub enum SchemaNode {
    String {
        description: Option<&'static str>,
    },
    Array {
        items: Box<SchemaNode>,
        description: Option<&'static str>,
    },
    Object {
        properties: Vec<(&'static str, SchemaNode)>,
        required: Vec<&'static str>,
        description: Option<&'static str>,
    },
}

/// First place where a reply departs from the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

fn string() -> SchemaNode {
    SchemaNode::String { description: None }
}

fn array(items: SchemaNode) -> SchemaNode {
    SchemaNode::Array {
        items: Box::new(items),
        description: None,
    }
}

fn object(properties: Vec<(&'static str, SchemaNode)>, required: &[&'static str]) -> SchemaNode {
    SchemaNode::Object {
        properties,
        required: required.to_vec(),
        description: None,
    }
}

impl SchemaNode {
    fn describe(mut self, text: &'static str) -> Self {
        match &mut self {
            SchemaNode::String { description }
            | SchemaNode::Array { description, .. }
            | SchemaNode::Object { description, .. } => *description = Some(text),
        }
        self
    }

    fn type_name(&self) -> &'static str {
        match self {
            SchemaNode::String { .. } => "STRING",
            SchemaNode::Array { .. } => "ARRAY",
            SchemaNode::Object { .. } => "OBJECT",
        }
    }

    /// Render in the `responseSchema` dialect (upper-case type names).
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".to_string(), json!(self.type_name()));

        let description = match self {
            SchemaNode::String { description } => description,
            SchemaNode::Array { items, description } => {
                out.insert("items".to_string(), items.to_json());
                description
            }
            SchemaNode::Object {
                properties,
                required,
                description,
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(name, node)| (name.to_string(), node.to_json()))
                    .collect();
                out.insert("properties".to_string(), Value::Object(props));
                out.insert("required".to_string(), json!(required));
                description
            }
        };

        if let Some(text) = description {
            out.insert("description".to_string(), json!(text));
        }
        Value::Object(out)
    }

    /// Pretty JSON text for prompts that cannot carry a native schema.
    pub fn to_prompt_text(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_default()
    }

    /// Check that `value` has the declared shape.
    ///
    /// Required properties must be present and non-null. Required strings on
    /// the top-level object must also be non-blank.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at(value, "$", true)
    }

    fn validate_at(
        &self,
        value: &Value,
        path: &str,
        top_level: bool,
    ) -> Result<(), SchemaViolation> {
        let violation = |reason: String| SchemaViolation {
            path: path.to_string(),
            reason,
        };

        match self {
            SchemaNode::String { .. } => {
                if !value.is_string() {
                    return Err(violation(format!("expected string, found {}", kind_of(value))));
                }
            }
            SchemaNode::Array { items, .. } => {
                let elements = value.as_array().ok_or_else(|| {
                    violation(format!("expected array, found {}", kind_of(value)))
                })?;
                for (i, element) in elements.iter().enumerate() {
                    items.validate_at(element, &format!("{}[{}]", path, i), false)?;
                }
            }
            SchemaNode::Object {
                properties,
                required,
                ..
            } => {
                let fields = value.as_object().ok_or_else(|| {
                    violation(format!("expected object, found {}", kind_of(value)))
                })?;

                for (name, node) in properties {
                    let child_path = format!("{}.{}", path, name);
                    let is_required = required.contains(name);
                    match fields.get(*name) {
                        None | Some(Value::Null) if is_required => {
                            return Err(SchemaViolation {
                                path: child_path,
                                reason: "required field is missing".to_string(),
                            });
                        }
                        None | Some(Value::Null) => {}
                        Some(field) => {
                            node.validate_at(field, &child_path, false)?;
                            if top_level && is_required {
                                if let Some(text) = field.as_str() {
                                    if text.trim().is_empty() {
                                        return Err(SchemaViolation {
                                            path: child_path,
                                            reason: "required field is empty".to_string(),
                                        });
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn video_link() -> SchemaNode {
    object(vec![("title", string()), ("url", string())], &["title", "url"])
}

static MECHANIC_RESPONSE_SCHEMA: LazyLock<SchemaNode> = LazyLock::new(build_mechanic_response);

/// The report schema shared by every provider adapter.
pub fn mechanic_response() -> &'static SchemaNode {
    &MECHANIC_RESPONSE_SCHEMA
}

fn build_mechanic_response() -> SchemaNode {
    let similar_case = object(
        vec![
            (
                "case_name",
                string().describe("Title of the similar case, in the explanation language."),
            ),
            ("relevance_score", string().describe("Match level, e.g. 'Highly relevant - 95%'.")),
            ("related_dtc", array(string())),
            ("culprit_component", string().describe("Root-cause component in technical English.")),
            (
                "symptoms_match",
                string().describe("Matching symptoms, in the explanation language."),
            ),
            (
                "solution_steps",
                array(string()).describe("Instructive fix steps, in the explanation language."),
            ),
            ("video_ref", video_link()),
            (
                "image_search_keywords",
                string().describe("Specific visual keywords for the failed part or its location."),
            ),
        ],
        &[
            "case_name",
            "relevance_score",
            "related_dtc",
            "culprit_component",
            "symptoms_match",
            "solution_steps",
            "video_ref",
            "image_search_keywords",
        ],
    );

    let dtc_item = object(
        vec![
            ("code", string()),
            ("definition", string().describe("Definition in the explanation language.")),
            ("possible_cause", string().describe("Cause in the explanation language.")),
            ("related_components", string()),
            ("symptoms", string().describe("Symptoms in the explanation language.")),
            ("fix_suggestion", string().describe("Fix suggestion in the explanation language.")),
        ],
        &[
            "code",
            "definition",
            "possible_cause",
            "related_components",
            "symptoms",
            "fix_suggestion",
        ],
    );

    let tsb_item = object(vec![("id", string()), ("summary", string())], &["id", "summary"]);

    let aftermarket_part = object(
        vec![
            ("brand", string()),
            ("part_number", string()),
            ("estimated_price", string()),
        ],
        &["brand", "part_number", "estimated_price"],
    );

    let maintenance_item = object(
        vec![
            ("item", string()),
            ("spec", string()),
            ("value", string()),
            ("oem_part_number", string().describe("Original (OEM) part number.")),
            ("oem_brand", string().describe("Original brand, e.g. 'Toyota Genuine Parts'.")),
            (
                "aftermarket_parts",
                array(aftermarket_part)
                    .describe("Two or three popular aftermarket options with estimated prices."),
            ),
        ],
        &["item", "spec", "value"],
    );

    let torque_spec = object(
        vec![("part", string()), ("value", string()), ("size", string())],
        &["part", "value"],
    );

    let cost_estimation = object(
        vec![
            ("parts_total", string()),
            ("labor_cost", string()),
            (
                "hourly_rate",
                string().describe("Average authorized-workshop hourly labor rate for this make."),
            ),
            ("total_estimate", string()),
        ],
        &["parts_total", "labor_cost", "hourly_rate", "total_estimate"],
    )
    .describe("Dealer cost estimate.");

    object(
        vec![
            ("vehicle_info", string().describe("Vehicle identification (make/model/year/engine).")),
            ("component_id", string().describe("Component ID or main part code.")),
            (
                "component_name",
                string().describe(
                    "Component name in technical English (e.g. 'Brake Caliper Assembly').",
                ),
            ),
            (
                "diagnosis",
                array(string()).describe("Possible diagnoses, in the explanation language."),
            ),
            (
                "similar_cases",
                array(similar_case)
                    .describe("One or two real-world similar cases, most relevant first."),
            ),
            ("dtc_list", array(dtc_item).describe("Diagnostic trouble codes.")),
            ("tsb_list", array(tsb_item).describe("Technical service bulletins and recalls.")),
            (
                "manual_summary",
                string()
                    .describe("To-the-point repair manual summary, in the explanation language."),
            ),
            (
                "wiring_diagram_desc",
                string().describe("Textual wiring path and pinout, in the explanation language."),
            ),
            ("wiring_search_keywords", string().describe("Wiring image search keywords.")),
            (
                "maintenance_data",
                array(maintenance_item)
                    .describe("Maintenance specs with OEM part numbers and aftermarket options."),
            ),
            ("torque_specs", array(torque_spec).describe("Torque table.")),
            ("tools_list", array(string()).describe("Required tools in technical English.")),
            (
                "safety_warning",
                array(string()).describe("Safety procedures, in the explanation language."),
            ),
            (
                "sop_steps",
                array(string()).describe("Ordered repair steps, in the explanation language."),
            ),
            ("video_tutorials", array(video_link()).describe("Video tutorial links.")),
            ("estimated_work_time", string().describe("Flat-rate work time estimate.")),
            ("cost_estimation", cost_estimation),
        ],
        &[
            "vehicle_info",
            "component_id",
            "component_name",
            "diagnosis",
            "similar_cases",
            "dtc_list",
            "tsb_list",
            "wiring_diagram_desc",
            "wiring_search_keywords",
            "manual_summary",
            "maintenance_data",
            "torque_specs",
            "tools_list",
            "safety_warning",
            "sop_steps",
            "video_tutorials",
            "estimated_work_time",
            "cost_estimation",
        ],
    )
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    /// A schema-conformant report used across adapter tests.
    pub fn sample_report_json() -> Value {
        json!({
            "vehicle_info": "Toyota Avanza 2019 1.3L",
            "component_id": "13540-0Y040",
            "component_name": "Timing Chain Tensioner",
            "diagnosis": ["Tensioner timing chain melemah saat oli belum bersirkulasi."],
            "similar_cases": [{
                "case_name": "Avanza berisik saat idle",
                "relevance_score": "Sangat Relevan - 90%",
                "related_dtc": [],
                "culprit_component": "Timing Chain Tensioner",
                "symptoms_match": "Bunyi gemeretak di idle",
                "solution_steps": ["Periksa tensioner", "Ganti bila aus"],
                "video_ref": {
                    "title": "Timing chain rattle fix",
                    "url": "https://www.youtube.com/results?search_query=Avanza+timing+chain+rattle"
                },
                "image_search_keywords": "Avanza timing chain tensioner location"
            }],
            "dtc_list": [],
            "tsb_list": [],
            "manual_summary": "Periksa tekanan oli dan kondisi tensioner.",
            "wiring_diagram_desc": "Tidak ada jalur kabel terkait.",
            "wiring_search_keywords": "Avanza 1NR-VE wiring",
            "maintenance_data": [{
                "item": "Engine Oil",
                "spec": "SAE 0W-20",
                "value": "3.5L"
            }],
            "torque_specs": [{ "part": "Tensioner bolt", "value": "10 Nm" }],
            "tools_list": ["Socket Wrench 10mm"],
            "safety_warning": ["Pastikan mesin dingin."],
            "sop_steps": ["Lepas cover mesin", "Lepas tensioner", "Pasang tensioner baru"],
            "video_tutorials": [{
                "title": "Avanza tensioner replacement",
                "url": "https://www.youtube.com/results?search_query=Avanza+tensioner+replacement"
            }],
            "estimated_work_time": "1.5 Jam",
            "cost_estimation": {
                "parts_total": "Rp 450.000",
                "labor_cost": "Rp 337.500",
                "hourly_rate": "Rp 225.000/Jam",
                "total_estimate": "Rp 787.500"
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample_report_json;
    use super::*;

    #[test]
    fn test_top_level_schema_lists_every_report_field() {
        let schema = mechanic_response().to_json();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 18);

        let properties = schema["properties"].as_object().unwrap();
        for name in required {
            assert!(properties.contains_key(name.as_str().unwrap()));
        }
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(properties["sop_steps"]["items"]["type"], "STRING");
    }

    #[test]
    fn test_sample_report_validates() {
        mechanic_response()
            .validate(&sample_report_json())
            .unwrap();
    }

    #[test]
    fn test_missing_required_field_is_reported() {
        let mut report = sample_report_json();
        report.as_object_mut().unwrap().remove("sop_steps");

        let err = mechanic_response().validate(&report).unwrap_err();
        assert_eq!(err.path, "$.sop_steps");
    }

    #[test]
    fn test_null_required_field_is_reported() {
        let mut report = sample_report_json();
        report["cost_estimation"] = Value::Null;

        let err = mechanic_response().validate(&report).unwrap_err();
        assert_eq!(err.path, "$.cost_estimation");
    }

    #[test]
    fn test_nested_shape_mismatch_is_reported() {
        let mut report = sample_report_json();
        report["similar_cases"][0]["solution_steps"] = json!("not a list");

        let err = mechanic_response().validate(&report).unwrap_err();
        assert_eq!(err.path, "$.similar_cases[0].solution_steps");
        assert!(err.reason.contains("expected array"));
    }

    #[test]
    fn test_blank_top_level_string_is_rejected() {
        let mut report = sample_report_json();
        report["component_name"] = json!("  ");

        let err = mechanic_response().validate(&report).unwrap_err();
        assert_eq!(err.path, "$.component_name");
    }

    #[test]
    fn test_optional_fields_may_be_absent_or_null() {
        let mut report = sample_report_json();
        report["torque_specs"][0]["size"] = Value::Null;

        mechanic_response().validate(&report).unwrap();
    }

    #[test]
    fn test_prompt_text_matches_native_schema() {
        let text = mechanic_response().to_prompt_text();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, mechanic_response().to_json());
    }
}
