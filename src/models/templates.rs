use serde::{Deserialize, Serialize};

/// Project groups templates on the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// TemplateParameter describes one placeholder of a template body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateParameter {
    pub parameter_name: String,
    pub data_type: String,
    pub required: bool,
    pub order: u32,
}

impl TemplateParameter {
    pub fn string(name: impl Into<String>, order: u32) -> Self {
        Self {
            parameter_name: name.into(),
            data_type: "STRING".to_string(),
            required: true,
            order,
        }
    }
}

/// Template is the local definition of a CLI template to reconcile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub body: String,
    pub params: Vec<TemplateParameter>,
}

impl Template {
    /// Names of required parameters without a value in `values`
    pub fn missing_values<'a>(
        &'a self,
        values: &std::collections::HashMap<String, serde_json::Value>,
    ) -> Vec<&'a str> {
        self.params
            .iter()
            .filter(|p| p.required && !values.contains_key(&p.parameter_name))
            .map(|p| p.parameter_name.as_str())
            .collect()
    }
}

/// Metadata every template created by this tool carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateConventions {
    pub product_families: Vec<String>,
    pub software_type: String,
    pub software_variant: String,
    pub language: String,
    pub author: String,
}

impl Default for TemplateConventions {
    fn default() -> Self {
        Self {
            product_families: vec!["Routers".to_string(), "Switches and Hubs".to_string()],
            software_type: "IOS-XE".to_string(),
            software_variant: "XE".to_string(),
            language: "JINJA".to_string(),
            author: "dnac-rollout".to_string(),
        }
    }
}
