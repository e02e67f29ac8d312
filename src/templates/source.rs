use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{Template, TemplateParameter};

/// Names Jinja provides itself; never template parameters
const JINJA_BUILTINS: &[&str] = &["loop", "true", "false", "none", "True", "False", "None", "range", "not"];

/// Load a template file: the name is the file name up to its first dot
pub async fn load_template(path: impl AsRef<Path>) -> Result<Template> {
    let path = path.as_ref();
    let body = tokio::fs::read_to_string(path).await?;
    let name = template_name(path)?;
    let params = extract_parameters(&body);

    tracing::info!(
        "Loaded template '{}' from {} ({} parameters)",
        name,
        path.display(),
        params.len()
    );

    Ok(Template { name, body, params })
}

pub fn template_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("cannot derive a template name from {}", path.display())))
}

/// Derive the ordered parameter list from the placeholders of a Jinja body.
///
/// Parameters are ordered by first appearance. Names bound inside the
/// template (`for` targets, `set` assignments) are not parameters.
pub fn extract_parameters(body: &str) -> Vec<TemplateParameter> {
    let mut uses: Vec<(usize, String)> = Vec::new();
    let mut bound: HashSet<String> = HashSet::new();

    // {{ name }}, {{ name | filter }}, {{ name.attr }}
    let expr_re = regex_lite::Regex::new(r"\{\{-?\s*([A-Za-z_]\w*)").ok();
    if let Some(re) = &expr_re {
        for cap in re.captures_iter(body) {
            if let Some(m) = cap.get(1) {
                uses.push((m.start(), m.as_str().to_string()));
            }
        }
    }

    // {% if name %}, {% elif not name %}
    let if_re = regex_lite::Regex::new(r"\{%-?\s*(?:if|elif)\s+(?:not\s+)?([A-Za-z_]\w*)").ok();
    if let Some(re) = &if_re {
        for cap in re.captures_iter(body) {
            if let Some(m) = cap.get(1) {
                uses.push((m.start(), m.as_str().to_string()));
            }
        }
    }

    // {% for item in items %}, {% for key, value in pairs %}
    let for_re = regex_lite::Regex::new(r"\{%-?\s*for\s+(\w+)(?:\s*,\s*(\w+))?\s+in\s+([A-Za-z_]\w*)").ok();
    if let Some(re) = &for_re {
        for cap in re.captures_iter(body) {
            for target in [cap.get(1), cap.get(2)].into_iter().flatten() {
                bound.insert(target.as_str().to_string());
            }
            if let Some(m) = cap.get(3) {
                uses.push((m.start(), m.as_str().to_string()));
            }
        }
    }

    let set_re = regex_lite::Regex::new(r"\{%-?\s*set\s+(\w+)\s*=").ok();
    if let Some(re) = &set_re {
        for cap in re.captures_iter(body) {
            if let Some(m) = cap.get(1) {
                bound.insert(m.as_str().to_string());
            }
        }
    }

    uses.sort_by_key(|(pos, _)| *pos);

    let mut seen = HashSet::new();
    uses.into_iter()
        .map(|(_, name)| name)
        .filter(|name| !bound.contains(name) && !JINJA_BUILTINS.contains(&name.as_str()))
        .filter(|name| seen.insert(name.clone()))
        .enumerate()
        .map(|(i, name)| TemplateParameter::string(name, i as u32 + 1))
        .collect()
}
