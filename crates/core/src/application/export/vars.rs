// Plan variable table and `${name}` expansion
use std::collections::BTreeMap;

use crate::application::constants::TRUTHY_VALUES;
use crate::error::{ExportError, Result};

/// Resolved plan variables
///
/// Names are case-insensitive (stored lowercase). Values have had every
/// `${name}` reference and a leading `~` expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarTable {
    values: BTreeMap<String, String>,
}

impl VarTable {
    /// Resolve plan variables, with `overrides` taking precedence over `declared`
    ///
    /// Variables may reference each other in any order. References that are not
    /// plan variables fall back to the process environment.
    ///
    /// # Errors
    /// - ExportError::Plan on an unknown reference or a reference cycle
    pub fn resolve(
        declared: &BTreeMap<String, String>,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut raw: BTreeMap<String, String> = declared
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        raw.extend(overrides.iter().map(|(k, v)| (k.to_lowercase(), v.clone())));

        let mut values = BTreeMap::new();
        let mut stack = Vec::new();
        for name in raw.keys() {
            resolve_one(name, &raw, &mut values, &mut stack)?;
        }

        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&name.to_lowercase()).map(String::as_str)
    }

    /// True if the variable is set to 1/true/yes/on (any case)
    pub fn is_truthy(&self, name: &str) -> bool {
        self.get(name)
            .map(|v| TRUTHY_VALUES.contains(&v.trim().to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Evaluate a step's `when` condition
    ///
    /// `name=value` holds when the variable equals `value` (trimmed, any case);
    /// a bare `name` holds when the variable is truthy.
    pub fn condition_holds(&self, condition: &str) -> bool {
        match condition.split_once('=') {
            Some((name, expected)) => self
                .get(name.trim())
                .map(|v| v.trim().eq_ignore_ascii_case(expected.trim()))
                .unwrap_or(false),
            None => self.is_truthy(condition.trim()),
        }
    }

    /// Expand `${name}` references and a leading `~` in `input`
    ///
    /// # Errors
    /// - ExportError::Plan if a reference is neither a plan variable nor set in the environment
    pub fn expand(&self, input: &str) -> Result<String> {
        expand_template(input, |var| match self.get(var) {
            Some(value) => Ok(value.to_string()),
            None => env_fallback(var),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn env_fallback(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| ExportError::Plan(format!("Unknown variable '${{{}}}'", var)))
}

/// Replace every `${name}` in `input` through `lookup`, then a leading `~`
///
/// A bare `$` is literal, so shell scripts and tool arguments such as
/// `echo "$1"` reach the child untouched. An unterminated `${` and an empty
/// `${}` are kept as written.
fn expand_template<L>(input: &str, mut lookup: L) -> Result<String>
where
    L: FnMut(&str) -> Result<String>,
{
    let mut expanded = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        expanded.push_str(&rest[..start]);

        let name = &after[..end];
        if name.is_empty() {
            expanded.push_str("${}");
        } else {
            expanded.push_str(&lookup(name)?);
        }
        rest = &after[end + 1..];
    }
    expanded.push_str(rest);

    Ok(shellexpand::tilde(&expanded).into_owned())
}

fn resolve_one(
    name: &str,
    raw: &BTreeMap<String, String>,
    values: &mut BTreeMap<String, String>,
    stack: &mut Vec<String>,
) -> Result<String> {
    if let Some(value) = values.get(name) {
        return Ok(value.clone());
    }
    if stack.iter().any(|n| n == name) {
        stack.push(name.to_string());
        return Err(ExportError::Plan(format!(
            "Variable reference cycle: {}",
            stack.join(" -> ")
        )));
    }

    let template = match raw.get(name) {
        Some(template) => template.clone(),
        None => return env_fallback(name),
    };

    stack.push(name.to_string());
    let value = expand_template(&template, |var| {
        let key = var.to_lowercase();
        if raw.contains_key(&key) {
            resolve_one(&key, raw, values, stack)
        } else {
            env_fallback(var)
        }
    })?;
    stack.pop();

    values.insert(name.to_string(), value.clone());
    Ok(value)
}
