//! Naming and source composition for templates stored as CMS entries.
//!
//! A dynamic template is addressed as `{kind}-{entryID}`; the kind selects
//! the model holding templates of that kind, the rest is the entry ID.

use crate::error::CoreError;

/// Parsed dynamic template name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicTemplateName {
    pub kind: String,
    pub entry_id: String,
}

impl DynamicTemplateName {
    /// Split `name` on its first `-`. Entry IDs may themselves contain `-`.
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        match name.split_once('-') {
            Some((kind, entry_id)) if !kind.is_empty() && !entry_id.is_empty() => Ok(Self {
                kind: kind.to_string(),
                entry_id: entry_id.to_string(),
            }),
            _ => Err(CoreError::Validation(format!(
                "invalid template name '{name}': should be of the form xxx-entryID"
            ))),
        }
    }
}

/// Template source for an entry with `style` and `content` fields.
pub fn compose_template_source(style: &str, content: &str) -> String {
    format!("<style>{style}</style>\n{content}")
}
