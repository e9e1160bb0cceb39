use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use cardsmith_ctml::{Axis, CardUnit, SizeContext};

use crate::error::CardResult;

/// The top-level card set definition, read from the entry JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSet {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub width: CardUnit,
    pub height: CardUnit,
    pub font_size: CardUnit,

    /// Markup document of the shared back face.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,

    /// Front face variants: display name to markup document.
    #[serde(default)]
    pub variants: HashMap<String, String>,

    #[serde(default)]
    pub resources: CardResources,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardResources {
    /// Font name to font file.
    #[serde(default)]
    pub fonts: HashMap<String, String>,

    /// Script name to script file, shared by every face.
    #[serde(default)]
    pub scripts: HashMap<String, String>,
}

impl CardSet {
    /// Builds the root sizing context. Card dimensions must resolve with
    /// no context, so percentage or viewport units at the root fail here.
    pub fn root_context(&self) -> CardResult<SizeContext> {
        let width = self.width.resolve_pixels(None, Some(Axis::Width))?;
        let height = self.height.resolve_pixels(None, Some(Axis::Height))?;
        let font_size = self.font_size.resolve_pixels(None, None)?;
        Ok(SizeContext::for_root(width, height, font_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsmith_ctml::CtmlError;
    use pretty_assertions::assert_eq;

    fn definition(width: &str) -> CardSet {
        serde_json::from_str(&format!(
            r#"{{
                "name": "demo",
                "width": "{width}",
                "height": "3.5in",
                "fontSize": "12px",
                "variants": {{}},
                "resources": {{ "fonts": {{}}, "scripts": {{}} }}
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn parses_unit_fields_from_json() {
        let set = definition("2.5in");
        let ctx = set.root_context().unwrap();
        assert_eq!(ctx.width(), 240);
        assert_eq!(ctx.height(), 336);
        assert_eq!(ctx.font_size(), 12);
    }

    #[test]
    fn relative_root_dimensions_are_rejected() {
        let set = definition("50%");
        assert!(matches!(
            set.root_context(),
            Err(crate::error::CardError::Ctml(CtmlError::MissingContext { .. }))
        ));
    }

    #[test]
    fn optional_fields_default() {
        let set: CardSet = serde_json::from_str(
            r#"{ "name": "d", "width": "100px", "height": "100px", "fontSize": "10px" }"#,
        )
        .unwrap();
        assert!(set.back.is_none());
        assert!(set.variants.is_empty());
        assert!(set.resources.scripts.is_empty());
    }
}
