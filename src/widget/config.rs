pub const DEFAULT_DISPLAY_NAME: &str = "AI Assistant";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub api_key: Option<String>,
    pub use_markdown: bool,
    pub display_name: String,
    pub system_context: Option<String>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            use_markdown: false,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            system_context: None,
        }
    }
}

impl WidgetConfig {
    pub const OBSERVED_ATTRIBUTES: [&'static str; 4] = [
        "api-key",
        "use-markdown",
        "display-name",
        "context",
    ];

    /// Attribute-style update. Returns false for names that are not observed.
    /// Only the literal `"true"` turns markdown on.
    pub fn apply_attribute(&mut self, name: &str, value: Option<&str>) -> bool {
        match name {
            "api-key" => {
                self.api_key = value.map(str::to_owned);
            }
            "use-markdown" => {
                self.use_markdown = value == Some("true");
            }
            "display-name" => {
                self.display_name = value
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or(DEFAULT_DISPLAY_NAME)
                    .to_string();
            }
            "context" => {
                self.system_context = value.map(str::to_owned);
            }
            _ => {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_markdown_requires_literal_true() {
        let mut config = WidgetConfig::default();
        assert!(config.apply_attribute("use-markdown", Some("true")));
        assert!(config.use_markdown);
        config.apply_attribute("use-markdown", Some("yes"));
        assert!(!config.use_markdown);
    }

    #[test]
    fn test_unknown_attribute_is_ignored() {
        let mut config = WidgetConfig::default();
        assert!(!config.apply_attribute("colour", Some("blue")));
        assert_eq!(config, WidgetConfig::default());
    }

    #[test]
    fn test_removing_display_name_restores_default() {
        let mut config = WidgetConfig::default();
        config.apply_attribute("display-name", Some("Helper"));
        assert_eq!(config.display_name, "Helper");
        config.apply_attribute("display-name", None);
        assert_eq!(config.display_name, DEFAULT_DISPLAY_NAME);
    }
}
