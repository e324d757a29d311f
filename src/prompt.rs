//! Prompt construction from a Tera template.
//!
//! The built-in template embeds the style guide and the source text verbatim and
//! ends with an instruction to return only corrected code. A user template can
//! replace it; it receives the same variables:
//!
//! | Variable | Value |
//! |---|---|
//! | `language` | display name, e.g. `C#` |
//! | `file_name` | source file name, e.g. `Program.cs` |
//! | `style_guide` | full style guide text |
//! | `code` | full source text |

use crate::{
    config::Config,
    error::{Error, Result},
    language::Language,
    style_guide::StyleGuide,
};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tera::{Context, Tera};

const BUILTIN_TEMPLATE: &str = "style_check";
const CUSTOM_TEMPLATE: &str = "custom";

/// Maximum template file size (1MB)
const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

/// Variables every template has to use
const REQUIRED_VARIABLES: &[&str] = &["style_guide", "code"];

/// A fully rendered prompt. Never modified after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    /// Returns the prompt text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the prompt, returning its text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
struct PromptContext<'a> {
    language: &'a str,
    file_name: &'a str,
    style_guide: &'a str,
    code: &'a str,
}

/// Renders style-check prompts.
#[derive(Debug)]
pub struct PromptBuilder {
    tera: Tera,
    template_name: &'static str,
    language: Language,
}

impl PromptBuilder {
    /// Creates a builder using the built-in template.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in template fails to compile.
    pub fn new(language: Language) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(BUILTIN_TEMPLATE, include_str!("../templates/style_check.tera"))
            .map_err(|e| Error::template(BUILTIN_TEMPLATE, &e))?;

        Ok(Self {
            tera,
            template_name: BUILTIN_TEMPLATE,
            language,
        })
    }

    /// Creates a builder from configuration, loading the user template if one is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be read or compiled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::new(config.language)?;

        if let Some(ref path) = config.template_path {
            let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            builder
                .tera
                .add_raw_template(CUSTOM_TEMPLATE, &content)
                .map_err(|e| Error::template(path.to_string_lossy(), &e))?;
            builder.template_name = CUSTOM_TEMPLATE;
        }

        Ok(builder)
    }

    /// Builds the prompt for one source file.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn build(&self, file_name: &str, style_guide: &StyleGuide, code: &str) -> Result<Prompt> {
        let context = PromptContext {
            language: self.language.display_name(),
            file_name,
            style_guide: style_guide.text(),
            code,
        };

        let context = Context::from_serialize(&context)
            .map_err(|e| Error::template(self.template_name, &e))?;

        self.tera
            .render(self.template_name, &context)
            .map(Prompt)
            .map_err(|e| Error::template(self.template_name, &e))
    }

    /// Validates an external template file.
    ///
    /// Checks that the file exists, is within the size limit, is not blank,
    /// compiles as Tera, and references `style_guide` and `code`.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first failed check.
    pub fn validate_template(path: &Path) -> Result<()> {
        let name = path.to_string_lossy().to_string();

        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if !metadata.is_file() {
            return Err(Error::template_validation(name, "Path is not a file"));
        }
        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(Error::template_validation(
                name,
                format!(
                    "Template file too large: {} bytes (max: {} bytes)",
                    metadata.len(),
                    MAX_TEMPLATE_SIZE
                ),
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        if content.trim().is_empty() {
            return Err(Error::template_validation(name, "Template file is empty"));
        }

        let mut tera = Tera::default();
        tera.add_raw_template("validation", &content).map_err(|e| {
            Error::template_validation(name.clone(), format!("Template syntax error: {e}"))
        })?;

        // Heuristic: look for the variable inside an expression or a for-loop.
        let missing: Vec<&str> = REQUIRED_VARIABLES
            .iter()
            .filter(|var| {
                let patterns = [
                    format!("{{{{ {var}"),
                    format!("{{{{{var}"),
                    format!("in {var}"),
                ];
                !patterns.iter().any(|pattern| content.contains(pattern))
            })
            .copied()
            .collect();

        if !missing.is_empty() {
            return Err(Error::template_validation(
                name,
                format!(
                    "Template may be missing required variables: {}",
                    missing.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_builtin_prompt_layout() {
        let builder = PromptBuilder::new(Language::CSharp).unwrap();
        let guide = StyleGuide::from_text("Use PascalCase.");

        let prompt = builder.build("A.cs", &guide, "class a {}").unwrap();

        assert_eq!(
            prompt.as_str(),
            "Check and rewrite the following C# code according to this style guide.\n\
             Style Guide:\nUse PascalCase.\n\n\
             Code:\nclass a {}\n\n\
             Return only the corrected code."
        );
    }

    #[test]
    fn test_prompt_embeds_text_verbatim() {
        let builder = PromptBuilder::new(Language::JavaScript).unwrap();
        let guide = StyleGuide::from_text("Rule: <b>&\"quotes\"</b> {{ not_a_var }}\n");
        let code = "const s = `{% raw %}`;\nif (a < b && c > d) {}\n";

        let prompt = builder.build("x.js", &guide, code).unwrap();

        assert!(prompt.as_str().contains(guide.text()));
        assert!(prompt.as_str().contains(code));
        assert!(prompt.as_str().ends_with("Return only the corrected code."));
    }

    #[test]
    fn test_custom_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("custom.tera");
        template
            .write_str("[{{ language }}] {{ file_name }}\n{{ style_guide }}\n---\n{{ code }}")
            .unwrap();

        let config = Config::builder()
            .language(Language::Python)
            .template_path(template.path())
            .build()
            .unwrap();
        let builder = PromptBuilder::from_config(&config).unwrap();

        let prompt = builder
            .build("a.py", &StyleGuide::from_text("pep8"), "x=1")
            .unwrap();

        assert_eq!(prompt.as_str(), "[Python] a.py\npep8\n---\nx=1");
    }

    #[test]
    fn test_validate_nonexistent_file() {
        let result = PromptBuilder::validate_template(Path::new("/nonexistent/template.tera"));
        assert!(result.unwrap_err().is_io());
    }

    #[test]
    fn test_validate_empty_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("empty.tera");
        template_file.write_str("   \n  \n  ").unwrap();

        let result = PromptBuilder::validate_template(template_file.path());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_syntax_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("invalid.tera");
        template_file
            .write_str("{% if code %}\n{{ style_guide }} unclosed")
            .unwrap();

        let result = PromptBuilder::validate_template(template_file.path());
        assert!(result.unwrap_err().to_string().contains("Template syntax error"));
    }

    #[test]
    fn test_validate_missing_required_vars() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("incomplete.tera");
        template_file.write_str("Fix this: {{ code }}").unwrap();

        let err = PromptBuilder::validate_template(template_file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("missing required variables"));
        assert!(message.contains("style_guide"));
    }

    #[test]
    fn test_validate_file_too_large() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("large.tera");
        let large_content = "x".repeat((MAX_TEMPLATE_SIZE + 1) as usize);
        template_file.write_str(&large_content).unwrap();

        let result = PromptBuilder::validate_template(template_file.path());
        assert!(result.unwrap_err().to_string().contains("too large"));
    }
}
