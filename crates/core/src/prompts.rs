use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path};

/// Named prompt templates with `{placeholder}` substitution.
#[derive(Debug, Clone, Default)]
pub struct Prompts {
    templates: HashMap<String, String>,
}

impl Prompts {
    /// Loads every `*.md` file in `dir`, keyed by file stem.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut templates = HashMap::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to read prompts directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
                let key = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .context("Could not get file stem")?
                    .to_string();
                let content = fs::read_to_string(&path)?;
                templates.insert(key, content);
            }
        }
        Ok(Self { templates })
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            templates: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }

    /// Fails when any of `keys` has no template.
    pub fn require(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.get(key)
                .with_context(|| format!("Missing prompt template: '{}'", key))?;
        }
        Ok(())
    }

    /// Fills `{name}` placeholders of the `key` template.
    pub fn render(&self, key: &str, vars: &[(&str, &str)]) -> Result<String> {
        let template = self
            .get(key)
            .with_context(|| format!("Missing prompt template: '{}'", key))?;
        Ok(vars
            .iter()
            .fold(template.to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders() {
        let prompts = Prompts::from_pairs([("quiz", "Write {count} questions about {topic}.")]);
        let rendered = prompts
            .render("quiz", &[("count", "5"), ("topic", "Osmosis")])
            .unwrap();
        assert_eq!(rendered, "Write 5 questions about Osmosis.");
    }

    #[test]
    fn missing_template_is_an_error() {
        let prompts = Prompts::default();
        assert!(prompts.render("quiz", &[]).is_err());
        assert!(prompts.require(&["quiz"]).is_err());
    }

    #[test]
    fn loads_markdown_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tutor_system.md"), "Be kind.").unwrap();
        fs::write(dir.path().join("ignored.txt"), "nope").unwrap();

        let prompts = Prompts::load_dir(dir.path()).unwrap();
        assert_eq!(prompts.get("tutor_system"), Some("Be kind."));
        assert_eq!(prompts.get("ignored"), None);
    }
}
