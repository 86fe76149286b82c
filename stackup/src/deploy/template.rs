//! Nested template references

use std::sync::LazyLock;

use regex::{Captures, Regex};
use stack_models::{StorageLocator, TemplateReference};

/// Finds and rewrites nested template references in a template body
pub trait NestedTemplates: Send + Sync {
    /// Local references, in order of appearance
    fn references(&self, body: &str) -> Vec<TemplateReference>;

    /// Point every local reference at its uploaded object
    fn rewrite(&self, body: &str, locator: &StorageLocator) -> String;
}

// Groups: indentation, path (leading ./ stripped), trailing whitespace
static TEMPLATE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*)TemplateURL:[ \t]*(?:\./)*(\S(?:.*\S)?)([ \t]*\r?)$")
        .expect("template url pattern is valid")
});

/// Line based `TemplateURL: <path>` scanner
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateUrlPattern;

impl TemplateUrlPattern {
    /// Absolute URLs and intrinsic functions are not local files
    fn is_local(path: &str) -> bool {
        !path.contains("://") && !path.starts_with('!') && !path.starts_with('{')
    }
}

impl NestedTemplates for TemplateUrlPattern {
    fn references(&self, body: &str) -> Vec<TemplateReference> {
        TEMPLATE_URL
            .captures_iter(body)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let path = caps.get(2)?.as_str();
                if !Self::is_local(path) {
                    return None;
                }
                Some(TemplateReference {
                    path: path.to_string(),
                    line: body[..whole.start()].matches('\n').count(),
                })
            })
            .collect()
    }

    fn rewrite(&self, body: &str, locator: &StorageLocator) -> String {
        TEMPLATE_URL
            .replace_all(body, |caps: &Captures| {
                let path = &caps[2];
                if !Self::is_local(path) {
                    return caps[0].to_string();
                }
                format!(
                    "{}TemplateURL: {}{}",
                    &caps[1],
                    locator.object_url(path),
                    &caps[3]
                )
            })
            .into_owned()
    }
}
