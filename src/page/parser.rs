//! HTML element extraction
//!
//! Pulls out everything the scheduler needs from a document: the paths to
//! feed back into the frontier and a structural signature of its forms, used
//! for page identity.

use crate::url::to_absolute;
use scraper::{Html, Selector};
use url::Url;

/// Elements parsed out of a page body
#[derive(Debug, Clone, Default)]
pub struct Elements {
    /// Absolute, normalized paths in document order, without duplicates
    pub paths: Vec<Url>,

    /// Forms found in the document
    pub forms: Vec<Form>,
}

/// Structural description of an HTML form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub action: Url,
    pub method: String,
    /// Names of the form's inputs, selects and textareas
    pub inputs: Vec<String>,
}

impl Form {
    /// Signature ignoring input order and values
    pub fn signature(&self) -> String {
        let mut inputs = self.inputs.clone();
        inputs.sort();
        format!("{} {} [{}]", self.method, self.action, inputs.join(","))
    }
}

/// Attribute-carrying elements that reference other resources
const PATH_SOURCES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[href]", "href"),
    ("frame[src]", "src"),
    ("iframe[src]", "src"),
];

/// Parses HTML and extracts paths and forms
///
/// # Path Extraction Rules
///
/// **Include:** `<a>`, `<area>` and `<link>` hrefs, frame and iframe sources,
/// form actions and `<meta http-equiv="refresh">` targets.
///
/// **Exclude:** `javascript:`, `mailto:`, `tel:` and `data:` references,
/// fragment-only links and anything that does not resolve to HTTP(S).
pub fn parse(html: &str, base_url: &Url) -> Elements {
    let document = Html::parse_document(html);

    let mut paths = Vec::new();
    for (selector, attr) in PATH_SOURCES {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(url) = element.value().attr(attr).and_then(|r| resolve(r, base_url)) {
                paths.push(url);
            }
        }
    }

    paths.extend(meta_refresh_targets(&document, base_url));

    let forms = extract_forms(&document, base_url);
    paths.extend(forms.iter().map(|f| f.action.clone()));

    let mut unique = Vec::with_capacity(paths.len());
    for path in paths {
        if !unique.contains(&path) {
            unique.push(path);
        }
    }

    Elements {
        paths: unique,
        forms,
    }
}

fn extract_forms(document: &Html, base_url: &Url) -> Vec<Form> {
    let (Ok(form_selector), Ok(input_selector)) = (
        Selector::parse("form"),
        Selector::parse("input[name], select[name], textarea[name]"),
    ) else {
        return Vec::new();
    };

    document
        .select(&form_selector)
        .filter_map(|form| {
            let action = match form.value().attr("action") {
                Some(action) if !action.trim().is_empty() => resolve(action, base_url)?,
                _ => base_url.clone(),
            };
            let method = form
                .value()
                .attr("method")
                .unwrap_or("get")
                .trim()
                .to_uppercase();
            let inputs = form
                .select(&input_selector)
                .filter_map(|input| input.value().attr("name"))
                .map(str::to_string)
                .collect();

            Some(Form {
                action,
                method,
                inputs,
            })
        })
        .collect()
}

fn meta_refresh_targets(document: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("meta[http-equiv][content]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|meta| {
            meta.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
        })
        .filter_map(|meta| {
            let content = meta.value().attr("content")?;
            let lower = content.to_ascii_lowercase();
            let idx = lower.find("url=")?;
            let target = content[idx + 4..].trim().trim_matches(|c| c == '\'' || c == '"');
            resolve(target, base_url)
        })
        .collect()
}

/// Resolves a reference, returning `None` for the excluded kinds
fn resolve(reference: &str, base_url: &Url) -> Option<Url> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let lower = reference.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    to_absolute(reference, base_url)
}
