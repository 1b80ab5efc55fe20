//! Slugs and display names derived from dataset directory names.

use regex::Regex;
use std::sync::OnceLock;

/// Longest slug the platform accepts.
pub const MAX_SLUG_LENGTH: usize = 63;

fn kebab_case() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("static regex"))
}

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("static regex"))
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_]+").expect("static regex"))
}

fn hyphen_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").expect("static regex"))
}

/// Converts text into a URL-safe kebab-case slug of at most `max_length` characters.
///
/// Text that already is a kebab-case slug passes through unchanged. Over-long slugs
/// are cut at a hyphen boundary while keeping their final segment, so `-oa` style
/// suffixes survive truncation.
pub fn slugify(text: &str, max_length: usize) -> String {
    let slug = if kebab_case().is_match(text) {
        text.to_string()
    } else {
        let lowered = text.to_lowercase();
        let cleaned = disallowed().replace_all(lowered.trim(), "");
        let dashed = separators().replace_all(&cleaned, "-");
        let collapsed = hyphen_runs().replace_all(&dashed, "-");
        collapsed.trim_matches('-').to_string()
    };

    if slug.chars().count() <= max_length {
        return slug;
    }

    let suffix = slug.rfind('-').map(|idx| &slug[idx..]).unwrap_or("");
    let suffix_len = suffix.chars().count();
    if suffix_len >= max_length {
        return slug.chars().take(max_length).collect();
    }

    let head: String = slug.chars().take(max_length - suffix_len).collect();
    let head = match head.rfind('-') {
        Some(idx) => &head[..idx],
        None => head.as_str(),
    };
    format!("{head}{suffix}")
}

/// `"journal-of-law"` -> `"Journal Of Law"`.
pub fn display_name(name: &str) -> String {
    title_case(&name.replace('-', " "))
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Substitutes `{name}` in a naming template.
pub fn render_template(template: &str, name: &str) -> String {
    template.replace("{name}", name)
}
