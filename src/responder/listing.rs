//! Directory listing renderer module
//!
//! Pure rendering: given the requested path and the directory's entries,
//! produce the listing HTML. Deliberately minimal: no pagination, no
//! hidden-file filtering.

/// Render a directory listing page.
///
/// One `<li>` link per entry; directory names get a trailing slash.
pub fn render(request_path: &str, entries: &[(String, bool)]) -> String {
    let base = request_path.trim_matches('/');
    let title = if base.is_empty() {
        "Index of /".to_string()
    } else {
        format!("Index of /{base}")
    };

    let items: Vec<String> = entries
        .iter()
        .map(|(name, is_dir)| {
            let suffix = if *is_dir { "/" } else { "" };
            let href = if base.is_empty() {
                format!("/{name}")
            } else {
                format!("/{base}/{name}")
            };
            format!(
                "<li><a href=\"{}\">{}{suffix}</a></li>",
                escape_html(&href),
                escape_html(name)
            )
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>{title}</title>\n<style>\n\
         body {{ font-family: sans-serif; margin: 2rem; }}\n\
         h1 {{ margin-bottom: 1rem; }}\n\
         ul {{ list-style: none; padding: 0; }}\n\
         li {{ margin: 0.5rem 0; }}\n\
         a {{ text-decoration: none; color: #0366d6; }}\n\
         a:hover {{ text-decoration: underline; }}\n\
         </style>\n</head>\n<body>\n<h1>{title}</h1>\n<ul>\n{}\n</ul>\n</body>\n</html>\n",
        items.join("\n")
    )
}

/// Escape text for inclusion in HTML
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_li_per_entry() {
        let entries = vec![
            ("a.txt".to_string(), false),
            ("b.txt".to_string(), false),
            ("sub".to_string(), true),
        ];
        let html = render("docs", &entries);
        assert_eq!(html.matches("<li>").count(), 3);
        assert!(html.contains("Index of /docs"));
    }

    #[test]
    fn test_trailing_slash_on_directories() {
        let entries = vec![("sub".to_string(), true), ("file.txt".to_string(), false)];
        let html = render("", &entries);
        assert!(html.contains(">sub/</a>"));
        assert!(html.contains(">file.txt</a>"));
    }

    #[test]
    fn test_root_listing_links() {
        let entries = vec![("readme.md".to_string(), false)];
        let html = render("", &entries);
        assert!(html.contains("href=\"/readme.md\""));
        assert!(html.contains("Index of /"));
    }

    #[test]
    fn test_nested_listing_links() {
        let entries = vec![("img.png".to_string(), false)];
        let html = render("/assets/", &entries);
        assert!(html.contains("href=\"/assets/img.png\""));
    }

    #[test]
    fn test_names_are_escaped() {
        let entries = vec![("<script>.txt".to_string(), false)];
        let html = render("", &entries);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;.txt"));
    }
}
