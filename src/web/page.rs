//! HTML rendering for the query page.

pub const PAGE_TITLE: &str = "Database Query Application";
pub const INPUT_LABEL: &str = "Enter your question:";

/// What to show below the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing submitted yet.
    Empty,
    Answered { question: String, result: String },
    Failed { question: String, error: String },
}

impl Outcome {
    fn question(&self) -> &str {
        match self {
            Outcome::Empty => "",
            Outcome::Answered { question, .. } | Outcome::Failed { question, .. } => question,
        }
    }
}

/// Escape text for use in element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the full page.
pub fn render(outcome: &Outcome) -> String {
    let body = match outcome {
        Outcome::Empty => String::new(),
        Outcome::Answered { question, result } => format!(
            "<section>\n<p>Question: {}</p>\n<pre>SQL Result: {}</pre>\n</section>\n",
            escape_html(question),
            escape_html(result)
        ),
        Outcome::Failed { question, error } => format!(
            "<section>\n<p>Question: {}</p>\n<p class=\"error\">Error: {}</p>\n</section>\n",
            escape_html(question),
            escape_html(error)
        ),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
input[type=text] {{ width: 100%; padding: 0.4rem; }}
pre {{ white-space: pre-wrap; }}
.error {{ color: #b00020; }}
</style>
</head>
<body>
<h1>{title}</h1>
<form method="get" action="/">
<label for="question">{label}</label>
<input type="text" id="question" name="question" value="{value}" autofocus>
<button type="submit">Submit</button>
</form>
{body}</body>
</html>
"#,
        title = PAGE_TITLE,
        label = INPUT_LABEL,
        value = escape_html(outcome.question()),
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_empty_page() {
        let html = render(&Outcome::Empty);
        assert!(html.contains("<title>Database Query Application</title>"));
        assert!(html.contains("Enter your question:"));
        assert!(!html.contains("Question:"));
        assert!(!html.contains("Error:"));
    }

    #[test]
    fn test_answered_page() {
        let html = render(&Outcome::Answered {
            question: "How many?".to_string(),
            result: "[(3,)]".to_string(),
        });
        assert!(html.contains("Question: How many?"));
        assert!(html.contains("SQL Result: [(3,)]"));
        assert!(html.contains(r#"value="How many?""#));
    }

    #[test]
    fn test_failed_page_escapes() {
        let html = render(&Outcome::Failed {
            question: "<script>".to_string(),
            error: "bad <thing>".to_string(),
        });
        assert!(html.contains("Question: &lt;script&gt;"));
        assert!(html.contains("Error: bad &lt;thing&gt;"));
        assert!(!html.contains("<script>"));
    }
}
