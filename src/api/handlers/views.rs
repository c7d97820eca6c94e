//! Server-rendered HTML pages.

use std::fmt::Write;

use crate::store::Provider;

/// Escape text for use in HTML element content and quoted attributes.
pub(crate) fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape_html(title),
    )
}

fn provider_links() -> String {
    let mut links = String::new();
    for provider in Provider::ALL {
        let label = match provider {
            Provider::Google => "Google",
            Provider::Twitter => "Twitter",
        };
        let _ = writeln!(
            links,
            "<p><a href=\"/auth/{provider}\">Sign in with {label}</a></p>"
        );
    }
    links
}

fn credentials_form(action: &str, button: &str) -> String {
    format!(
        "<form action=\"{action}\" method=\"POST\">\n\
         <label>Username <input type=\"text\" name=\"username\" required></label>\n\
         <label>Password <input type=\"password\" name=\"password\" required></label>\n\
         <button type=\"submit\">{button}</button>\n</form>\n"
    )
}

pub(crate) fn home() -> String {
    layout(
        "Secrets",
        "<h1>Secrets</h1>\n<p>Don't keep your secrets, share them anonymously!</p>\n\
         <p><a href=\"/register\">Register</a> <a href=\"/login\">Login</a></p>\n",
    )
}

pub(crate) fn register() -> String {
    let body = format!(
        "<h1>Register</h1>\n{}{}",
        credentials_form("/register", "Register"),
        provider_links()
    );
    layout("Register", &body)
}

pub(crate) fn login() -> String {
    let body = format!(
        "<h1>Login</h1>\n{}{}",
        credentials_form("/login", "Login"),
        provider_links()
    );
    layout("Login", &body)
}

pub(crate) fn secrets<S: AsRef<str>>(secrets: &[S]) -> String {
    let mut body = String::from("<h1>You've Discovered My Secret!</h1>\n");
    for secret in secrets {
        let _ = writeln!(body, "<p class=\"secret-text\">{}</p>", escape_html(secret.as_ref()));
    }
    body.push_str("<p><a href=\"/logout\">Log Out</a> <a href=\"/submit\">Submit a Secret</a></p>\n");
    layout("Secrets", &body)
}

pub(crate) fn submit() -> String {
    layout(
        "Submit a Secret",
        "<h1>Secrets</h1>\n<p>Don't keep your secrets, share them anonymously!</p>\n\
         <form action=\"/submit\" method=\"POST\">\n\
         <input type=\"text\" name=\"secret\" placeholder=\"What's your secret?\" required>\n\
         <button type=\"submit\">Submit</button>\n</form>\n",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn secrets_page_escapes_every_entry() {
        let page = secrets(&["hello", "<b>bold</b>"]);
        assert!(page.contains("<p class=\"secret-text\">hello</p>"));
        assert!(page.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!page.contains("<b>bold</b>"));
    }

    #[test]
    fn auth_pages_link_every_provider() {
        for page in [register(), login()] {
            assert!(page.contains("href=\"/auth/google\""));
            assert!(page.contains("href=\"/auth/twitter\""));
        }
        assert!(login().contains("action=\"/login\""));
        assert!(register().contains("action=\"/register\""));
    }
}
