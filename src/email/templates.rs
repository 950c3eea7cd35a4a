use std::sync::LazyLock;

use askama::Template;
use regex::Regex;

use super::OutgoingMail;

#[derive(Template)]
#[template(path = "email/confirm.html")]
struct ConfirmTemplate<'a> {
    confirm_url: &'a str,
    app_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/admin_new_subscriber.html")]
struct AdminNoticeTemplate<'a> {
    email: &'a str,
    confirmed_count: i64,
}

#[derive(Template)]
#[template(path = "email/newsletter.html")]
struct NewsletterTemplate<'a> {
    subject: &'a str,
    content: &'a str,
    unsubscribe_url: &'a str,
    preferences_url: &'a str,
    app_url: &'a str,
}

pub fn confirmation(to: &str, confirm_url: &str, app_url: &str) -> Result<OutgoingMail, askama::Error> {
    let html = ConfirmTemplate { confirm_url, app_url }.render()?;
    Ok(OutgoingMail {
        to: to.to_string(),
        subject: "Confirm your newsletter subscription".to_string(),
        text: html_to_text(&html),
        html,
    })
}

pub fn admin_new_subscriber(
    to: &str,
    email: &str,
    confirmed_count: i64,
) -> Result<OutgoingMail, askama::Error> {
    let html = AdminNoticeTemplate { email, confirmed_count }.render()?;
    Ok(OutgoingMail {
        to: to.to_string(),
        subject: format!("New newsletter subscriber: {email}"),
        text: html_to_text(&html),
        html,
    })
}

/// Wrap a newsletter body with the recipient's management links.
pub fn newsletter(
    to: &str,
    subject: &str,
    content: &str,
    unsubscribe_url: &str,
    preferences_url: &str,
    app_url: &str,
) -> Result<OutgoingMail, askama::Error> {
    let html = NewsletterTemplate {
        subject,
        content,
        unsubscribe_url,
        preferences_url,
        app_url,
    }
    .render()?;
    Ok(OutgoingMail {
        to: to.to_string(),
        subject: subject.to_string(),
        text: html_to_text(&html),
        html,
    })
}

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<a\s[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).unwrap());
static BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(br\s*/?|/p|/h[1-6]|/li|/div|/tr)>").unwrap());
static HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(head|style)[^>]*>.*?</(head|style)>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());

/// Plain-text alternative for an HTML body. Links keep their target.
pub fn html_to_text(html: &str) -> String {
    let text = HEAD_RE.replace_all(html, "");
    let text = LINK_RE.replace_all(&text, "$2 ($1)");
    let text = BLOCK_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    BLANK_LINES_RE
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_alternative_keeps_link_targets() {
        let text = html_to_text(
            r#"<html><head><style>p { color: red; }</style></head><body>
               <h2>New project</h2><p>Built with <b>Rust</b> &amp; Postgres.</p>
               <a href="https://example.com/p/1">View project</a></body></html>"#,
        );
        assert!(text.contains("New project"));
        assert!(text.contains("Built with Rust & Postgres."));
        assert!(text.contains("View project (https://example.com/p/1)"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn newsletter_footer_carries_management_links() {
        let mail = newsletter(
            "a@example.com",
            "Hello",
            "<p>Body</p>",
            "https://site.test/newsletter/unsubscribe?token=abc",
            "https://site.test/newsletter/preferences?token=abc",
            "https://site.test",
        )
        .unwrap();
        assert!(mail.html.contains("<p>Body</p>"));
        assert!(mail.html.contains("https://site.test/newsletter/unsubscribe?token=abc"));
        assert!(mail.text.contains("https://site.test/newsletter/preferences?token=abc"));
    }

    #[test]
    fn confirmation_links_to_confirm_endpoint() {
        let mail = confirmation(
            "a@example.com",
            "https://site.test/api/newsletter/confirm?token=xyz",
            "https://site.test",
        )
        .unwrap();
        assert_eq!(mail.to, "a@example.com");
        assert!(mail.html.contains("https://site.test/api/newsletter/confirm?token=xyz"));
    }
}
