//! Server-rendered status page. Plain HTML with a meta refresh; no scripts.

use castkeeper_core::status::StatusView;
use std::fmt::Write;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

pub fn status_page(view: &StatusView, refresh_seconds: u64) -> String {
    let mut body = String::new();

    let _ = write!(
        body,
        r#"<div class="status" style="background:{}">{}</div>"#,
        view.color.css(),
        escape(&view.text)
    );

    match &view.candidate {
        Some(c) => {
            let _ = write!(
                body,
                r#"<h1>{}</h1><p class="when">{} Uhr"#,
                escape(&c.title),
                c.starts_at.format("%d.%m.%Y %H:%M")
            );
            if !c.location.is_empty() {
                let _ = write!(body, " &middot; {}", escape(&c.location));
            }
            body.push_str("</p>");
            if !c.watch_url.is_empty() {
                let url = escape(&c.watch_url);
                let _ = write!(body, r#"<p><a href="{url}">{url}</a></p>"#);
            }
        }
        None => body.push_str("<h1>&nbsp;</h1>"),
    }

    body.push_str("<table>");
    let scene = view.scene.as_deref().unwrap_or("unreachable");
    row(&mut body, "Scene", scene);
    row(&mut body, "Camera", view.camera.text());
    row(&mut body, "Remote", &view.remote.to_string());
    if let Some(worker) = &view.worker {
        let mut line = worker.health.to_string();
        if let Some(next) = &worker.next_broadcast {
            let _ = write!(
                line,
                ", next: {} {} {}",
                next.date.format("%d.%m."),
                next.time.format("%H:%M"),
                next.title
            );
        }
        row(&mut body, "Worker", &line);
    }
    if let Some(until) = view.error_window_until {
        row(&mut body, "Holding until", &until.format("%H:%M").to_string());
    }
    body.push_str("</table>");

    format!(
        r#"<!DOCTYPE html>
<html lang="de">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh_seconds}">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>castkeeper: {title}</title>
<style>
body {{ font-family: "Segoe UI", sans-serif; margin: 2rem; background: #111; color: #eee; }}
.status {{ font-size: 2.5rem; font-weight: bold; padding: 1rem 1.5rem; border-radius: .5rem; color: #fff; }}
.when {{ color: #aaa; }}
a {{ color: #7fb3ff; }}
td {{ padding: .2rem 1rem .2rem 0; }}
footer {{ margin-top: 2rem; color: #666; font-size: .8rem; }}
</style>
</head>
<body>
{body}
<footer>updated {updated}</footer>
</body>
</html>
"#,
        title = escape(&view.text),
        updated = view.generated_at.format("%H:%M:%S"),
    )
}

fn row(out: &mut String, label: &str, value: &str) {
    let _ = write!(out, "<tr><td>{label}</td><td>{}</td></tr>", escape(value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use castkeeper_core::status::{CandidateView, StatusColor};

    fn view() -> StatusView {
        let mut v = StatusView::starting("2026-10-19T09:50:00".parse().unwrap());
        v.text = "starting in 5 minutes".into();
        v.color = StatusColor::Informational;
        v.candidate = Some(CandidateView {
            title: "Hochamt <Kirchweih>".into(),
            starts_at: "2026-10-19T10:00:00".parse().unwrap(),
            location: "St. Gisela".into(),
            watch_url: "https://youtube.com/live/abc".into(),
            broadcast_id: Some("abc".into()),
        });
        v
    }

    #[test]
    fn page_has_refresh_and_status() {
        let html = status_page(&view(), 10);
        assert!(html.contains(r#"<meta http-equiv="refresh" content="10">"#));
        assert!(html.contains("starting in 5 minutes"));
        assert!(html.contains("19.10.2026 10:00 Uhr"));
        assert!(html.contains("automatic mode"));
    }

    #[test]
    fn titles_are_escaped() {
        let html = status_page(&view(), 10);
        assert!(html.contains("Hochamt &lt;Kirchweih&gt;"));
        assert!(!html.contains("<Kirchweih>"));
    }

    #[test]
    fn escape_handles_quotes() {
        assert_eq!(escape(r#"a"b'c&"#), "a&quot;b&#39;c&amp;");
    }
}
