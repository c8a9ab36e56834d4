//! Server-rendered HTML for the browser-facing routes.

use crate::table::ComponentSummary;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; color: #222; }
nav { background: #26a69a; padding: 0.8rem 1.5rem; }
nav a { color: #fff; margin-right: 1.2rem; text-decoration: none; }
main { padding: 1.5rem; max-width: 72rem; }
.error { background: #ffebee; border-left: 4px solid #c62828; padding: 0.6rem 1rem; }
.component { border-bottom: 1px solid #ddd; padding: 0.8rem 0; }
.words { font-family: monospace; white-space: pre-wrap; font-size: 0.85rem; }
table.centered td, table.centered th { text-align: center; padding: 0.2rem 0.5rem; }
table.striped tr:nth-child(even) { background: #f2f2f2; }
"#;

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} | PCA Explorer</title>
    <style>{STYLE}</style>
</head>
<body>
    <nav>
        <a href="/">Home</a>
        <a href="/upload">Upload</a>
        <a href="/browse">Browse</a>
        <a href="/about">About</a>
    </nav>
    <main>
{body}
    </main>
</body>
</html>"#,
        title = escape_html(title),
    )
}

pub fn index_page() -> String {
    layout(
        "Home",
        r#"<h1>PCA Explorer</h1>
<p>Upload a text file to vectorize it and see which terms rank highest and
lowest on each of the first eight principal components.</p>
<p><a href="/upload">Upload a file</a> or <a href="/browse">browse earlier results</a>.</p>
<h2>Re-run in the background</h2>
<form id="longtask">
    <input name="filename" placeholder="previously uploaded file name">
    <button type="submit">Start</button>
</form>
<pre id="progress"></pre>
<script>
document.getElementById('longtask').addEventListener('submit', async (event) => {
    event.preventDefault();
    const out = document.getElementById('progress');
    const response = await fetch('/longtask', { method: 'POST', body: new URLSearchParams(new FormData(event.target)) });
    if (response.status !== 202) { out.textContent = await response.text(); return; }
    const statusUrl = response.headers.get('Location');
    const poll = async () => {
        const status = await (await fetch(statusUrl)).json();
        out.textContent = status.state + ': ' + status.status;
        if (status.state !== 'SUCCESS' && status.state !== 'FAILURE') { setTimeout(poll, 1000); }
    };
    poll();
});
</script>"#,
    )
}

pub fn upload_page(error: Option<&str>) -> String {
    let error = error
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();
    layout(
        "Upload",
        &format!(
            r#"<h1>Upload</h1>
{error}
<form method="post" action="/upload" enctype="multipart/form-data">
    <input type="file" name="file">
    <button type="submit">Analyze</button>
</form>"#
        ),
    )
}

pub fn components_page(title: &str, components: &[ComponentSummary]) -> String {
    let mut sections = String::new();
    for component in components {
        sections.push_str(&format!(
            r#"<section class="component">
    <h2>{name}</h2>
    <h3>Top</h3>
    <p class="words">{top}</p>
    <h3>Bottom</h3>
    <p class="words">{bottom}</p>
</section>
"#,
            name = escape_html(&component.name),
            top = escape_html(&component.top),
            bottom = escape_html(&component.bottom),
        ));
    }
    layout(title, &format!("<h1>{}</h1>\n{sections}", escape_html(title)))
}

pub fn browse_page(files: &[String]) -> String {
    let mut items = String::new();
    for file in files {
        let name = escape_html(file);
        let entry = if file.ends_with(".csv") {
            format!(r#"<a href="/results/{name}">{name}</a>"#)
        } else if file.ends_with(".html") {
            format!(r##"<a href="#" data-table="{name}">{name}</a>"##)
        } else {
            name
        };
        items.push_str(&format!("    <li>{entry}</li>\n"));
    }
    if items.is_empty() {
        items.push_str("    <li>No results yet.</li>\n");
    }

    layout(
        "Browse",
        &format!(
            r#"<h1>Results</h1>
<ul>
{items}</ul>
<h2>First rows</h2>
<div id="thead"></div>
<h2>Last rows</h2>
<div id="ttail"></div>
<script>
document.querySelectorAll('a[data-table]').forEach((link) => {{
    link.addEventListener('click', async (event) => {{
        event.preventDefault();
        const body = new URLSearchParams({{ filename: link.dataset.table }});
        const response = await fetch('/ajax', {{ method: 'POST', body }});
        const views = await response.json();
        document.getElementById('thead').innerHTML = views.thead || views.message;
        document.getElementById('ttail').innerHTML = views.ttail || '';
    }});
}});
</script>"#
        ),
    )
}

pub fn about_page() -> String {
    layout(
        "About",
        r#"<h1>About</h1>
<p>Uploads are vectorized and reduced with principal component analysis by an
external routine. Each component lists the 200 highest ranked rows followed by
the 200 lowest, lowest first.</p>
<p>Results are stored as CSV and HTML next to each other in the results
directory and can be reopened from the browse page.</p>"#,
    )
}

pub fn error_page(title: &str, message: &str) -> String {
    layout(
        title,
        &format!(
            r#"<h1>{}</h1>
<p class="error">{}</p>"#,
            escape_html(title),
            escape_html(message)
        ),
    )
}
