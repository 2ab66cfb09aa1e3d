//! Informational HTML pages served on `/` and `/config`.

use lazy_static::lazy_static;
use tera::{Context, Tera};

pub const DOCS_URL: &str = "https://github.com/prometheus-community/jiralert#readme";

const PAGE: &str = r#"<html>
<head>
  <title>JIRAlert</title>
  <style type="text/css">
    body { margin: 0; font-family: "Helvetica Neue", Helvetica, Arial, sans-serif; font-size: 14px; line-height: 1.42857143; color: #333; background-color: #fff; }
    .navbar { display: flex; background-color: #222; margin: 0; border-width: 0 0 1px; border-style: solid; border-color: #080808; }
    .navbar > * { margin: 0; padding: 15px; }
    .navbar * { line-height: 20px; color: #9d9d9d; }
    .navbar a { text-decoration: none; }
    .navbar a:hover, .navbar a:focus { color: #fff; }
    .navbar-header { font-size: 18px; }
    body > * { margin: 15px; padding: 0; }
    pre { padding: 10px; font-size: 13px; background-color: #f5f5f5; border: 1px solid #ccc; }
    h1, h2 { font-weight: 500; }
    a { color: #337ab7; }
  </style>
</head>
<body>
  <div class="navbar">
    <div class="navbar-header"><a href="/">JIRAlert</a></div>
    <div><a href="/config">Configuration</a></div>
    <div><a href="/metrics">Metrics</a></div>
    <div><a href="{{ docs_url | safe }}">Help</a></div>
  </div>
  {% block content %}{% endblock content %}
</body>
</html>
"#;

const HOME: &str = r#"{% extends "page.html" %}
{% block content %}
<p>This is <a href="{{ docs_url | safe }}">JIRAlert</a>, a
  <a href="https://prometheus.io/docs/alerting/latest/configuration/#webhook_config">webhook receiver</a> for
  <a href="https://prometheus.io/docs/alerting/latest/alertmanager/">Prometheus Alertmanager</a>.</p>
{% endblock content %}
"#;

const CONFIG: &str = r#"{% extends "page.html" %}
{% block content %}
<h2>Configuration</h2>
<pre>{{ config }}</pre>
{% endblock content %}
"#;

lazy_static! {
    static ref PAGES: Tera = {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("page.html", PAGE),
            ("home.html", HOME),
            ("config.html", CONFIG),
        ])
        .expect("built-in page templates must parse");
        tera
    };
}

pub fn home() -> tera::Result<String> {
    let mut context = Context::new();
    context.insert("docs_url", DOCS_URL);
    PAGES.render("home.html", &context)
}

/// `config` is HTML-escaped on render.
pub fn config(config: &str) -> tera::Result<String> {
    let mut context = Context::new();
    context.insert("docs_url", DOCS_URL);
    context.insert("config", config);
    PAGES.render("config.html", &context)
}
