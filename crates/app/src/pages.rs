use axum::{extract::State, response::Html};
use metrics::counter;
use tera::{Context, Tera};
use tracing::error;

use crate::problem::ProblemResponse;
use crate::router::AppState;

const INDEX_TEMPLATE: &str = "index.html.tera";

/// Loads every template under `crates/app/templates`.
///
/// Tera only autoescapes `.html`-style suffixes by default, so the
/// `.html.tera` suffix is registered explicitly.
pub fn load_templates() -> Result<Tera, tera::Error> {
    let mut templates = Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))?;
    templates.autoescape_on(vec![".html.tera", ".html"]);
    Ok(templates)
}

/// `GET /`: server-rendered list of every cupcake plus the add form.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ProblemResponse> {
    let result = render_index(&state).await;
    let label = if result.is_ok() { "ok" } else { "error" };
    counter!("page_render_total", "result" => label).increment(1);
    result.map(Html)
}

async fn render_index(state: &AppState) -> Result<String, ProblemResponse> {
    let cupcakes = state.cupcakes().list_all().await.map_err(|err| {
        error!(stage = "page", error = %err, "failed to load cupcakes for listing");
        ProblemResponse::storage("failed to load cupcakes")
    })?;

    let mut ctx = Context::new();
    ctx.insert("cupcakes", &cupcakes);

    state
        .templates()
        .render(INDEX_TEMPLATE, &ctx)
        .map_err(|err| {
            error!(stage = "page", error = %err, "failed to render cupcake listing");
            ProblemResponse::template("failed to render cupcake listing")
        })
}
