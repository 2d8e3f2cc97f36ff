//! Heuristic classifier for script-shell pages.
//!
//! Decides whether raw HTML is a client-side shell whose listing content
//! only exists after scripts run. The predicate errs toward rendering; a
//! false positive costs one headless round-trip, a false negative costs the
//! whole board.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

/// Well-known SPA mount points.
static MOUNT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "#__next",
        "#root",
        "#app",
        "[data-reactroot]",
        "[ng-app]",
        ".search-results-app",
        "[data-buycard-app]",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("static selector"))
    .collect()
});

static SPINNER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".app-loading-spinner").expect("static selector"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("static selector"));
static MAIN_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("main").expect("static selector"));

const JS_HINT_STRINGS: &[&str] = &[
    "enable javascript",
    "turn on javascript",
    "requires javascript",
    "needs javascript",
    "please enable cookies",
    "disabled scripts",
];

fn visible_text_len(el: ElementRef<'_>) -> usize {
    el.text().map(|t| t.trim().len()).sum()
}

/// True when the HTML needs a headless render before extraction.
pub fn looks_js_shell(html: &str) -> bool {
    if html.trim().is_empty() {
        return true;
    }

    let doc = Html::parse_document(html);

    let mut real_nodes = 0usize;
    let mut scripts = 0usize;
    for el in doc.root_element().descendants().filter_map(ElementRef::wrap) {
        match el.value().name() {
            "script" => scripts += 1,
            "style" => {}
            _ => real_nodes += 1,
        }
    }

    // Tiny shell: almost no markup but several scripts.
    if real_nodes < 15 && scripts >= 3 {
        return true;
    }

    let body = doc.select(&BODY_SELECTOR).next();
    if let Some(body) = body {
        let text = body
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        if JS_HINT_STRINGS.iter().any(|h| text.contains(h)) {
            return true;
        }
    }

    if MOUNT_SELECTORS.iter().any(|s| doc.select(s).next().is_some()) {
        return true;
    }

    // Dense DOM, low visible text: hydration placeholder markup.
    let content_root = doc.select(&MAIN_SELECTOR).next().or(body);
    let text_len = content_root.map(visible_text_len).unwrap_or(0);
    if real_nodes > 200 && text_len < 800 && scripts >= 3 {
        return true;
    }

    doc.select(&SPINNER_SELECTOR).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_tiny_shells_need_rendering() {
        assert!(looks_js_shell(""));
        assert!(looks_js_shell(
            "<html><head><script></script><script></script><script></script></head>\
             <body><div id=\"x\"></div></body></html>"
        ));
    }

    #[test]
    fn mount_points_and_hints_need_rendering() {
        assert!(looks_js_shell(
            "<html><body><div id=\"root\"></div><p>hi</p><p>there</p><p>a</p><p>b</p>\
             <p>c</p><p>d</p><p>e</p><p>f</p><p>g</p><p>h</p><p>i</p><p>j</p></body></html>"
        ));
        assert!(looks_js_shell(
            "<html><body><p>Please enable JavaScript to view this site.</p>\
             <p>1</p><p>2</p><p>3</p><p>4</p><p>5</p><p>6</p><p>7</p><p>8</p>\
             <p>9</p><p>10</p><p>11</p><p>12</p></body></html>"
        ));
    }

    #[test]
    fn static_content_passes() {
        let html = format!(
            "<html><body><ul>{}</ul></body></html>",
            (0..20)
                .map(|i| format!("<li><a href=\"/jobs/{i}\">Engineer role number {i}</a></li>"))
                .collect::<String>()
        );
        assert!(!looks_js_shell(&html));
    }
}
