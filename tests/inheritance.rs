//! End-to-end tests for layout inheritance through a live Handlebars registry

use std::fs;

use handlebars::Handlebars;
use hbs_inherit::{register, LayoutLoader};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

/// Build a registry with the inheritance helpers installed and the given
/// layouts written to a temp dir. Caching is off so every test sees its
/// own fixture files.
fn engine(layouts: &[(&str, &str)]) -> (Handlebars<'static>, TempDir) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    for (name, source) in layouts {
        fs::write(dir.path().join(format!("{name}.hbs")), source)
            .expect("Should write layout fixture");
    }
    let mut hb = Handlebars::new();
    register(&mut hb, LayoutLoader::new(dir.path()).with_cache_duration(0.0));
    (hb, dir)
}

#[test]
fn test_block_without_extends_renders_own_body() {
    let (hb, _dir) = engine(&[]);
    let html = hb
        .render_template(r#"{{#block "content"}}fallback{{/block}}"#, &json!({}))
        .expect("Should render");
    assert_eq!(html, "fallback");
}

#[test]
fn test_block_requires_name() {
    let (hb, _dir) = engine(&[]);
    let result = hb.render_template("{{#block}}anonymous{{/block}}", &json!({}));
    assert!(result.is_err());
}

#[test]
fn test_extends_missing_layout_fails() {
    let (hb, _dir) = engine(&[]);
    let result = hb.render_template(r#"{{#extends "ghost"}}{{/extends}}"#, &json!({}));
    assert!(result.is_err());
}

#[test]
fn test_child_block_replaces_layout_default() {
    let (hb, _dir) = engine(&[("main", r#"<title>{{#block "title"}}Untitled{{/block}}</title>"#)]);
    let html = hb
        .render_template(
            r#"{{#extends "main"}}{{#block "title"}}Page A{{/block}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(html, "<title>Page A</title>");
}

#[test]
fn test_untouched_block_keeps_layout_default() {
    let (hb, _dir) = engine(&[("main", r#"<title>{{#block "title"}}Untitled{{/block}}</title>"#)]);
    let html = hb
        .render_template(r#"{{#extends "main"}}{{/extends}}"#, &json!({}))
        .expect("Should render");
    assert_eq!(html, "<title>Untitled</title>");
}

#[test]
fn test_append_concatenates_after_default() {
    let (hb, _dir) = engine(&[("frame", r#"[{{#block "x"}}B{{/block}}]"#)]);
    let html = hb
        .render_template(
            r#"{{#extends "frame"}}{{#append "x"}}A{{/append}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(html, "[BA]");
}

#[test]
fn test_prepend_concatenates_before_default() {
    let (hb, _dir) = engine(&[("frame", r#"[{{#block "x"}}B{{/block}}]"#)]);
    let html = hb
        .render_template(
            r#"{{#extends "frame"}}{{#prepend "x"}}A{{/prepend}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(html, "[AB]");
}

#[test]
fn test_mode_hash_matches_append_helper() {
    let (hb, _dir) = engine(&[("frame", r#"[{{#block "x"}}B{{/block}}]"#)]);
    let html = hb
        .render_template(
            r#"{{#extends "frame"}}{{#block "x" mode="append"}}A{{/block}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(html, "[BA]");
}

#[test]
fn test_unknown_merge_mode_is_error() {
    let (hb, _dir) = engine(&[("frame", r#"[{{#block "x"}}B{{/block}}]"#)]);
    let result = hb.render_template(
        r#"{{#extends "frame"}}{{#block "x" mode="merge"}}A{{/block}}{{/extends}}"#,
        &json!({}),
    );
    assert!(result.is_err());
}

#[test]
fn test_multiple_contributions_fold_in_reverse_declaration_order() {
    // The last-pushed contribution folds first, so the layout default
    // comes out first and the earliest child declaration lands last.
    let (hb, _dir) = engine(&[("frame", r#"[{{#block "x"}}B{{/block}}]"#)]);
    let html = hb
        .render_template(
            r#"{{#extends "frame"}}{{#append "x"}}A1{{/append}}{{#append "x"}}A2{{/append}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(html, "[BA2A1]");
}

#[test]
fn test_prepend_and_append_fold_around_default() {
    let (hb, _dir) = engine(&[("frame", r#"[{{#block "x"}}B{{/block}}]"#)]);
    let html = hb
        .render_template(
            r#"{{#extends "frame"}}{{#prepend "x"}}P{{/prepend}}{{#append "x"}}A{{/append}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(html, "[PBA]");
}

#[test]
fn test_extends_passes_data_context_to_layout_and_blocks() {
    let (hb, _dir) = engine(&[(
        "page",
        r#"<h1>{{title}}</h1><ul>{{#each pets}}<li>{{this}}</li>{{/each}}</ul><main>{{#block "content"}}{{/block}}</main>"#,
    )]);
    let html = hb
        .render_template(
            r#"{{#extends "page"}}{{#block "content"}}{{title}} has {{pets.[0]}}{{/block}}{{/extends}}"#,
            &json!({ "title": "Page A", "pets": ["cat", "dog"] }),
        )
        .expect("Should render");
    assert_eq!(
        html,
        "<h1>Page A</h1><ul><li>cat</li><li>dog</li></ul><main>Page A has cat</main>"
    );
}

#[test]
fn test_layout_filename_visible_to_layout() {
    let (hb, _dir) = engine(&[("base", r#"{{layout.filename}}|{{#block "t"}}x{{/block}}"#)]);
    let html = hb
        .render_template(r#"{{#extends "base"}}{{/extends}}"#, &json!({}))
        .expect("Should render");
    assert_eq!(html, "base.hbs|x");
}

#[test]
fn test_extends_without_name_uses_default_layout() {
    let (hb, _dir) = engine(&[("default", r#"d:{{#block "t"}}D{{/block}}"#)]);
    let html = hb
        .render_template(r#"{{#extends}}{{#block "t"}}T{{/block}}{{/extends}}"#, &json!({}))
        .expect("Should render");
    assert_eq!(html, "d:T");
}

#[test]
fn test_chained_inheritance_resolves_through_final_layout() {
    // page extends middle extends base; the middle's content override
    // re-declares an inner block that the page overrides in turn.
    let (hb, _dir) = engine(&[
        ("base", r#"<base>{{#block "content"}}base default{{/block}}</base>"#),
        (
            "middle",
            r#"{{#extends "base"}}{{#block "content"}}<mid>{{#block "inner"}}mid default{{/block}}</mid>{{/block}}{{/extends}}"#,
        ),
    ]);
    let html = hb
        .render_template(
            r#"{{#extends "middle"}}{{#block "inner"}}PAGE{{/block}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(html, "<base><mid>PAGE</mid></base>");
}

#[test]
fn test_child_can_fill_some_blocks_and_leave_others() {
    let (hb, _dir) = engine(&[(
        "columns",
        r#"<head>{{#block "head"}}{{/block}}</head><body>{{#block "body"}}fallback{{/block}}</body>"#,
    )]);
    let html = hb
        .render_template(
            r#"{{#extends "columns"}}{{#block "head"}}<meta/>{{/block}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(html, "<head><meta/></head><body>fallback</body>");
}

#[test]
fn test_block_output_is_not_reescaped() {
    let (hb, _dir) = engine(&[("main", r#"{{#block "t"}}{{/block}}"#)]);
    let html = hb
        .render_template(
            r#"{{#extends "main"}}{{#block "t"}}<b>bold &amp; raw</b>{{/block}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(html, "<b>bold &amp; raw</b>");
}

#[test]
fn test_rerender_is_idempotent() {
    // The child declares a block the layout never flushes; nothing may
    // leak into the second render.
    let (hb, _dir) = engine(&[("main", r#"<t>{{#block "title"}}U{{/block}}</t>"#)]);
    let page =
        r#"{{#extends "main"}}{{#block "title"}}T{{/block}}{{#block "orphan"}}O{{/block}}{{/extends}}"#;

    let first = hb.render_template(page, &json!({})).expect("Should render");
    let second = hb.render_template(page, &json!({})).expect("Should render");
    assert_eq!(first, "<t>T</t>");
    assert_eq!(first, second);
}

#[test]
fn test_unflushed_blocks_do_not_leak_into_later_renders() {
    let (hb, _dir) = engine(&[
        ("plain", "<p>no blocks here</p>"),
        ("orphanage", r#"<o>{{#block "orphan"}}default{{/block}}</o>"#),
    ]);

    let first = hb
        .render_template(
            r#"{{#extends "plain"}}{{#block "orphan"}}LEAK{{/block}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(first, "<p>no blocks here</p>");

    let second = hb
        .render_template(r#"{{#extends "orphanage"}}{{/extends}}"#, &json!({}))
        .expect("Should render");
    assert_eq!(second, "<o>default</o>");
}

#[test]
fn test_parallel_renders_do_not_interleave() {
    let (hb, _dir) = engine(&[
        ("alpha", r#"A[{{#block "x"}}a{{/block}}]"#),
        ("beta", r#"B[{{#block "x"}}b{{/block}}]"#),
    ]);
    let hb = &hb;

    std::thread::scope(|scope| {
        for (layout, fill, expected) in
            [("alpha", "one", "A[one]"), ("beta", "two", "B[two]")]
        {
            scope.spawn(move || {
                let page = format!(
                    r#"{{{{#extends "{layout}"}}}}{{{{#block "x"}}}}{fill}{{{{/block}}}}{{{{/extends}}}}"#
                );
                for _ in 0..50 {
                    let html = hb
                        .render_template(&page, &json!({}))
                        .expect("Should render");
                    assert_eq!(html, expected);
                }
            });
        }
    });
}

#[test]
fn test_broken_layout_error_passes_through() {
    let (hb, _dir) = engine(&[("broken", r#"{{#block "x"}}{{/block"#)]);
    let result = hb.render_template(r#"{{#extends "broken"}}{{/extends}}"#, &json!({}));
    assert!(result.is_err());
}

#[test]
fn test_full_page_scenario() {
    let (hb, _dir) = engine(&[(
        "layout",
        r#"<!DOCTYPE html><html><head><title>{{#block "title"}}Untitled{{/block}}</title></head><body><main>{{#block "content"}}{{/block}}</main></body></html>"#,
    )]);
    let html = hb
        .render_template(
            r#"{{#extends "layout"}}{{#block "title"}}Page A{{/block}}{{/extends}}"#,
            &json!({}),
        )
        .expect("Should render");
    assert_eq!(
        html,
        "<!DOCTYPE html><html><head><title>Page A</title></head><body><main></main></body></html>"
    );
}
