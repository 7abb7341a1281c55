use ftlplay::{render, render_value, render_with_options, RenderOptions};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_assigned_list_with_index() {
    let template = r#"
<#assign items = ["A", "B", "C"]>
<#list items as item>
<div>${item} - ${item?index}</div>
</#list>
"#;
    let rendered = render_value(template, &json!({})).unwrap();
    assert_eq!(rendered, "<div>A - 0</div>\n<div>B - 1</div>\n<div>C - 2</div>");
}

#[test]
fn test_list_from_context() {
    let template = r#"
<ul>
<#list frutas as fruta>
  <li>${fruta}</li>
</#list>
</ul>
"#;
    let data = r#"{"frutas": ["manzana", "banana", "naranja"]}"#;
    let response = render(template, Some(data));
    assert_eq!(
        response.output(),
        Some("<ul>\n<li>manzana</li>\n<li>banana</li>\n<li>naranja</li>\n</ul>")
    );
}

#[test]
fn test_conditional_greeting() {
    let template = r#"
<#if usuario.edad >= 18>
  <p>¡Hola ${usuario.nombre}! Eres mayor de edad</p>
<#else>
  <p>¡Hola ${usuario.nombre}! Eres menor de edad</p>
</#if>
"#;
    let adult = json!({"usuario": {"nombre": "Ana", "edad": 30}});
    assert_eq!(
        render_value(template, &adult).unwrap(),
        "<p>¡Hola Ana! Eres mayor de edad</p>"
    );

    let minor = json!({"usuario": {"nombre": "Luis", "edad": "15"}});
    assert_eq!(
        render_value(template, &minor).unwrap(),
        "<p>¡Hola Luis! Eres menor de edad</p>"
    );
}

#[test]
fn test_first_middle_last() {
    let template = r#"
<#list items as item>
<#if item?index == 0>first: ${item}<#elseif item?index == items?size - 1>last: ${item}<#else>middle: ${item}</#if>
</#list>
"#;
    let data = json!({"items": ["a", "b", "c"]});
    assert_eq!(
        render_value(template, &data).unwrap(),
        "first: a\nmiddle: b\nlast: c"
    );
}

#[test]
fn test_nested_loops_see_outer_variables() {
    let template = "<#list rows as row><#list row.cells as cell>${row.id}${cell}</#list></#list>";
    let data = json!({
        "rows": [
            {"id": "r1", "cells": [1, 2]},
            {"id": "r2", "cells": [3]},
        ]
    });
    assert_eq!(render_value(template, &data).unwrap(), "r11\nr12\nr23");
}

#[test]
fn test_nested_conditionals() {
    let template = r#"
<#if user.admin>
  <#if user.active>A!<#else>A?</#if>
<#elseif user.name??>
  <#if user.name == "Bea">B<#else>other</#if>
<#else>
  C
</#if>
"#;
    let cases = [
        (json!({"user": {"admin": true, "active": true}}), "A!"),
        (json!({"user": {"admin": true, "active": false}}), "A?"),
        (json!({"user": {"admin": false, "name": "Bea"}}), "B"),
        (json!({"user": {"name": "Ciro"}}), "other"),
        (json!({"user": {}}), "C"),
    ];
    for (data, expected) in cases {
        assert_eq!(render_value(template, &data).unwrap(), expected, "{data}");
    }
}

#[test]
fn test_price_threshold() {
    let template = r#"
<#if producto.precio > 500>
  Producto premium: ${producto.nombre?upper_case}
<#elseif producto.precio gte 100>
  Producto estándar
<#else>
  Oferta
</#if>
"#;
    let cases = [(750, "Producto premium: LAPTOP"), (100, "Producto estándar"), (20, "Oferta")];
    for (precio, expected) in cases {
        let data = json!({"producto": {"nombre": "laptop", "precio": precio}});
        assert_eq!(render_value(template, &data).unwrap(), expected, "precio = {precio}");
    }
}

#[test]
fn test_invoice_totals() {
    let template = r#"
<#list lineas as l>
${l.nombre}: ${(l.precio * l.cantidad)?string["0.00"]}
</#list>
Descuento: ${descuento * 100}%
"#;
    let data = json!({
        "lineas": [
            {"nombre": "Café", "precio": 9.75, "cantidad": 2},
            {"nombre": "Té", "precio": "3.5", "cantidad": 3},
        ],
        "descuento": 0.25,
    });
    assert_eq!(
        render_value(template, &data).unwrap(),
        "Café: 19.50\nTé: 10.50\nDescuento: 25%"
    );
}

#[test]
fn test_has_content_guards_empty_sequences() {
    let template = "<#if tags?has_content>tags: ${tags?join(\", \")}<#else>no tags</#if>";
    assert_eq!(render_value(template, &json!({"tags": []})).unwrap(), "no tags");
    assert_eq!(render_value(template, &json!({})).unwrap(), "no tags");
    assert_eq!(
        render_value(template, &json!({"tags": ["rust", "ftl"]})).unwrap(),
        "tags: rust, ftl"
    );
}

#[test]
fn test_positional_condition_skips_first() {
    let template = r#"<#list ["a", "b", "c"] as x><#if x?index gte 1>${x}</#if></#list>"#;
    assert_eq!(render_value(template, &json!({})).unwrap(), "b\nc");
}

#[test]
fn test_loop_builtins() {
    let template = r#"<#list ["a", "b"] as x>${x?counter}${x?has_next?string("y", "n")}${x?is_last?string("!", "")}</#list>"#;
    assert_eq!(render_value(template, &json!({})).unwrap(), "1y\n2n!");
}

#[test]
fn test_legacy_loop_variables() {
    let template = "<#list xs as x>${x_index}:${x_has_next?string(\"more\", \"end\")}</#list>";
    assert_eq!(
        render_value(template, &json!({"xs": [5, 6]})).unwrap(),
        "0:more\n1:end"
    );
}

#[test]
fn test_list_diagnostics() {
    assert_eq!(
        render_value("<#list missing as m>${m}</#list>", &json!({})).unwrap(),
        "[Array not found or invalid: missing]"
    );
    assert_eq!(
        render_value("<#list name as c>${c}</#list>", &json!({"name": "abc"})).unwrap(),
        "[Array not found or invalid: name]"
    );
    assert_eq!(
        render_value("<#list [1, 2,, 3] as n>${n}</#list>", &json!({})).unwrap(),
        "[Error parsing array: [1, 2,, 3]]"
    );
}

#[test]
fn test_empty_list_and_else() {
    assert_eq!(render_value("<#list xs as x>${x}</#list>", &json!({"xs": []})).unwrap(), "");
    assert_eq!(
        render_value("<#list xs as x>${x}<#else>nothing here</#list>", &json!({"xs": []})).unwrap(),
        "nothing here"
    );
}

#[test]
fn test_boolean_connectives() {
    let template = r#"<#if a?? && (b == "x" || !c)>yes<#else>no</#if>"#;
    assert_eq!(render_value(template, &json!({"a": 1, "b": "x", "c": true})).unwrap(), "yes");
    assert_eq!(render_value(template, &json!({"a": 1, "b": "y", "c": false})).unwrap(), "yes");
    assert_eq!(render_value(template, &json!({"a": 1, "b": "y", "c": true})).unwrap(), "no");
    assert_eq!(render_value(template, &json!({"b": "x"})).unwrap(), "no");
}

#[test]
fn test_undefined_condition_is_false() {
    let template = "<#if user.profile.verified>ok<#else>unverified</#if>";
    assert_eq!(render_value(template, &json!({"user": {}})).unwrap(), "unverified");
}

#[test]
fn test_custom_loop_separator() {
    let options = RenderOptions::default().with_loop_separator(", ");
    let response = render_with_options("<#list [1, 2, 3] as n>${n}</#list>", None, &options);
    assert_eq!(response.output(), Some("1, 2, 3"));
}

#[test]
fn test_iteration_limit_fails_the_call() {
    let options = RenderOptions::default().with_max_loop_iterations(2);
    let response = render_with_options("<#list [1, 2, 3] as n>${n}</#list>", None, &options);
    assert!(!response.is_success());
}

#[test]
fn test_liferay_snippet_degrades_gracefully() {
    let template = r#"
<#assign journalArticleId = .vars['reserved-article-id'].data />
<#assign title = "Noticias">
<h1>${title}</h1>
<p>${journalArticleId}</p>
"#;
    assert_eq!(
        render_value(template, &json!({})).unwrap(),
        "<h1>Noticias</h1>\n<p>[Undefined: journalArticleId]</p>"
    );
}
