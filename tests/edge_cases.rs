use ftlplay::{render, render_value, RenderResponse};
use pretty_assertions::assert_eq;
use serde_json::json;

fn out(template: &str, data: serde_json::Value) -> String {
    render_value(template, &data).expect("render should succeed")
}

// ── Markers ──

#[test]
fn plain_text_template_no_tags() {
    assert_eq!(out("  Hello, world!\n", json!({})), "Hello, world!");
}

#[test]
fn simple_substitution() {
    assert_eq!(out("Hello ${name}!", json!({"name": "World"})), "Hello World!");
}

#[test]
fn missing_variable_is_a_visible_diagnostic() {
    assert_eq!(out("${missing}", json!({})), "[Undefined: missing]");
}

#[test]
fn missing_path_segment_short_circuits() {
    let data = json!({"user": {"name": "Ana"}});
    assert_eq!(out("${user.address.city}", data.clone()), "[Undefined: user.address.city]");
    assert_eq!(out("${user.name}", data), "Ana");
}

#[test]
fn json_null_counts_as_missing() {
    assert_eq!(out("${a}", json!({"a": null})), "[Undefined: a]");
}

#[test]
fn marker_whitespace_is_ignored() {
    assert_eq!(out("${  name  }", json!({"name": "x"})), "x");
}

#[test]
fn sequence_index_access() {
    let data = json!({"xs": ["a", "b"], "h": {"k": 1}});
    assert_eq!(out("${xs[1]}${h['k']}", data.clone()), "b1");
    assert_eq!(out("${xs[5]}", data), "[Undefined: xs[5]]");
}

#[test]
fn unknown_builtin_is_undefined() {
    assert_eq!(out("${name?reverse}", json!({"name": "x"})), "[Undefined: name?reverse]");
}

#[test]
fn method_calls_are_not_supported() {
    assert_eq!(
        out("${themeDisplay.getLayout()}", json!({})),
        "[Undefined: themeDisplay.getLayout()]"
    );
}

#[test]
fn default_operator() {
    assert_eq!(out("${nick!'anon'}", json!({})), "anon");
    assert_eq!(out("${nick!'anon'}", json!({"nick": "z"})), "z");
    assert_eq!(out("[${nick!}]", json!({})), "[]");
}

#[test]
fn special_characters_and_unicode_pass_through() {
    let data = json!({"content": "こんにちは <world> & \"friends\" 🌍"});
    assert_eq!(out("${content}", data), "こんにちは <world> & \"friends\" 🌍");
}

#[test]
fn comments_are_stripped() {
    assert_eq!(out("a<#-- ${hidden} -->b", json!({})), "ab");
}

// ── Arithmetic ──

#[test]
fn operator_precedence() {
    assert_eq!(out("${2 + 3 * 4}", json!({})), "14");
    assert_eq!(out("${(2 + 3) * 4}", json!({})), "20");
    assert_eq!(out("${10 - 4 - 3}", json!({})), "3");
    assert_eq!(out("${7 / 2}", json!({})), "3.5");
    assert_eq!(out("${-x + 1}", json!({"x": 3})), "-2");
}

#[test]
fn identifiers_resolve_inside_arithmetic() {
    let data = json!({"descuento": 0.25, "order": {"qty": "4"}});
    assert_eq!(out("${descuento * 100}%", data.clone()), "25%");
    assert_eq!(out("${order.qty * 2}", data), "8");
}

#[test]
fn non_numeric_operands_reject_the_expression() {
    assert_eq!(
        out("${a + \"x\"}", json!({"a": 1})),
        "[Error in expression: a + \"x\"]"
    );
    assert_eq!(out("${nope * 2}", json!({})), "[Error in expression: nope * 2]");
    assert_eq!(out("${flag + 1}", json!({"flag": true})), "[Error in expression: flag + 1]");
}

#[test]
fn division_by_zero_is_an_error_marker() {
    assert_eq!(out("${1 / 0}", json!({})), "[Error in expression: 1 / 0]");
}

#[test]
fn injection_attempts_never_evaluate() {
    let data = json!({"a": 1});
    for body in [
        "a; process.exit(1)",
        "constructor.constructor(\"return 1\")()",
        "`id`",
        "1 + {}",
        "a + [1]",
    ] {
        let rendered = out(&format!("${{{body}}}"), data.clone());
        assert!(
            rendered.starts_with("[Undefined: ") || rendered.starts_with("[Error in expression: "),
            "{body:?} rendered as {rendered:?}"
        );
    }
}

// ── Built-ins ──

#[test]
fn builtin_suffixes() {
    let data = json!({
        "nombre": "juan pérez",
        "items": ["a", "b", "c"],
        "total": 12.99,
        "texto": "  hola  ",
    });
    assert_eq!(out("${nombre?upper_case}", data.clone()), "JUAN PÉREZ");
    assert_eq!(out("${nombre?cap_first}", data.clone()), "Juan pérez");
    assert_eq!(out("${nombre?capitalize}", data.clone()), "Juan Pérez");
    assert_eq!(out("${items?size}", data.clone()), "3");
    assert_eq!(out("${total?int}", data.clone()), "12");
    assert_eq!(out("${total?round}", data.clone()), "13");
    assert_eq!(out("[${texto?trim}]", data.clone()), "[hola]");
    assert_eq!(out("${items?join(\" | \")}", data.clone()), "a | b | c");
    assert_eq!(out("${items?first}${items?last}", data), "ac");
}

#[test]
fn size_of_missing_value_is_zero() {
    assert_eq!(out("${nothing?size}", json!({})), "0");
}

#[test]
fn two_decimal_formatting() {
    assert_eq!(out("${price?string[\"0.00\"]}", json!({"price": 19.5})), "19.50");
    assert_eq!(out("${price?string(\"0.00\")}", json!({"price": 3})), "3.00");
    assert_eq!(out("${p?string[\"0.00\"]}", json!({"p": "19.5"})), "19.50");
    assert_eq!(out("${(p * 1)?string[\"0.00\"]}", json!({"p": "19.5"})), "19.50");
}

#[test]
fn formatting_applies_to_the_whole_expression() {
    let data = json!({"price": 9.75, "qty": 2});
    assert_eq!(out("${(price * qty)?string[\"0.00\"]}", data.clone()), "19.50");
    assert_eq!(out("${price * qty?string[\"0.00\"]}", data.clone()), "19.50");
    assert_eq!(out("${price * qty?int}", data), "19");
}

#[test]
fn boolean_string_choice() {
    assert_eq!(out("${on?string(\"yes\", \"no\")}", json!({"on": false})), "no");
}

// ── Assignments ──

#[test]
fn local_assignment_shadows_context() {
    assert_eq!(out("<#assign x = \"local\">${x}", json!({"x": "ctx"})), "local");
}

#[test]
fn assignment_produces_no_output() {
    assert_eq!(out("a<#assign n = 1>b", json!({})), "ab");
}

#[test]
fn non_literal_assignment_is_dropped() {
    assert_eq!(
        out("<#assign layout = themeDisplay.getLayout() />[${layout}]", json!({})),
        "[[Undefined: layout]]"
    );
}

#[test]
fn assignment_literal_kinds() {
    let template = r#"<#assign s = 'q'><#assign n = 2.5><#assign b = true><#assign xs = [1, "two", [3]]>${s} ${n} ${b} ${xs?size}"#;
    assert_eq!(out(template, json!({})), "q 2.5 true 3");
}

// ── Whole-call behavior ──

#[test]
fn invalid_json_is_reported_before_rendering() {
    let response = render("${x}", Some("{\"x\": "));
    assert_eq!(
        response,
        RenderResponse::Failed {
            error: "Datos JSON inválidos".into()
        }
    );
}

#[test]
fn missing_data_is_an_empty_context() {
    assert_eq!(render("ok", None).output(), Some("ok"));
}

#[test]
fn broken_block_structure_renders_as_text() {
    assert_eq!(render("<#if x>never closed", None).output(), Some("<#if x>never closed"));
    assert_eq!(
        render("a</#if> <#else>b", None).output(),
        Some("a</#if> <#else>b")
    );
    assert_eq!(
        render("<#list [1, 2] as n>${n}", None).output(),
        Some("<#list [1, 2] as n>[Undefined: n]")
    );
}

#[test]
fn unclosed_inner_block_keeps_the_outer_one() {
    let template = "<#list [1, 2] as n><#if n == 1>one${n}</#list>";
    assert_eq!(out(template, json!({})), "<#if n == 1>one1\n<#if n == 1>one2");
}

#[test]
fn deeply_nested_expressions_degrade_to_undefined() {
    let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
    let rendered = render(&format!("${{{parens}}}"), None);
    assert_eq!(rendered.output(), Some(format!("[Undefined: {parens}]").as_str()));

    let negations = format!("{}1", "-".repeat(10_000));
    let rendered = render(&format!("${{{negations}}}"), None);
    assert_eq!(rendered.output(), Some(format!("[Undefined: {negations}]").as_str()));

    let bangs = format!("<#if {}x>yes<#else>no</#if>", "!".repeat(10_000));
    assert_eq!(render(&bangs, Some(r#"{"x": true}"#)).output(), Some("no"));
}

#[test]
fn long_operator_chains_degrade_to_undefined() {
    let chain = vec!["1"; 10_000].join(" + ");
    let rendered = render(&format!("${{{chain}}}"), None);
    assert_eq!(rendered.output(), Some(format!("[Undefined: {chain}]").as_str()));
    assert_eq!(out("${1 + 1 + 1 + 1}", json!({})), "4");
}

#[test]
fn unsupported_directives_pass_through() {
    assert_eq!(
        out("<#include \"/footer.ftl\">", json!({})),
        "<#include \"/footer.ftl\">"
    );
}
