// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 状态序列化模块
//!
//! 将进程内的结构化状态转换为可安全内嵌进 `<script>` 标签的字符串负载。
//! 状态可能包含经由预取进入的不可信内容（例如用户提交的评论），
//! 因此 HTML 敏感字符的转义是强制的。
//!
//! 每次渲染产出两份负载：
//! - store 负载：交给客户端运行时做水合（hydration）；
//! - SSR 上下文负载：URL、主题与派生的 UI 标志位，用于客户端引导。
//!
//! 非有限数值（Infinity 等）无法进入 JSON 数值模型，使用 `@num` 标记
//! 对象表示，序列化时输出裸 JS 数值字面量，反序列化时还原为标记对象。

use serde_json::{json, Map, Value};

/// 非有限数值的标记键
pub const NUM_MARKER: &str = "@num";

/// 把非有限的 f64 包装为可进入状态树的标记对象
pub fn non_finite(value: f64) -> Value {
    let token = if value.is_nan() {
        "NaN"
    } else if value > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    };
    json!({ NUM_MARKER: token })
}

fn as_non_finite_token(map: &Map<String, Value>) -> Option<&str> {
    if map.len() == 1 {
        map.get(NUM_MARKER).and_then(|token| token.as_str())
    } else {
        None
    }
}

/// 把状态值序列化为脚本安全的字符串负载。
///
/// 输出是合法的 JS 表达式：除 `@num` 标记产出的裸数值字面量外与 JSON 一致，
/// 字符串中的 `<` `>` `&` 与 U+2028/U+2029 一律转义为 `\uXXXX` 形式。
pub fn serialize(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&escape_string(s)),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            if let Some(token) = as_non_finite_token(map) {
                // 标记对象直接展开为裸 JS 数值字面量
                out.push_str(token);
                return;
            }
            out.push('{');
            for (index, (key, item)) in map.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&escape_string(key));
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

/// JSON 字符串转义之上追加 HTML 敏感字符的转义
fn escape_string(s: &str) -> String {
    // serde_json 对字符串的序列化不会失败
    let quoted = serde_json::to_string(s).unwrap();
    let mut out = String::with_capacity(quoted.len());
    for c in quoted.chars() {
        match c {
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}

/// 反序列化脚本负载，还原等价的结构化数据。
///
/// 裸露在字符串之外的 `Infinity` / `-Infinity` / `NaN` 字面量
/// 被还原为 `@num` 标记对象，其余部分按 JSON 解析。
pub fn deserialize(payload: &str) -> Result<Value, serde_json::Error> {
    let mut rewritten = String::with_capacity(payload.len());
    let mut chars = payload.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            rewritten.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                rewritten.push(c);
            }
            'I' => {
                consume_token(&mut chars, "nfinity");
                rewritten.push_str(&format!(r#"{{"{}":"Infinity"}}"#, NUM_MARKER));
            }
            'N' => {
                consume_token(&mut chars, "aN");
                rewritten.push_str(&format!(r#"{{"{}":"NaN"}}"#, NUM_MARKER));
            }
            '-' if chars.peek() == Some(&'I') => {
                consume_token(&mut chars, "Infinity");
                rewritten.push_str(&format!(r#"{{"{}":"-Infinity"}}"#, NUM_MARKER));
            }
            _ => rewritten.push(c),
        }
    }
    serde_json::from_str(&rewritten)
}

fn consume_token(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, rest: &str) {
    for expected in rest.chars() {
        // 不匹配时让后续的JSON解析报错，这里不自行造错误类型
        if chars.peek() == Some(&expected) {
            chars.next();
        }
    }
}

/// store 状态负载的注入脚本
pub fn store_script(payload: &str) -> String {
    format!("window.__INIT_STORE__ = {}", payload)
}

/// SSR 上下文负载的注入脚本
pub fn context_script(payload: &str) -> String {
    format!("window.__SSR_CONTEXT__ = {}", payload)
}
