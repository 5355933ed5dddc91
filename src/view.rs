// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 视图模块
//!
//! 把应用实例的当前状态（路由、Store 数据、UI 状态）渲染为正文标记字符串。
//! 这是渲染管线的第五阶段使用的"组件树"：没有客户端框架，
//! 视图就是按路由分派的 HTML 生成函数。
//!
//! 渲染期发现的迟到错误（路由成功解析但数据缺失，如不存在的文章 ID）
//! 通过写入 UI 状态上报；管线据此执行单次纠错性重渲染。

use crate::app::AppInstance;
use crate::exception::RenderError;
use crate::router::RouteName;

/// 把应用树渲染为正文标记字符串。
///
/// UI 状态中已有渲染错误时输出错误视图；否则按当前路由分派。
/// 本函数可能向 UI 状态写入迟到错误，调用方需要在调用前后比较错误标志。
pub fn render_to_string(app: &mut AppInstance) -> String {
    if let Some(error) = app.ui_state.render_error() {
        let body = render_error_view(error);
        return wrap_layout(app, &body);
    }

    let route = app.router.current().name().clone();
    let body = match route {
        RouteName::Index => render_index(app),
        RouteName::Post(id) => match render_post(app, id) {
            Some(markup) => markup,
            None => {
                // 迟到的渲染期404：路由存在但文章缺失
                app.ui_state.set_render_error(RenderError {
                    code: 404,
                    message: format!("Article {} not found", id),
                });
                render_skeleton()
            }
        },
        RouteName::Tag(slug) => render_tag(app, &slug),
        RouteName::About => render_about(app),
        RouteName::Archive => render_archive(app),
        RouteName::Guestbook => render_guestbook(app),
        RouteName::NotFound => render_skeleton(),
    };
    wrap_layout(app, &body)
}

/// 布局容器：携带布局/主题/设备/语言的标识类名
fn wrap_layout(app: &AppInstance, body: &str) -> String {
    format!(
        r#"<div class="layout layout-{} theme-{} device-{} lang-{}">{}</div>"#,
        app.ui_state.layout(),
        app.theme(),
        app.device(),
        app.language(),
        body
    )
}

fn render_error_view(error: &RenderError) -> String {
    format!(
        r#"<div class="error-page"><h1>{}</h1><p>{}</p></div>"#,
        error.code,
        escape_html(&error.message)
    )
}

fn render_index(app: &mut AppInstance) -> String {
    app.helmet.set(
        app.store.site_name(),
        "blog,rust,shaneyale",
        "一个由 Rust 驱动的个人博客",
    );
    let mut items = String::new();
    for article in app.store.articles() {
        items.push_str(&format!(
            r#"<li><a href="/post/{}">{}</a><span>{}</span></li>"#,
            article["id"],
            escape_html(article["title"].as_str().unwrap_or("")),
            escape_html(article["description"].as_str().unwrap_or("")),
        ));
    }
    format!(r#"<ul class="article-list">{}</ul>"#, items)
}

fn render_post(app: &mut AppInstance, id: u32) -> Option<String> {
    let (title, description, tags, content) = {
        let article = app.store.article(id)?;
        (
            article["title"].as_str().unwrap_or("").to_string(),
            article["description"].as_str().unwrap_or("").to_string(),
            article["tags"]
                .as_array()
                .map(|tags| {
                    tags.iter()
                        .filter_map(|tag| tag.as_str())
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default(),
            article["content"].as_str().unwrap_or("").to_string(),
        )
    };
    app.helmet.set(&title, &tags, &description);
    Some(format!(
        r#"<article class="post"><h1>{}</h1><div class="content">{}</div></article>"#,
        escape_html(&title),
        escape_html(&content)
    ))
}

fn render_tag(app: &mut AppInstance, slug: &str) -> String {
    app.helmet.set(
        &format!("标签：{}", slug),
        slug,
        &format!("标签 {} 下的全部文章", slug),
    );
    let mut items = String::new();
    for article in app.store.articles_by_tag(slug) {
        items.push_str(&format!(
            r#"<li><a href="/post/{}">{}</a></li>"#,
            article["id"],
            escape_html(article["title"].as_str().unwrap_or("")),
        ));
    }
    format!(
        r#"<div class="tag-page"><h1>{}</h1><ul>{}</ul></div>"#,
        escape_html(slug),
        items
    )
}

fn render_about(app: &mut AppInstance) -> String {
    app.helmet.set("关于", "about,shaneyale", "关于本站与站长");
    r#"<section class="about"><h1>关于</h1><p>shaneyale 的个人博客，服务端由 Rust 编写。</p></section>"#
        .to_string()
}

fn render_archive(app: &mut AppInstance) -> String {
    app.helmet.set("归档", "archive", "全部文章归档");
    let mut items = String::new();
    for article in app.store.articles() {
        items.push_str(&format!(
            r#"<li>#{} {}</li>"#,
            article["id"],
            escape_html(article["title"].as_str().unwrap_or("")),
        ));
    }
    format!(r#"<section class="archive"><ul>{}</ul></section>"#, items)
}

fn render_guestbook(app: &mut AppInstance) -> String {
    app.helmet.set("留言板", "guestbook", "给站长留言");
    // 评论组件在客户端水合后挂载，这里只输出占位容器
    r#"<section class="guestbook"><div id="comment-box"></div></section>"#.to_string()
}

/// 出错前的占位骨架，纠错性重渲染会用错误视图替换它
fn render_skeleton() -> String {
    r#"<div class="skeleton"></div>"#.to_string()
}

/// HTML 文本转义。错误消息等动态文本可能来自异常文本或用户输入
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
