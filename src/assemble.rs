// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTML 组装模块
//!
//! 纯字符串变换：把生成的正文标记、头部元数据片段与脚本负载
//! 拼接进静态页面外壳（SPA 的 index.html）。
//!
//! 外壳约定恰好包含一个 `<head>` 起始标签、一个挂载元素
//! `<div id="app">`、一个 `</body>` 结束标签——组装只触碰这三个锚点。
//! 外壳不合法时输出未定义（这是外壳模板的约束，不做校验层）。

use lazy_static::lazy_static;
use regex::Regex;

/// 客户端应用的挂载元素锚点
pub const MOUNT_POINT: &str = r#"<div id="app">"#;

/// 标记该挂载元素已在服务端渲染完成，客户端据此走水合而非重建
pub const SSR_MARK: &str = r#"<div id="app" data-server-rendered="true">"#;

lazy_static! {
    // 移除外壳自带的title，头部片段里会带上渲染期的title
    static ref TITLE_TAG: Regex = Regex::new(r"<title>[\s\S]*?</title>").unwrap();
}

/// 组装完整文档。
///
/// 1. 删除外壳中既有的 `<title>` 标签；
/// 2. 在 `<head>` 之后插入头部元数据片段；
/// 3. 将正文标记写入挂载元素并打上服务端渲染标记；
/// 4. 在 `</body>` 之前追加脚注脚本。
pub fn assemble(shell: &str, head: &str, markup: &str, footer: &str) -> String {
    TITLE_TAG
        .replace(shell, "")
        .replacen("<head>", &format!("<head>\n{}", head), 1)
        .replacen(MOUNT_POINT, &format!("{}{}", SSR_MARK, markup), 1)
        .replacen("</body>", &format!("{}\n</body>", footer), 1)
}
