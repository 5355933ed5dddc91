// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 应用工厂模块
//!
//! 每个进入的请求都会通过 `AppInstance::from_request` 获得一个完全隔离的
//! 应用实例：独立的路由器（内存历史）、独立的 Store、独立的 UI 状态容器。
//! 任何两个请求之间不共享可变状态，实例随响应发出后被丢弃。
//!
//! 本模块同时承载三个轻量服务：
//! - 主题服务：Cookie 键名与合法主题枚举；
//! - 语言解析：从 `Accept-Language` 推导受支持的语言；
//! - 设备识别：从 `User-Agent` 粗分 mobile/desktop。

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::exception::RenderError;
use crate::request::Request;
use crate::router::{Layout, Router};
use crate::store::{ContentSource, FixtureContent, Store};

/// 主题 Cookie 的键名，与客户端运行时约定一致
pub const THEME_STORAGE_KEY: &str = "theme";

/// 页面主题。Cookie 缺失或取值非法时回退到默认主题
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// 从 Cookie 原始值解析主题
    pub fn from_cookie(value: Option<&str>) -> Self {
        match value {
            Some("light") => Theme::Light,
            Some("dark") => Theme::Dark,
            _ => Theme::default(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Light
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// 站点支持的语言
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Language {
    En,
    Zh,
}

impl Language {
    /// 从 `Accept-Language` 标头推导语言。
    ///
    /// 只看首个语言标签的主子标签，受支持的是 en/zh，其余回退 en。
    pub fn from_accept_language(header: &str) -> Self {
        let primary = header
            .split(',')
            .next()
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        if primary.starts_with("zh") {
            Language::Zh
        } else {
            Language::En
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Language::En => write!(f, "en"),
            Language::Zh => write!(f, "zh"),
        }
    }
}

/// 设备类别，影响布局与缓存键
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

impl DeviceClass {
    /// 从 User-Agent 粗分设备。只求区分移动端与桌面端，不做精细解析
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        if ua.contains("mobile") || ua.contains("android") || ua.contains("iphone") {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DeviceClass::Mobile => write!(f, "mobile"),
            DeviceClass::Desktop => write!(f, "desktop"),
        }
    }
}

/// 头部元数据服务（helmet）。
///
/// 持有当前页面的 title/keywords/description，渲染错误页前必须 reset，
/// 避免成功路径上残留的元数据泄漏到错误页。
#[derive(Debug, Clone)]
pub struct Helmet {
    title: String,
    keywords: String,
    description: String,
}

impl Helmet {
    pub fn new() -> Self {
        Self {
            title: "Shaneyale 的博客".to_string(),
            keywords: "blog,rust,shaneyale".to_string(),
            description: "一个由 Rust 驱动的个人博客".to_string(),
        }
    }

    pub fn set(&mut self, title: &str, keywords: &str, description: &str) {
        self.title = title.to_string();
        self.keywords = keywords.to_string();
        self.description = description.to_string();
    }

    /// 恢复到站点默认元数据
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// 渲染为可直接插入 `<head>` 的标签片段
    pub fn html(&self) -> String {
        [
            format!("<title>{}</title>", self.title),
            format!(r#"<meta name="keywords" content="{}">"#, self.keywords),
            format!(r#"<meta name="description" content="{}">"#, self.description),
        ]
        .join("\n")
    }
}

impl Default for Helmet {
    fn default() -> Self {
        Self::new()
    }
}

/// 请求级 UI 状态容器。
///
/// 渲染管线在各阶段前后读写这里的标志位：当前渲染错误、已解析的布局。
/// "响应式"在服务端被简化为在既定检查点上的显式读取与比较。
#[derive(Debug, Clone)]
pub struct UiState {
    render_error: Option<RenderError>,
    layout: Layout,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            render_error: None,
            layout: Layout::Normal,
        }
    }

    pub fn set_render_error(&mut self, error: RenderError) {
        self.render_error = Some(error);
    }

    pub fn render_error(&self) -> Option<&RenderError> {
        self.render_error.as_ref()
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// 导出给客户端引导脚本的原始状态快照
    pub fn to_raw_state(&self) -> Value {
        json!({
            "layout": self.layout.to_string(),
            "renderError": match &self.render_error {
                Some(error) => json!({ "code": error.code, "message": error.message }),
                None => Value::Null,
            },
        })
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

/// 一次请求对应的应用实例聚合。
///
/// 不变式：每个在途请求恰好持有一个实例，响应发出后即丢弃；
/// 没有实例池，也没有任何跨请求的可变共享。
pub struct AppInstance {
    pub router: Router,
    pub store: Store,
    pub ui_state: UiState,
    pub helmet: Helmet,
    theme: Theme,
    language: Language,
    device: DeviceClass,
}

impl AppInstance {
    /// 应用工厂入口：由请求头与主题 Cookie 构建全新实例。
    ///
    /// 构建本身是廉价且同步的，所有异步工作（预取）推迟到渲染管线第一阶段。
    pub fn from_request(request: &Request) -> Self {
        Self::with_source(request, Arc::new(FixtureContent))
    }

    /// 以指定内容源构建实例。测试用它注入会失败的数据源
    pub fn with_source(request: &Request, source: Arc<dyn ContentSource>) -> Self {
        let theme = Theme::from_cookie(request.cookie(THEME_STORAGE_KEY));
        let language = Language::from_accept_language(request.accept_language());
        let device = DeviceClass::from_user_agent(request.user_agent());
        Self {
            router: Router::new(),
            store: Store::new(source),
            ui_state: UiState::new(),
            helmet: Helmet::new(),
            theme,
            language,
            device,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn device(&self) -> DeviceClass {
        self.device
    }
}
