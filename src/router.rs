// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由模块
//!
//! 服务端路由器：基于内存历史（非浏览器历史）解析 URL 到路由表中的条目。
//! 路由元信息携带两项渲染相关的提示：
//! - 布局提示：由布局服务 `resolve_layout` 转换为布局标识；
//! - 静态标记：静态页面的渲染结果可以无限期缓存。
//!
//! 解析失败产生导航错误（404 路由未命中 / 400 参数校验失败），
//! 由渲染管线记录到 UI 状态，而不是沿调用栈抛出。

use std::fmt;

use crate::exception::RenderError;

/// 页面布局标识，由路由元信息推导
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Layout {
    /// 常规三栏布局
    Normal,
    /// 宽幅布局（列表页）
    Wide,
    /// 全屏布局（留言板等沉浸页面）
    Full,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Layout::Normal => write!(f, "normal"),
            Layout::Wide => write!(f, "wide"),
            Layout::Full => write!(f, "full"),
        }
    }
}

/// 路由元信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteMeta {
    pub layout: Layout,
    /// 静态页面标记：渲染输出不依赖请求期数据，缓存可无限期保留
    pub is_static: bool,
}

/// 布局服务：由路由元信息解析布局标识的纯函数
pub fn resolve_layout(meta: &RouteMeta) -> Layout {
    meta.layout
}

/// 路由表中的具名路由
#[derive(Debug, Clone, PartialEq)]
pub enum RouteName {
    /// 首页文章流
    Index,
    /// 文章详情页，携带数字文章 ID
    Post(u32),
    /// 标签聚合页
    Tag(String),
    /// 关于页（静态）
    About,
    /// 归档页（静态）
    Archive,
    /// 留言板
    Guestbook,
    /// 兜底路由：解析失败后落点
    NotFound,
}

/// 一次成功（或兜底）解析的结果
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    name: RouteName,
    path: String,
    meta: RouteMeta,
}

impl MatchedRoute {
    fn new(name: RouteName, path: &str, meta: RouteMeta) -> Self {
        Self {
            name,
            path: path.to_string(),
            meta,
        }
    }

    pub fn name(&self) -> &RouteName {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn meta(&self) -> &RouteMeta {
        &self.meta
    }
}

const META_NORMAL: RouteMeta = RouteMeta {
    layout: Layout::Normal,
    is_static: false,
};
const META_WIDE: RouteMeta = RouteMeta {
    layout: Layout::Wide,
    is_static: false,
};
const META_FULL: RouteMeta = RouteMeta {
    layout: Layout::Full,
    is_static: false,
};
const META_STATIC_NORMAL: RouteMeta = RouteMeta {
    layout: Layout::Normal,
    is_static: true,
};
const META_STATIC_WIDE: RouteMeta = RouteMeta {
    layout: Layout::Wide,
    is_static: true,
};

/// 服务端路由器。
///
/// 每个应用实例持有自己的一份，历史记录只存在于内存中，
/// 因此任何请求都无法观察到其它请求的路由状态。
pub struct Router {
    history: Vec<String>,
    current: MatchedRoute,
}

impl Router {
    pub fn new() -> Self {
        Self {
            history: vec![],
            // 尚未导航时停在首页路由上
            current: MatchedRoute::new(RouteName::Index, "/", META_NORMAL),
        }
    }

    /// 将目标 URL 推入内存历史并解析路由。
    ///
    /// 解析失败时当前路由落到兜底的 NotFound 条目，并返回导航错误，
    /// 以便管线将其记录到 UI 状态。
    pub fn push(&mut self, url: &str) -> Result<(), RenderError> {
        self.history.push(url.to_string());
        match resolve(url) {
            Ok(matched) => {
                self.current = matched;
                Ok(())
            }
            Err(error) => {
                self.current = MatchedRoute::new(RouteName::NotFound, url, META_NORMAL);
                Err(error)
            }
        }
    }

    /// 当前已解析的路由
    pub fn current(&self) -> &MatchedRoute {
        &self.current
    }

    #[cfg(test)]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// 按路由表解析 URL（查询串不参与匹配）
fn resolve(url: &str) -> Result<MatchedRoute, RenderError> {
    let path = url.split('?').next().unwrap_or(url);
    let trimmed = path.trim_end_matches('/');

    if path == "/" {
        return Ok(MatchedRoute::new(RouteName::Index, path, META_NORMAL));
    }

    if let Some(raw_id) = trimmed.strip_prefix("/post/") {
        // 文章ID必须是正整数，否则属于参数校验失败
        return match raw_id.parse::<u32>() {
            Ok(id) => Ok(MatchedRoute::new(RouteName::Post(id), path, META_NORMAL)),
            Err(_) => Err(RenderError::validation(&format!(
                "Invalid post id: {}",
                raw_id
            ))),
        };
    }

    if let Some(slug) = trimmed.strip_prefix("/tag/") {
        return Ok(MatchedRoute::new(
            RouteName::Tag(slug.to_string()),
            path,
            META_WIDE,
        ));
    }

    match trimmed {
        "/about" => Ok(MatchedRoute::new(
            RouteName::About,
            path,
            META_STATIC_NORMAL,
        )),
        "/archive" => Ok(MatchedRoute::new(
            RouteName::Archive,
            path,
            META_STATIC_WIDE,
        )),
        "/guestbook" => Ok(MatchedRoute::new(RouteName::Guestbook, path, META_FULL)),
        _ => Err(RenderError::not_found(url)),
    }
}
