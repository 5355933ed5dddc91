// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Store 模块
//!
//! 每个应用实例持有一个 Store：保存预取得到的数据快照，并暴露一个
//! 异步初始化器 `server_init`，渲染管线必须在导航前等它完成（或失败）。
//!
//! 数据来源抽象为 `ContentSource`，默认实现是进程内的文章固定数据
//! （外部数据隧道不在本服务职责内）；测试通过注入失败的数据源来
//! 验证预取失败时管线的纠错行为。

use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;
use serde_json::{json, Value};

use crate::exception::Exception;

#[cfg(test)]
use mockall::automock;

/// Store 的内容来源。
///
/// `load` 返回完整的站点数据快照（文章、标签、站点信息）。
/// 失败以消息字符串表达，由 Store 包装为 `Exception::PrefetchFailed`。
#[cfg_attr(test, automock)]
pub trait ContentSource: Send + Sync {
    fn load(&self) -> Result<Value, String>;
}

lazy_static! {
    /// 进程内的站点数据。真实部署中这里是上游 API 的返回内容
    static ref SITE_CONTENT: Value = json!({
        "site": {
            "name": "Shaneyale 的博客",
            "author": "shaneyale",
        },
        "articles": [
            {
                "id": 1,
                "title": "用 Rust 重写博客服务端",
                "tags": ["rust", "web"],
                "description": "从 Node 迁移到 Rust 的记录",
                "content": "迁移的起因是想要一个更可控的 SSR 管线……"
            },
            {
                "id": 2,
                "title": "LRU 缓存与 TTL 的组合",
                "tags": ["rust", "cache"],
                "description": "渲染缓存的淘汰策略",
                "content": "条目数量交给 LRU 兜底，真正的淘汰来自 TTL……"
            },
            {
                "id": 42,
                "title": "服务端渲染的错误页",
                "tags": ["ssr"],
                "description": "错误也要渲染成完整页面",
                "content": "错误响应绝不能以裸文本返回……"
            }
        ],
        "tags": ["rust", "web", "cache", "ssr"]
    });
}

/// 默认内容源：返回进程内固定数据的克隆
pub struct FixtureContent;

impl ContentSource for FixtureContent {
    fn load(&self) -> Result<Value, String> {
        Ok(SITE_CONTENT.clone())
    }
}

/// 请求级数据容器
pub struct Store {
    state: Value,
    source: Arc<dyn ContentSource>,
}

impl Store {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            state: Value::Null,
            source,
        }
    }

    /// 异步预取初始化。
    ///
    /// 必须在路由导航之前完成；失败以 `Exception::PrefetchFailed` 形式
    /// 向管线抛出，触发顶层的错误包装与纠错性重渲染。
    pub async fn server_init(&mut self) -> Result<(), Exception> {
        match self.source.load() {
            Ok(state) => {
                debug!("store预取完成");
                self.state = state;
                Ok(())
            }
            Err(message) => Err(Exception::PrefetchFailed(message)),
        }
    }

    /// 当前状态快照（用于序列化注入）
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// 按ID查找文章
    pub fn article(&self, id: u32) -> Option<&Value> {
        self.state["articles"]
            .as_array()?
            .iter()
            .find(|article| article["id"] == id)
    }

    /// 全部文章
    pub fn articles(&self) -> Vec<&Value> {
        self.state["articles"]
            .as_array()
            .map(|list| list.iter().collect())
            .unwrap_or_default()
    }

    /// 按标签过滤文章
    pub fn articles_by_tag(&self, slug: &str) -> Vec<&Value> {
        self.articles()
            .into_iter()
            .filter(|article| {
                article["tags"]
                    .as_array()
                    .map(|tags| tags.iter().any(|tag| tag == slug))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// 站点名称
    pub fn site_name(&self) -> &str {
        self.state["site"]["name"].as_str().unwrap_or("")
    }
}
