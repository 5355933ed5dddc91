use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::app::{DeviceClass, Language, Theme};

/// 缓存条目的生存期策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ttl {
    /// 普通页面：使用缓存构造时配置的默认过期窗口
    Default,
    /// 静态路由页面：永不过期，直到进程重启或显式清空
    Unlimited,
}

#[derive(Clone)]
struct CacheEntry {
    html: String,
    // None 表示无限期保留
    expires_at: Option<Instant>,
}

/// SSR 渲染结果缓存。
///
/// 键是 URL、语言、主题、设备类别的组合指纹；值是完整组装好的 HTML。
/// 过期判定所用的时间点由调用方传入，测试中可以用确定性的时钟推进。
pub struct RenderCache {
    cache: LruCache<String, CacheEntry>,
    default_ttl: Duration,
}

/// 由渲染相关维度推导缓存键。
///
/// 纯函数：相同输入必须永远得到相同的键，这是缓存命中正确性的前提。
pub fn cache_key(url: &str, language: Language, theme: Theme, device: DeviceClass) -> String {
    format!("{}-{}-{}-{}", url, language, theme, device)
}

impl RenderCache {
    // 根据容量与默认TTL构造
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        if capacity == 0 {
            panic!("调用new时指定的容量是0。如果需要自动设置容量，请在调用处进行处理，而不是传入0");
        }
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
            default_ttl,
        }
    }

    // 放入。错误页面绝不允许写入，由调用方保证
    pub fn push(&mut self, key: &str, html: String, ttl: Ttl, now: Instant) {
        let expires_at = match ttl {
            Ttl::Default => Some(now + self.default_ttl),
            Ttl::Unlimited => None,
        };
        let entry = CacheEntry { html, expires_at };
        self.cache.put(key.to_string(), entry);
    }

    // 查询有效缓存，过期条目顺手摘除
    pub fn find(&mut self, key: &str, now: Instant) -> Option<String> {
        let expired = match self.cache.get(key) {
            Some(entry) => match entry.expires_at {
                Some(deadline) => now >= deadline,
                None => false,
            },
            None => return None,
        };
        if expired {
            self.cache.pop(key);
            return None;
        }
        self.cache.get(key).map(|entry| entry.html.clone())
    }

    // 显式失效：清空全部条目（控制台purge指令）
    pub fn purge(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
