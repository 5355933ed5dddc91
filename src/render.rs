// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # SSR 渲染管线模块
//!
//! 驱动一个应用实例走完一次请求的渲染状态机：
//! store 预取 → 路由导航 → 错误注入 → 布局解析 → 标记生成（至多一次
//! 纠错性重渲染）→ 头部重置 → 文档组装。
//!
//! 顶层入口 `render_ssr` 额外负责：缓存查询与写入（错误结果绝不写入）、
//! 把第 1~5 阶段抛出的异常包装为统一的内部渲染错误并以错误模式重入管线
//! 一次。纠错渲染自身再失败即视为该请求不可恢复，异常上抛给宿主服务器。

use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, warn};
use serde_json::json;

use crate::app::AppInstance;
use crate::cache::{self, RenderCache, Ttl};
use crate::exception::{Exception, RenderError};
use crate::request::Request;
use crate::router::resolve_layout;
use crate::scripts;
use crate::view::render_to_string;
use crate::assemble::assemble;

/// 一次渲染的最终产物：HTTP 状态码与组装完成的 HTML
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub status: u16,
    pub html: String,
}

/// 推导本次请求的缓存键（URL + 语言 + 主题 + 设备类别）
pub fn request_cache_key(app: &AppInstance, url: &str) -> String {
    cache::cache_key(url, app.language(), app.theme(), app.device())
}

/// 渲染状态机：产出组装完成的 HTML 文档。
///
/// `error` 为 `Some` 表示以错误模式重入（跳过导航，直接注入错误）。
/// 本函数返回 `Err` 即"管线抛出了异常"，由调用方决定是否纠错重入。
pub async fn render_html(
    app: &mut AppInstance,
    url: &str,
    shell: &str,
    error: Option<RenderError>,
    id: u128,
) -> Result<String, Exception> {
    // 1. store 预取：必须在导航前完成或失败
    app.store.server_init().await?;
    debug!("[ID{}]store预取阶段完成", id);

    // 2. 路由导航。错误模式下跳过，避免重复触发导航副作用
    if error.is_none() {
        if let Err(navigation_error) = app.router.push(url) {
            // 导航错误不抛出，记录到UI状态由错误视图呈现
            debug!("[ID{}]导航错误：{}", id, navigation_error);
            app.ui_state.set_render_error(navigation_error);
        }
    }

    // 3. 错误注入：上游提供的错误在生成标记前写入UI状态
    if let Some(upstream_error) = error {
        app.ui_state.set_render_error(upstream_error);
    }

    // 4. 布局解析
    let layout = resolve_layout(app.router.current().meta());
    app.ui_state.set_layout(layout);

    // 5. 标记生成。生成前没有错误而生成后出现（迟到的渲染期失败），
    //    则重新渲染一次，使输出反映错误状态。上限恰好一次，不是重试循环
    let pre_render_error = app.ui_state.render_error().is_some();
    let mut app_html = render_to_string(app);
    if !pre_render_error && app.ui_state.render_error().is_some() {
        debug!("[ID{}]标记生成后发现迟到错误，执行单次纠错性重渲染", id);
        app_html = render_to_string(app);
    }

    // 6. 头部重置：错误页不得泄漏成功路径残留的title/description
    if app.ui_state.render_error().is_some() {
        app.helmet.reset();
    }

    // 7. 组装：正文 + 头部片段 + 两份脚本负载
    let store_payload = scripts::serialize(app.store.state());
    let context_payload = scripts::serialize(&json!({
        "url": url,
        "theme": app.theme().to_string(),
        "globalState": app.ui_state.to_raw_state(),
    }));

    let head = app.helmet.html();
    let footer = [
        format!("<script>{}</script>", scripts::store_script(&store_payload)),
        format!(
            "<script>{}</script>",
            scripts::context_script(&context_payload)
        ),
    ]
    .join("\n");

    Ok(assemble(shell, &head, &app_html, &footer))
}

/// 顶层渲染入口：应用工厂 → 缓存 → 管线 → 错误包装。
pub async fn render_ssr(
    request: &Request,
    shell: &str,
    cache: &Arc<Mutex<RenderCache>>,
    id: u128,
) -> Result<RenderOutcome, Exception> {
    let app = AppInstance::from_request(request);
    render_ssr_app(app, request.path(), shell, cache, id).await
}

/// 以外部构建好的应用实例执行顶层渲染（测试用它注入定制的数据源）。
pub async fn render_ssr_app(
    mut app: AppInstance,
    url: &str,
    shell: &str,
    cache: &Arc<Mutex<RenderCache>>,
    id: u128,
) -> Result<RenderOutcome, Exception> {
    let cache_key = request_cache_key(&app, url);

    // 缓存命中直接返回，管线不再执行
    {
        let mut cache_lock = match cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("[ID{}]渲染缓存锁被污染，恢复并继续", id);
                poisoned.into_inner()
            }
        };
        if let Some(html) = cache_lock.find(&cache_key, Instant::now()) {
            debug!("[ID{}]渲染缓存命中：{}", id, cache_key);
            return Ok(RenderOutcome { status: 200, html });
        }
    }

    match render_html(&mut app, url, shell, None, id).await {
        Ok(html) => {
            if let Some(error) = app.ui_state.render_error() {
                // 错误页：状态码取自错误，绝不写入缓存
                debug!("[ID{}]渲染产生错误页：{}", id, error);
                Ok(RenderOutcome {
                    status: error.code,
                    html,
                })
            } else {
                let is_static = app.router.current().meta().is_static;
                let ttl = if is_static { Ttl::Unlimited } else { Ttl::Default };
                let mut cache_lock = match cache.lock() {
                    Ok(lock) => lock,
                    Err(poisoned) => {
                        warn!("[ID{}]渲染缓存锁被污染，恢复并继续", id);
                        poisoned.into_inner()
                    }
                };
                cache_lock.push(&cache_key, html.clone(), ttl, Instant::now());
                debug!(
                    "[ID{}]渲染缓存写入：{}（static={}）",
                    id, cache_key, is_static
                );
                Ok(RenderOutcome { status: 200, html })
            }
        }
        Err(unknown_error) => {
            // 未知异常：归一化为固定内部错误码，消息保留用于诊断
            let error = RenderError::internal(unknown_error.to_string());
            let status = error.code;
            warn!("[ID{}]渲染管线异常，以错误模式重入：{}", id, error);
            // 纠错性重渲染若再失败，该请求不可恢复，异常原样上抛
            let html = render_html(&mut app, url, shell, Some(error), id).await?;
            Ok(RenderOutcome { status, html })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentSource;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn shell() -> &'static str {
        r#"<html><head><title>x</title></head><body><div id="app"></div></body></html>"#
    }

    fn request_at(url: &str) -> Request {
        let raw = format!("GET {} HTTP/1.1\r\nHost: x\r\n\r\n", url);
        Request::try_from(&raw.as_bytes().to_vec(), 0).unwrap()
    }

    fn new_cache() -> Arc<Mutex<RenderCache>> {
        Arc::new(Mutex::new(RenderCache::new(64, Duration::from_secs(60))))
    }

    /// 第N次调用之前一直失败的数据源
    struct FlakySource {
        calls: AtomicUsize,
        fail_times: usize,
    }

    impl ContentSource for FlakySource {
        fn load(&self) -> Result<Value, String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                Err("fixture store exploded".to_string())
            } else {
                crate::store::FixtureContent.load()
            }
        }
    }

    #[tokio::test]
    async fn test_success_render_returns_200_and_caches() {
        let cache = new_cache();
        let outcome = render_ssr(&request_at("/"), shell(), &cache, 0)
            .await
            .unwrap();

        assert_eq!(outcome.status, 200);
        assert!(outcome.html.contains("data-server-rendered"));
        assert!(outcome.html.contains("__INIT_STORE__"));
        assert!(outcome.html.contains("__SSR_CONTEXT__"));
        assert_eq!(cache.lock().unwrap().len(), 1);
    }

    /// 缓存命中必须返回逐字节相同的HTML
    #[tokio::test]
    async fn test_cache_hit_returns_identical_html() {
        let cache = new_cache();
        let first = render_ssr(&request_at("/"), shell(), &cache, 0)
            .await
            .unwrap();
        let second = render_ssr(&request_at("/"), shell(), &cache, 1)
            .await
            .unwrap();

        assert_eq!(first.html, second.html);
        assert_eq!(cache.lock().unwrap().len(), 1);
    }

    /// 导航404：状态码404、头部重置、缓存保持未写入
    #[tokio::test]
    async fn test_navigation_error_not_cached() {
        let cache = new_cache();
        let outcome = render_ssr(&request_at("/no/such/page"), shell(), &cache, 0)
            .await
            .unwrap();

        assert_eq!(outcome.status, 404);
        // 头部已重置为站点默认title
        assert!(outcome.html.contains("<title>Shaneyale 的博客</title>"));
        assert!(outcome.html.contains("error-page"));
        assert!(cache.lock().unwrap().is_empty());
    }

    /// 迟到的渲染期404经过单次纠错重渲染后输出错误视图
    #[tokio::test]
    async fn test_late_render_error_corrected_once() {
        let cache = new_cache();
        let outcome = render_ssr(&request_at("/post/9999"), shell(), &cache, 0)
            .await
            .unwrap();

        assert_eq!(outcome.status, 404);
        assert!(outcome.html.contains("error-page"));
        assert!(!outcome.html.contains("skeleton"));
        assert!(cache.lock().unwrap().is_empty());
    }

    /// 预取抛出：归一化为500，纠错渲染成功并返回完整错误页
    #[tokio::test]
    async fn test_prefetch_failure_recovered_by_error_render() {
        let cache = new_cache();
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            fail_times: 1,
        });
        let app = AppInstance::with_source(&request_at("/"), source);

        let outcome = render_ssr_app(app, "/", shell(), &cache, 0).await.unwrap();

        assert_eq!(outcome.status, 500);
        assert!(outcome.html.contains("error-page"));
        assert!(outcome.html.contains("fixture store exploded"));
        assert!(cache.lock().unwrap().is_empty());
    }

    /// 纠错渲染自身再失败：请求不可恢复，异常上抛
    #[tokio::test]
    async fn test_second_failure_is_fatal() {
        let cache = new_cache();
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            fail_times: 2,
        });
        let app = AppInstance::with_source(&request_at("/"), source);

        let result = render_ssr_app(app, "/", shell(), &cache, 0).await;

        assert!(result.is_err());
        assert!(cache.lock().unwrap().is_empty());
    }

    /// 静态路由以无限TTL写入
    #[tokio::test]
    async fn test_static_route_cached_unlimited() {
        let cache = new_cache();
        let outcome = render_ssr(&request_at("/about"), shell(), &cache, 0)
            .await
            .unwrap();
        assert_eq!(outcome.status, 200);

        // 远超默认TTL后仍然命中
        let app = AppInstance::from_request(&request_at("/about"));
        let key = request_cache_key(&app, "/about");
        let far_future = Instant::now() + Duration::from_secs(3600 * 24);
        assert!(cache.lock().unwrap().find(&key, far_future).is_some());
    }

    /// 缓存键包含全部渲染相关维度
    #[tokio::test]
    async fn test_cache_key_scenario() {
        let raw = "GET /post/42 HTTP/1.1\r\nHost: x\r\nUser-Agent: Mobile\r\nCookie: theme=dark\r\n\r\n";
        let request = Request::try_from(&raw.as_bytes().to_vec(), 0).unwrap();
        let app = AppInstance::from_request(&request);

        assert_eq!(
            request_cache_key(&app, request.path()),
            "/post/42-en-dark-mobile"
        );
    }

    /// 渲染幂等：同一(实例构造, URL)两次渲染产出等价HTML
    #[tokio::test]
    async fn test_render_idempotent() {
        let first_cache = new_cache();
        let second_cache = new_cache();

        let a = render_ssr(&request_at("/post/42"), shell(), &first_cache, 0)
            .await
            .unwrap();
        let b = render_ssr(&request_at("/post/42"), shell(), &second_cache, 1)
            .await
            .unwrap();

        assert_eq!(a.html, b.html);
    }
}
