//! 端到端渲染测试：用真实的页面外壳走完整条管线（应用工厂 → 渲染 →
//! 组装 → 缓存 → 响应构建），不经过TCP层。

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use blog_bff::render::{self, render_ssr};
use blog_bff::{AppInstance, RenderCache, Request};

/// 与运行时使用的同一份SPA外壳
const SHELL: &str = include_str!("../static/index.html");

fn request_from(raw: &str) -> Request {
    Request::try_from(&raw.as_bytes().to_vec(), 0).unwrap()
}

fn request_at(url: &str) -> Request {
    request_from(&format!("GET {} HTTP/1.1\r\nHost: localhost:7878\r\n\r\n", url))
}

fn new_cache() -> Arc<Mutex<RenderCache>> {
    Arc::new(Mutex::new(RenderCache::new(64, Duration::from_secs(60))))
}

#[cfg(test)]
mod render_tests {
    use super::*;

    /// 首页：完整文档结构正确，外壳资源引用原样保留
    #[tokio::test]
    async fn test_index_document_structure() {
        let cache = new_cache();
        let outcome = render_ssr(&request_at("/"), SHELL, &cache, 0).await.unwrap();

        assert_eq!(outcome.status, 200);
        assert!(outcome.html.starts_with("<!DOCTYPE html>"));
        // 外壳自带的title被移除，最终文档只有渲染期的一个title
        assert_eq!(outcome.html.matches("<title>").count(), 1);
        // 挂载元素恰好打上一次服务端渲染标记
        assert_eq!(outcome.html.matches("data-server-rendered").count(), 1);
        assert!(outcome.html.contains("article-list"));
        // 两份脚本负载都在</body>之前
        let store_pos = outcome.html.find("__INIT_STORE__").unwrap();
        let context_pos = outcome.html.find("__SSR_CONTEXT__").unwrap();
        let body_close = outcome.html.rfind("</body>").unwrap();
        assert!(store_pos < context_pos);
        assert!(context_pos < body_close);
        // 外壳中的前端构建产物引用保持原位
        assert!(outcome.html.contains(r#"src="/assets/client.js""#));
    }

    /// 文章页：头部元数据来自文章内容
    #[tokio::test]
    async fn test_post_page_helmet() {
        let cache = new_cache();
        let outcome = render_ssr(&request_at("/post/42"), SHELL, &cache, 0)
            .await
            .unwrap();

        assert_eq!(outcome.status, 200);
        assert!(outcome.html.contains("<title>服务端渲染的错误页</title>"));
        assert_eq!(outcome.html.matches("<title>").count(), 1);
    }

    /// 请求上下文（主题/语言/设备）贯穿到布局类名与上下文负载
    #[tokio::test]
    async fn test_request_context_flows_through() {
        let cache = new_cache();
        let raw = "GET / HTTP/1.1\r\nHost: x\r\nUser-Agent: Android\r\nAccept-Language: zh-CN,zh;q=0.9\r\nCookie: theme=dark\r\n\r\n";
        let outcome = render_ssr(&request_from(raw), SHELL, &cache, 0)
            .await
            .unwrap();

        assert!(outcome.html.contains("theme-dark"));
        assert!(outcome.html.contains("device-mobile"));
        assert!(outcome.html.contains("lang-zh"));
        assert!(outcome.html.contains(r#""theme":"dark""#));
    }

    /// 未知路径：404错误页，头部回到站点默认，不写缓存
    #[tokio::test]
    async fn test_unknown_path_renders_error_page() {
        let cache = new_cache();
        let outcome = render_ssr(&request_at("/no/such/page"), SHELL, &cache, 0)
            .await
            .unwrap();

        assert_eq!(outcome.status, 404);
        assert!(outcome.html.contains("<title>Shaneyale 的博客</title>"));
        assert!(outcome.html.contains("error-page"));
        // 错误页仍然是完整文档，客户端引导脚本齐全
        assert!(outcome.html.contains("__INIT_STORE__"));
        assert!(outcome.html.contains("__SSR_CONTEXT__"));
        assert!(cache.lock().unwrap().is_empty());
    }

    /// 非法文章ID：参数校验失败映射为400
    #[tokio::test]
    async fn test_invalid_post_id_is_bad_request() {
        let cache = new_cache();
        let outcome = render_ssr(&request_at("/post/abc"), SHELL, &cache, 0)
            .await
            .unwrap();

        assert_eq!(outcome.status, 400);
        assert!(outcome.html.contains("error-page"));
        assert!(cache.lock().unwrap().is_empty());
    }

    /// 不同的渲染维度各自独立缓存
    #[tokio::test]
    async fn test_cache_keyed_by_dimensions() {
        let cache = new_cache();
        let light = "GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        let dark = "GET / HTTP/1.1\r\nHost: x\r\nCookie: theme=dark\r\n\r\n";

        render_ssr(&request_from(light), SHELL, &cache, 0)
            .await
            .unwrap();
        render_ssr(&request_from(dark), SHELL, &cache, 1)
            .await
            .unwrap();

        assert_eq!(cache.lock().unwrap().len(), 2);
    }

    /// purge后下一次请求重新走管线并重新写入
    #[tokio::test]
    async fn test_purge_then_repopulate() {
        let cache = new_cache();
        render_ssr(&request_at("/"), SHELL, &cache, 0).await.unwrap();
        assert_eq!(cache.lock().unwrap().len(), 1);

        cache.lock().unwrap().purge();
        assert!(cache.lock().unwrap().is_empty());

        let outcome = render_ssr(&request_at("/"), SHELL, &cache, 1).await.unwrap();
        assert_eq!(outcome.status, 200);
        assert_eq!(cache.lock().unwrap().len(), 1);
    }

    /// 静态路由的缓存条目不受默认TTL约束
    #[tokio::test]
    async fn test_static_route_survives_default_ttl() {
        let cache = new_cache();
        render_ssr(&request_at("/archive"), SHELL, &cache, 0)
            .await
            .unwrap();

        let app = AppInstance::from_request(&request_at("/archive"));
        let key = render::request_cache_key(&app, "/archive");
        let far_future = Instant::now() + Duration::from_secs(60 * 10000);
        assert!(cache.lock().unwrap().find(&key, far_future).is_some());
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use blog_bff::Response;

    /// 渲染结果到HTTP响应：状态行与必要头部齐全
    #[tokio::test]
    async fn test_outcome_to_response() {
        let cache = new_cache();
        let request = request_at("/");
        let outcome = render_ssr(&request, SHELL, &cache, 0).await.unwrap();

        let response = Response::from_html(outcome.status, &outcome.html, &request, 0);
        let text = String::from_utf8_lossy(&response.as_bytes()).to_string();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/html;charset=utf-8"));
        assert!(text.contains("Content-Length: "));
        assert!(text.contains("Server: shaneyale-blog-bff"));
    }

    /// HEAD请求：照常渲染但响应不携带主体
    #[tokio::test]
    async fn test_head_request_has_no_body() {
        let cache = new_cache();
        let head = request_from("HEAD / HTTP/1.1\r\nHost: x\r\n\r\n");
        let outcome = render_ssr(&head, SHELL, &cache, 0).await.unwrap();

        let response = Response::from_html(outcome.status, &outcome.html, &head, 0);
        let bytes = response.as_bytes();
        let text = String::from_utf8_lossy(&bytes).to_string();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(bytes.ends_with(b"\r\n\r\n"));
        // 渲染结果仍然进入缓存，后续GET可以直接命中
        assert_eq!(cache.lock().unwrap().len(), 1);
    }
}
