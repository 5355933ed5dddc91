// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 个人博客 BFF 服务器
//!
//! 该模块实现了基于 Tokio 运行时的博客前端服务（Backend For Frontend）。
//! 核心功能包括：
//! - 请求级隔离的 SSR 渲染管线（预取 → 导航 → 布局 → 标记生成 → 组装）
//! - 按 URL/语言/主题/设备维度指纹缓存的渲染结果缓存（TTL + 静态页无限期）
//! - 渲染错误到完整错误页面的降级路径
//! - 前端构建产物的静态托管与压缩传输
//! - 后台管理控制台（CLI 指令交互，支持显式清空渲染缓存）

// --- 模块定义 ---
mod app;        // 请求级应用实例工厂
mod assemble;   // 页面外壳组装器
mod cache;      // SSR渲染结果缓存
mod config;     // 配置解析与管理
mod exception;  // 自定义异常与错误处理
mod param;      // 全局常量与静态参数
mod render;     // SSR渲染管线
mod request;    // HTTP 请求报文解析器
mod response;   // HTTP 响应报文构建器
mod router;     // 服务端路由
mod scripts;    // 状态序列化与脚本负载
mod store;      // 数据预取容器
mod view;       // 视图（标记生成）

use cache::RenderCache;
use config::Config;
use exception::Exception;
use request::Request;
use response::Response;

use log::{debug, error, info, warn};
use log4rs;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

use std::{
    fs,
    net::{Ipv4Addr, SocketAddrV4},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// # 程序入口点
///
/// 初始化系统环境、加载配置、读入页面外壳并启动主事件循环。
fn main() {
    // 1. 初始化日志系统：采用 log4rs 异步日志架构，通过外部 YAML 灵活配置级别与输出目的地
    log4rs::init_file("config/log4rs.yaml", Default::default()).unwrap();

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = Config::from_toml("config/development.toml");
    info!("配置文件已载入");

    // 3. 异步运行时定制：根据配置文件动态分配工作线程数
    let worker_threads = config.worker_threads();
    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    // 页面外壳在启动时读入一次，之后在所有请求间只读共享
    let shell = match fs::read_to_string(config.shell_path()) {
        Ok(content) => Arc::new(content),
        Err(e) => {
            error!("无法读取页面外壳{}：{}", config.shell_path(), e);
            panic!("无法读取页面外壳{}：{}", config.shell_path(), e);
        }
    };
    info!("页面外壳已载入：{}", config.shell_path());

    // 共享资源初始化：
    // - 渲染缓存是唯一跨请求共享的状态，通过 Arc<Mutex<...>> 做原子的键值读写
    // - 条目数量上限只是内存兜底，正常淘汰依赖 TTL
    let cache = Arc::new(Mutex::new(RenderCache::new(
        config.render_cache_capacity(),
        Duration::from_secs(config.render_cache_ttl_secs()),
    )));
    let config_arc = Arc::new(config);

    // 网络层初始化：
    // 支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
    let port: u16 = config_arc.port();
    info!("服务端将在{}端口上监听Socket连接", port);
    let address = match config_arc.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}地址上监听Socket连接", address);
    let socket = SocketAddrV4::new(address, port);

    // 绑定端口并启动监听器
    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            panic!("无法绑定端口：{}，错误：{}", port, e);
        }
    };
    info!("端口{}绑定完成", port);

    // 服务器状态与生命周期管理
    // shutdown_flag: 用于优雅停机 (Graceful Shutdown)
    // active_connection: 追踪当前并发连接数
    let shutdown_flag = Arc::new(Mutex::new(false));
    let active_connection = Arc::new(Mutex::new(0u32));

    // 启动交互式管理控制台任务
    // 该任务运行在后台，不阻塞监听循环，提供运维指令支持
    tokio::spawn({
        let shutdown_flag = Arc::clone(&shutdown_flag);
        let active_connection = Arc::clone(&active_connection);
        let cache = Arc::clone(&cache);
        async move {
            let stdin = tokio::io::stdin();
            let mut reader = BufReader::new(stdin);
            let mut input = String::new();
            loop {
                input.clear();
                if let Ok(_) = reader.read_line(&mut input).await {
                    let cmd = input.trim();
                    match cmd {
                        "stop" => {
                            let mut flag = shutdown_flag.lock().unwrap();
                            *flag = true;
                            println!("停机指令已激活，服务器将在处理完下一个请求后关闭...");
                            break;
                        }
                        "help" => {
                            println!("== Blog BFF Help ==");
                            println!("stop   - 发出停机信号");
                            println!("status - 查看当前服务器运行状态");
                            println!("purge  - 清空SSR渲染缓存（显式失效）");
                            println!("help   - 显示此帮助信息");
                            println!("====================");
                        }
                        "status" => {
                            let active_count = *active_connection.lock().unwrap();
                            let cached = cache.lock().unwrap().len();
                            println!("== Blog BFF 状态 ===");
                            println!("当前活跃连接数: {}", active_count);
                            println!("渲染缓存条目数: {}", cached);
                            println!("====================");
                        }
                        "purge" => {
                            cache.lock().unwrap().purge();
                            println!("渲染缓存已清空");
                        }
                        _ => {
                            println!("无效的命令：{}", cmd);
                        }
                    }
                } else {
                    break;
                }
            }
        }
    });

    let mut id: u128 = 0;

    // 主事件循环 (Accept Loop)
    // 持续接收新连接并将其分发至 Tokio 线程池进行异步处理
    loop {
        // 检查停机标志位
        if *shutdown_flag.lock().unwrap() {
            info!("主循环接收到停机指令，正在退出...");
            break;
        }

        // 等待新的 TCP 连接
        let (mut stream, addr) = listener.accept().await.unwrap();
        debug!("新的连接：{}", addr);

        // 为每个连接克隆资源句柄（Arc 引用计数增加）
        let active_connection_arc = Arc::clone(&active_connection);
        let shell_arc = Arc::clone(&shell);
        let cache_arc = Arc::clone(&cache);
        let config_arc_clone = Arc::clone(&config_arc);

        debug!("[ID{}]TCP连接已建立", id);

        // 使用轻量级绿色线程处理具体请求，确保非阻塞 IO
        tokio::spawn(async move {
            {
                // 连接计数加 1
                let mut lock = active_connection_arc.lock().unwrap();
                *lock += 1;
            }

            // 核心业务处理
            handle_connection(&mut stream, id, shell_arc, cache_arc, config_arc_clone).await;

            {
                // 处理完成后连接计数减 1
                let mut lock = active_connection_arc.lock().unwrap();
                *lock -= 1;
            }
        });
        id += 1; // 增加请求唯一标识序列
    }
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期：读取解析请求，区分静态资源与 SSR 页面，
/// 构建并发送响应。SSR 路径上，不可恢复的渲染失败（纠错渲染再失败）
/// 在这里落回宿主层的兜底 500 响应。
async fn handle_connection(
    stream: &mut TcpStream,
    id: u128,
    shell: Arc<String>,
    cache: Arc<Mutex<RenderCache>>,
    config: Arc<Config>,
) {
    let mut buffer = vec![0; 4096];

    // 等待流进入可读状态
    stream.readable().await.unwrap();

    // 尝试非阻塞读取 HTTP 报文
    match stream.try_read(&mut buffer) {
        Ok(0) => return, // 客户端主动关闭连接
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
        _ => {}
    }
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();

    // 1. 协议解析阶段：将字节流转换为结构化的 Request 对象
    let request = match Request::try_from(&buffer, id) {
        Ok(req) => req,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {:?}", id, e);
            let response = "HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\n\r\nBad Request";
            let _ = stream.write_all(response.as_bytes()).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    // 2. 分发阶段：带扩展名的路径按静态资源处理，其余全部进入 SSR 管线
    let response = if is_asset_path(request.path()) {
        match route_asset(request.path(), config.assets_root(), id) {
            Ok(path) => match path.to_str() {
                Some(path_str) => match Response::from_asset(path_str, &request, id) {
                    Ok(response) => response,
                    Err(Exception::AssetNotFound) => {
                        warn!("[ID{}]请求的资源：{} 不存在，返回404", id, request.path());
                        Response::response_404(&request, id)
                    }
                    Err(e) => {
                        error!("[ID{}]处理静态资源时发生未知异常: {}", id, e);
                        Response::response_500(&request, id)
                    }
                },
                None => {
                    error!("[ID{}]无法将路径转换为str", id);
                    return;
                }
            },
            Err(Exception::InvalidPath) => {
                warn!(
                    "[ID{}]请求的路径：{} 包含非法字符，返回404",
                    id,
                    request.path()
                );
                Response::response_404(&request, id)
            }
            Err(e) => {
                error!("[ID{}]资源路由时发生未知异常: {}", id, e);
                return;
            }
        }
    } else {
        // 3. SSR 渲染阶段：缓存命中直接返回，未命中执行完整管线
        match render::render_ssr(&request, &shell, &cache, id).await {
            Ok(outcome) => Response::from_html(outcome.status, &outcome.html, &request, id),
            Err(e) => {
                // 纠错性重渲染自身失败：该请求不可恢复，落回兜底500
                error!("[ID{}]渲染管线不可恢复的失败: {}", id, e);
                Response::response_500(&request, id)
            }
        }
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );

    // 4. 结构化日志记录：便于后期审计与性能监控
    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, ",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    // 5. 数据发送阶段
    let response_bytes = response.as_bytes();
    debug!("[ID{}]发送全量响应，长度: {}", id, response_bytes.len());
    let _ = stream.write_all(&response_bytes).await;
    let _ = stream.flush().await;
}

/// 带文件扩展名的路径视为静态资源请求，其余交给 SSR 路由
fn is_asset_path(path: &str) -> bool {
    let without_query = path.split('?').next().unwrap_or(path);
    without_query
        .rsplit('/')
        .next()
        .map(|segment| segment.contains('.'))
        .unwrap_or(false)
}

/// # 静态资源路由
///
/// 将 URI 映射到构建产物目录下的物理路径，并做最基本的越权检查。
fn route_asset(path: &str, root: &str, id: u128) -> Result<PathBuf, Exception> {
    let without_query = path.split('?').next().unwrap_or(path);
    debug!("[ID{}]资源路由匹配开始: path='{}'", id, without_query);

    // 拒绝目录遍历尝试
    if without_query.contains("..") {
        return Err(Exception::InvalidPath);
    }

    // 去除领先的 '/' 以便进行路径拼接
    let mut path_str = without_query.to_string();
    if path_str.starts_with('/') {
        path_str.remove(0);
    }
    let full_path = Path::new(root).join(Path::new(&path_str));

    debug!("[ID{}]映射物理路径：{}", id, full_path.display());
    Ok(full_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_asset_path() {
        assert!(is_asset_path("/assets/client.js"));
        assert!(is_asset_path("/favicon.ico"));
        assert!(is_asset_path("/assets/app.css?v=2"));
        assert!(!is_asset_path("/"));
        assert!(!is_asset_path("/post/42"));
        assert!(!is_asset_path("/about"));
    }

    #[test]
    fn test_route_asset_maps_into_root() {
        let path = route_asset("/assets/client.js", "static", 0).unwrap();
        assert_eq!(path, PathBuf::from("static/assets/client.js"));
    }

    #[test]
    fn test_route_asset_rejects_traversal() {
        let result = route_asset("/assets/../../etc/passwd", "static", 0);
        assert!(matches!(result, Err(Exception::InvalidPath)));
    }
}
