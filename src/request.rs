// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 该模块负责将 TCP 流中读取的原始字节码解析为强类型的 `Request` 结构体。
//! 它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、版本）。
//! 2. SSR 应用工厂所需标头的提取（`User-Agent`、`Accept-Language`、`Cookie`）。
//! 3. 内容协商（Content Negotiation）相关的编码解析。

use crate::{exception::Exception, param::*};
use log::error;

/// 表示一个完整的 HTTP 请求元数据。
///
/// 该结构体不包含请求体（Body），主要用于 SSR 应用实例的构建与静态资源分发。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, HEAD）
    method: HttpRequestMethod,
    /// 请求的资源路径（包含查询字符串）
    path: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 客户端标识字符串，用于推导设备类别
    user_agent: String,
    /// 客户端声明的语言偏好（`Accept-Language` 原始值）
    accept_language: String,
    /// Cookie 键值对列表（按出现顺序排列）
    cookies: Vec<(String, String)>,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 验证编码：确保请求数据是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、路径和协议版本。
    /// 3. 迭代解析标头：识别 `User-Agent`, `Accept-Language`, `Cookie` 等字段。
    /// 4. 解析编码：专门处理 `Accept-Encoding` 以支持后续的压缩传输。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 全局请求 ID，用于在多线程环境下追踪日志。
    ///
    /// # 错误处理
    /// 如果请求格式不符合 HTTP 规范或使用了不支持的方法/版本，将返回相应的 `Exception`。
    pub fn try_from(buffer: &Vec<u8>, id: u128) -> Result<Self, Exception> {
        // 1. 将字节流转换为字符串，失败则判定为非法的 HTTP 请求
        let request_string = match String::from_utf8(buffer.to_vec()) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let request_lines: Vec<&str> = request_string.split(CRLF).collect();

        // 2. 解析请求行 (e.g., "GET /post/42 HTTP/1.1")
        let first_line_parts: Vec<&str> = request_lines[0].split(" ").collect();

        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_lines[0]);
            return Err(Exception::UnSupportedRequestMethod);
        }

        // 解析方法名
        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        // 解析协议版本
        let version_str = first_line_parts.last().unwrap().to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 解析路径（考虑到路径中可能包含空格的情况，虽然不规范但通过 join 尝试恢复）
        let path = if first_line_parts.len() == 3 {
            first_line_parts[1].to_string()
        } else {
            first_line_parts[1..first_line_parts.len() - 1].join(" ")
        };

        // 3. 迭代各行解析 Headers
        let mut user_agent = "".to_string();
        let mut accept_language = "".to_string();
        let mut cookies = vec![];
        for line in &request_lines {
            let line_lower = line.to_lowercase();
            // 处理 User-Agent
            if line_lower.starts_with("user-agent") {
                if let Some(val) = line.split(": ").nth(1) {
                    user_agent = val.to_string();
                }
            }
            // 处理 Accept-Language
            else if line_lower.starts_with("accept-language") {
                if let Some(val) = line.split(": ").nth(1) {
                    accept_language = val.to_string();
                }
            }
            // 处理 Cookie (RFC 6265)
            // 格式示例: Cookie: theme=dark; session=abc
            else if line_lower.starts_with("cookie:") {
                if let Some(val) = line.split(": ").nth(1) {
                    for pair in val.split(';') {
                        if let Some((key, value)) = pair.trim().split_once('=') {
                            cookies.push((key.to_string(), value.to_string()));
                        }
                    }
                }
            }
        }

        // 4. 解析 Accept-Encoding 标头
        // 这里的逻辑比较简单，只要包含关键词即视为支持
        let mut accept_encoding = vec![];
        for line in &request_lines {
            if line.starts_with("accept-encoding") || line.starts_with("Accept-Encoding") {
                let parts: Vec<&str> = line.split(": ").collect();
                if parts.len() > 1 {
                    let encoding = parts[1];
                    if encoding.contains("gzip") {
                        accept_encoding.push(HttpEncoding::Gzip);
                    }
                    if encoding.contains("deflate") {
                        accept_encoding.push(HttpEncoding::Deflate);
                    }
                    if encoding.contains("br") {
                        accept_encoding.push(HttpEncoding::Br);
                    }
                }
                break;
            }
        }

        Ok(Self {
            method,
            path,
            version,
            user_agent,
            accept_language,
            cookies,
            accept_encoding,
        })
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取请求路径（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// 获取客户端语言偏好的原始字符串
    pub fn accept_language(&self) -> &str {
        &self.accept_language
    }

    /// 按名称查找 Cookie 值
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// 获取客户端支持的压缩算法列表
    pub fn accept_encoding(&self) -> &Vec<HttpEncoding> {
        &self.accept_encoding
    }
}
