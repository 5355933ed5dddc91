// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了 BFF 服务在请求处理生命周期中可能抛出的各类异常情况，
//! 以及 SSR 渲染管线使用的渲染错误值。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析错误、静态资源错误以及渲染管线内部错误。
//! - **语义映射**：每个变体都对应特定的业务逻辑，便于上层模块将其转化为 HTTP 状态码。
//! - **渲染错误与异常分离**：`Exception` 表示"被抛出"的失败（会触发纠错性重渲染），
//!   `RenderError` 表示已被记录到 UI 状态、随错误页一起呈现的错误值。

use std::fmt;

use crate::param::INVALID_ERROR;

/// 服务器处理请求过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Clone)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了服务器暂不支持的 HTTP 方法（本服务仅支持 GET/HEAD）。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 在构建产物目录下未找到所请求的静态资源。对应 `404 Not Found`。
    AssetNotFound,
    /// 请求的路径格式非法或包含越权尝试（如目录遍历）。对应 `400 Bad Request`。
    InvalidPath,
    /// Store 预取（serverInit）阶段失败，携带底层数据源的错误消息。
    /// 渲染管线会将其包装为内部渲染错误并进入纠错性重渲染。
    PrefetchFailed(String),
}

use Exception::*;

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
impl fmt::Display for Exception {
    /// 根据错误类型写入人类可读的描述文本。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            AssetNotFound => write!(f, "Asset not found (404)"),
            InvalidPath => write!(f, "Invalid path (400)"),
            PrefetchFailed(message) => write!(f, "Store prefetch failed: {}", message),
        }
    }
}

/// SSR 渲染错误值。
///
/// 与 `Exception` 不同，它不沿调用栈传播，而是被写入每个请求的 UI 状态，
/// 由视图层据此渲染错误页，并决定最终的 HTTP 状态码。
#[derive(Debug, Clone, PartialEq)]
pub struct RenderError {
    /// HTTP 风格的状态码（404/400/500 等），同时作为响应状态
    pub code: u16,
    /// 诊断用消息。仅用于日志与错误页展示，绝不参与缓存键的推导
    pub message: String,
}

impl RenderError {
    /// 路由无法解析（导航错误）
    pub fn not_found(url: &str) -> Self {
        Self {
            code: 404,
            message: format!("Route not found: {}", url),
        }
    }

    /// 路由参数校验失败（导航错误）
    pub fn validation(message: &str) -> Self {
        Self {
            code: 400,
            message: message.to_string(),
        }
    }

    /// 未知内部错误。状态码固定为 `INVALID_ERROR`，消息保留原始异常文本
    pub fn internal(message: String) -> Self {
        Self {
            code: INVALID_ERROR,
            message,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
