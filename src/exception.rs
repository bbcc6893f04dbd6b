// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求生命周期中可能出现的各类异常情况。
//!
//! ## 分类
//! - **构造期错误**：状态码非法、重定向状态码非法、响应头非法。这些错误直接返回给调用者，
//!   若调用者未处理，则会被 `ErrorInterceptor` 捕获并渲染为 500 页面。
//! - **协作模块错误**：请求解析、配置加载、模板渲染、JSON 序列化。

use std::{error::Error, fmt};

/// 请求处理过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 状态码不在标准状态码表中。
    UnknownStatusCode(u16),
    /// 重定向使用了 300–308 以外的状态码。
    InvalidRedirectStatus(u16),
    /// 响应头的名称为空，或名称与值中包含非法字节。
    InvalidHeader(String),
    /// 模板中调用了未注册的函数。
    UndefinedFunction(String),
    /// 模板文件不存在。
    TemplateNotFound(String),
    /// 数据无法序列化为 JSON。
    Json(String),
    /// 配置文件缺失或格式错误。
    Config(String),
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了不支持的 HTTP 方法。
    UnsupportedRequestMethod,
    /// 客户端使用了不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求行缺失或格式不正确。
    MalformedRequest,
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownStatusCode(code) => write!(f, "Status {} not found.", code),
            InvalidRedirectStatus(code) => write!(f, "Status {} is not for redirect", code),
            InvalidHeader(reason) => write!(f, "Invalid header: {}", reason),
            UndefinedFunction(name) => write!(f, "Function \"{}\" is not defined", name),
            TemplateNotFound(path) => write!(f, "Template file {} not found", path),
            Json(reason) => write!(f, "JSON serialization failed: {}", reason),
            Config(reason) => write!(f, "Configuration error: {}", reason),
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnsupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            MalformedRequest => write!(f, "Malformed request line"),
        }
    }
}

impl Error for Exception {}

impl From<serde_json::Error> for Exception {
    fn from(e: serde_json::Error) -> Self {
        Json(e.to_string())
    }
}
