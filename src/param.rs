// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了 `webframe` 遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 标准 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 默认响应头、协议字符串等常量。
//! - 错误严重级别及致命错误掩码。
//! - HTTP 方法的强类型枚举。

use std::{collections::HashMap, fmt, ops::RangeInclusive};

use lazy_static::lazy_static;

use crate::exception::Exception;

/// 服务器名称标识
pub const SERVER_NAME: &str = "webframe";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 入站请求未声明协议时使用的协议字符串
pub const DEFAULT_PROTOCOL: &str = "HTTP/1.0";
/// 响应状态行允许使用的协议
pub const SUPPORTED_PROTOCOLS: [&str; 2] = ["HTTP/1.0", "HTTP/1.1"];

/// 重定向状态码范围。处于该范围内的响应不发送响应体。
pub const REDIRECT_RANGE: RangeInclusive<u16> = 300..=308;

/// 每个响应默认携带的响应头，按发送顺序排列。
pub const DEFAULT_HEADERS: [(&str, &str); 4] = [
    ("Content-Type", "text/html; charset=UTF-8"),
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

/// JSON 响应使用的 `Content-Type`
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

// 错误严重级别，按位组合。
pub const E_ERROR: u32 = 1;
pub const E_WARNING: u32 = 2;
pub const E_PARSE: u32 = 4;
pub const E_NOTICE: u32 = 8;
pub const E_CORE_ERROR: u32 = 16;
pub const E_COMPILE_ERROR: u32 = 64;

/// 关闭阶段需要渲染的致命错误掩码，其余级别一律忽略。
pub const FATAL_MASK: u32 = E_ERROR | E_PARSE | E_CORE_ERROR | E_COMPILE_ERROR;

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 表中逐条列出，不做范围推断，也没有兜底值。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        // 1xx: 信息响应 (Informational)
        map.insert(100, "Continue");
        map.insert(101, "Switching Protocols");

        // 2xx: 成功响应 (Successful)
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(203, "Non-Authoritative Information");
        map.insert(204, "No Content");
        map.insert(205, "Reset Content");
        map.insert(206, "Partial Content");

        // 3xx: 重定向 (Redirection)
        map.insert(300, "Multiple Choices");
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");
        map.insert(305, "Use Proxy");
        map.insert(306, "Switch Proxy");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        // 4xx: 客户端错误 (Client Error)
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(402, "Payment Required");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(406, "Not Acceptable");
        map.insert(407, "Proxy Authentication Required");
        map.insert(408, "Request Timeout");
        map.insert(409, "Conflict");
        map.insert(410, "Gone");
        map.insert(411, "Length Required");
        map.insert(412, "Precondition Failed");
        map.insert(413, "Request Entity Too Large");
        map.insert(414, "Request-URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(416, "Requested Range Not Satisfiable");
        map.insert(417, "Expectation Failed");

        // 5xx: 服务端错误 (Server Error)
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map.insert(504, "Gateway Timeout");
        map.insert(505, "HTTP Version Not Supported");
        map.insert(506, "Variant Also Negotiates");
        map.insert(507, "Insufficient Storage");
        map.insert(508, "Loop Detected");
        map.insert(510, "Not Extended");
        map.insert(511, "Network Authentication Required");
        map
    };
}

/// 查询状态码对应的原因短语。
///
/// 状态码不在 [`STATUS_CODES`] 中时返回 [`Exception::UnknownStatusCode`]。
pub fn reason_phrase(code: u16) -> Result<&'static str, Exception> {
    STATUS_CODES
        .get(&code)
        .copied()
        .ok_or(Exception::UnknownStatusCode(code))
}

/// 状态码是否处于重定向范围（300–308）
pub fn is_redirect_status(code: u16) -> bool {
    REDIRECT_RANGE.contains(&code)
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
            HttpRequestMethod::Put => write!(f, "PUT"),
            HttpRequestMethod::Patch => write!(f, "PATCH"),
            HttpRequestMethod::Delete => write!(f, "DELETE"),
        }
    }
}
