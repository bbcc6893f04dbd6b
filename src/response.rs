// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应构建模块
//!
//! `ResponseBuilder` 负责把协议、状态码、响应头、Cookie 与响应体组合成 `Response`：
//! 1. 状态码在构造时校验，原因短语始终由状态码推导；
//! 2. 响应头在默认头之上合并，逐字节校验；
//! 3. 提供 `redirect` 与 `json` 两个便捷构造。
//!
//! 真正的发送由 [`crate::transmit::Transmitter`] 完成。

use bytes::Bytes;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    cookie::{Cookie, CookieJar},
    exception::Exception,
    header::HeaderSet,
    param::*,
    request::Request,
};

/// 一条出站 HTTP 报文。
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    protocol: String,
    status_code: u16,
    status_text: &'static str,
    headers: HeaderSet,
    cookies: CookieJar,
    content: Bytes,
    pub(crate) sent: bool,
}

/// 按交换所声明的协议构造 `Response`。
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    protocol: String,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    /// 使用兜底协议 `HTTP/1.0`
    pub fn new() -> Self {
        Self {
            protocol: DEFAULT_PROTOCOL.to_string(),
        }
    }

    /// 使用给定的协议字符串。
    ///
    /// 只接受 `HTTP/1.0` 与 `HTTP/1.1`，空串或其他任何值都退回兜底协议，
    /// 协议会原样写入状态行。
    pub fn with_protocol(protocol: &str) -> Self {
        if !SUPPORTED_PROTOCOLS.contains(&protocol) {
            if !protocol.is_empty() {
                warn!("不支持的响应协议 {}，使用 {}", protocol.escape_debug(), DEFAULT_PROTOCOL);
            }
            return Self::new();
        }
        Self {
            protocol: protocol.to_string(),
        }
    }

    /// 复制入站请求声明的协议
    pub fn for_request(request: &Request) -> Self {
        Self::with_protocol(request.protocol())
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// 构造普通响应。
    ///
    /// 状态码不在标准表中时返回 `UnknownStatusCode`，响应头非法时返回 `InvalidHeader`。
    pub fn build<I, K, V>(
        &self,
        content: impl Into<Bytes>,
        status_code: u16,
        overrides: I,
    ) -> Result<Response, Exception>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let status_text = reason_phrase(status_code).map_err(|e| {
            warn!("非法的状态码：{}", status_code);
            e
        })?;
        let headers = HeaderSet::from_overrides(overrides)?;
        let content = content.into();
        debug!(
            "构造响应：{} {} {}，响应体 {} bytes",
            self.protocol,
            status_code,
            status_text,
            content.len()
        );
        Ok(Response {
            protocol: self.protocol.clone(),
            status_code,
            status_text,
            headers,
            cookies: CookieJar::new(),
            content,
            sent: false,
        })
    }

    /// 构造重定向响应，状态码必须位于 300–308。
    pub fn redirect(&self, url: &str, status_code: u16) -> Result<Response, Exception> {
        if !is_redirect_status(status_code) {
            warn!("状态码 {} 不能用于重定向", status_code);
            return Err(Exception::InvalidRedirectStatus(status_code));
        }
        let mut response = self.build(Bytes::new(), status_code, no_headers())?;
        response.set_redirect(url)?;
        Ok(response)
    }

    /// 构造 JSON 响应。
    ///
    /// `Content-Length` 为序列化文本的字节长度。调用者的其他响应头保留，
    /// 但 `Content-Type` 与 `Content-Length` 总是由本函数决定。
    pub fn json<T, I, K, V>(
        &self,
        data: &T,
        status_code: u16,
        overrides: I,
    ) -> Result<Response, Exception>
    where
        T: Serialize + ?Sized,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let body = serde_json::to_string(data)?;
        let length = body.len().to_string();
        let mut response = self.build(body, status_code, overrides)?;
        response.headers.merge([
            ("Content-Type", JSON_CONTENT_TYPE),
            ("Content-Length", length.as_str()),
        ])?;
        Ok(response)
    }
}

/// 不带额外响应头时传给 `build` 的空覆盖列表
pub fn no_headers() -> [(&'static str, &'static str); 0] {
    []
}

impl Response {
    /// 以兜底协议构造响应，等价于 `ResponseBuilder::new().build(..)`
    pub fn new<I, K, V>(
        content: impl Into<Bytes>,
        status_code: u16,
        overrides: I,
    ) -> Result<Self, Exception>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ResponseBuilder::new().build(content, status_code, overrides)
    }

    /// 追加一条 Cookie 指令，`path` 或 `domain` 非法时返回 `InvalidHeader`
    pub fn set_cookie(&mut self, cookie: Cookie) -> Result<&mut Self, Exception> {
        cookie.validate()?;
        self.cookies.add(cookie);
        Ok(self)
    }

    /// 设置 `Location` 头
    pub fn set_redirect(&mut self, url: &str) -> Result<&mut Self, Exception> {
        self.headers.set("Location", url)?;
        Ok(self)
    }

    /// 在现有响应头之上合并覆盖值
    pub fn merge_headers<I, K, V>(&mut self, overrides: I) -> Result<&mut Self, Exception>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.merge(overrides)?;
        Ok(self)
    }

    /// 替换响应体。已发送的响应不再接受修改。
    pub fn set_content(&mut self, content: impl Into<Bytes>) -> &mut Self {
        if self.sent {
            warn!("响应已发送，忽略对响应体的修改");
            return self;
        }
        self.content = content.into();
        self
    }
}

impl Response {
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_text(&self) -> &str {
        self.status_text
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn is_redirect(&self) -> bool {
        is_redirect_status(self.status_code)
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }
}
