// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use chrono::{DateTime, Utc};
use log::warn;
use url::form_urlencoded;

use crate::{exception::Exception, header::is_allowed_header_byte};

/// 单条 Cookie 指令。
///
/// 默认路径为 `/`，默认不限定 `secure`，默认 `httponly`。
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    name: String,
    value: String,
    expires: Option<DateTime<Utc>>,
    path: String,
    domain: Option<String>,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
        }
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// 校验 `path` 与 `domain`。
    ///
    /// 名称与值在输出时会被编码，这两个属性则原样输出，
    /// 因此其中不能出现换行、控制字符或属性分隔符 `;`。
    pub fn validate(&self) -> Result<(), Exception> {
        let attributes = [
            ("path", self.path.as_str()),
            ("domain", self.domain.as_deref().unwrap_or("")),
        ];
        for (attribute, value) in attributes {
            if let Some(b) = value.bytes().find(|b| !is_allowed_header_byte(*b) || *b == b';') {
                warn!("Cookie {} 的 {} 属性中包含非法字节 0x{:02x}", self.name, attribute, b);
                return Err(Exception::InvalidHeader(format!(
                    "invalid byte 0x{:02x} in cookie {}",
                    b, attribute
                )));
            }
        }
        Ok(())
    }

    /// 生成 `Set-Cookie` 头的值。
    ///
    /// 格式：`name=value; expires=<日期或0>; path=<p>; domain=<d>; secure=<TRUE|FALSE>; httponly=<TRUE|FALSE>`
    pub fn to_header_value(&self) -> String {
        let expires = match &self.expires {
            Some(at) => format_cookie_date(at),
            None => "0".to_string(),
        };
        format!(
            "{}={}; expires={}; path={}; domain={}; secure={}; httponly={}",
            url_encode(&self.name),
            url_encode(&self.value),
            expires,
            self.path,
            self.domain.as_deref().unwrap_or(""),
            flag(self.secure),
            flag(self.http_only),
        )
    }
}

/// 按插入顺序保存的 Cookie 指令列表，只追加，不去重。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

fn url_encode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// RFC 1123 风格的 Cookie 日期，例如 `Fri, 16-Oct-2026 08:00:00 GMT`
fn format_cookie_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d-%b-%Y %H:%M:%S GMT").to_string()
}

fn flag(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}
