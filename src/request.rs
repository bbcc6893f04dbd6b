// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求解析模块
//!
//! 将 TCP 流中读取的原始字节解析为 `Request`。响应层只关心其中的几项：
//! 1. 请求行（方法、路径、协议）；协议字符串会被原样复制到响应状态行中。
//! 2. 请求头（大小写不敏感）。
//! 3. 查询字符串与 `Cookie` 头，分别放入 [`RequestBag`]，供控制器使用。
//! 4. 请求语言：默认值与可用语言表来自配置，可按请求切换。
//!
//! 请求体不在解析范围内。

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use log::{debug, error};
use regex::Regex;
use serde_derive::Serialize;
use url::form_urlencoded;

use crate::{config::Config, exception::Exception, param::*, template::escape_html};

/// 过滤输入时默认保留的最大字符数
pub const DEFAULT_FILTER_LENGTH: usize = 250;

/// 未配置 `default_locale` 时使用的语言
pub const FALLBACK_LOCALE: &str = "en";

lazy_static! {
    /// HTML 标签，包括缺少 `>` 的残缺标签
    static ref TAG: Regex = Regex::new(r"<[^>]*(?:>|$)").unwrap();
}

/// 一组请求输入（查询参数或 Cookie），键不存在时按空串处理。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RequestBag {
    input: HashMap<String, String>,
}

impl RequestBag {
    pub fn new(input: HashMap<String, String>) -> Self {
        Self { input }
    }

    /// 原始值，键不存在时返回空串
    pub fn get(&self, key: &str) -> &str {
        self.find(key).unwrap_or("")
    }

    pub fn find(&self, key: &str) -> Option<&str> {
        self.input.get(key).map(|s| s.as_str())
    }

    /// 过滤后的值：去除 HTML 标签、转义特殊字符，再截断到 `length` 个字符
    pub fn get_filtered(&self, key: &str, length: usize) -> String {
        self.find(key)
            .map(|value| filter_input(value, length))
            .unwrap_or_default()
    }

    /// 一次读取多个键。`filter` 为 `Some(length)` 时逐个过滤，缺失的键对应空串。
    pub fn get_many(&self, keys: &[&str], filter: Option<usize>) -> BTreeMap<String, String> {
        keys.iter()
            .map(|key| {
                let value = match filter {
                    Some(length) => self.get_filtered(key, length),
                    None => self.get(key).to_string(),
                };
                (key.to_string(), value)
            })
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.input.contains_key(key)
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.input
    }

    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

/// 清洗一段用户输入，结果可以直接嵌入 HTML
pub fn filter_input(value: &str, length: usize) -> String {
    let stripped = TAG.replace_all(value, "");
    let escaped = escape_html(&stripped);
    match escaped.char_indices().nth(length) {
        Some((cut, _)) => escaped[..cut].to_string(),
        None => escaped,
    }
}

/// 一个 HTTP 请求的元数据。
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 请求路径（不含查询字符串）
    path: String,
    /// 原始查询字符串（不含 `?`）
    query_string: String,
    /// 请求声明的协议，例如 `HTTP/1.1`
    protocol: String,
    /// 请求头，键统一为小写
    headers: HashMap<String, String>,
    query: RequestBag,
    cookies: RequestBag,
    locale: String,
    default_locale: String,
    /// 可用语言：语言代码 -> 区域设置
    locale_array: BTreeMap<String, String>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 请求 ID，用于追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        // 读取缓冲区末尾可能残留的 0 字节
        let end = buffer.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let request_string = match std::str::from_utf8(&buffer[..end]) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let head = request_string
            .split_once("\r\n\r\n")
            .map_or(request_string, |(head, _body)| head);
        let mut request_lines = head.split(CRLF);

        // 1. 解析请求行 (e.g., "GET /index.html HTTP/1.1")
        let first_line = request_lines.next().unwrap_or("");
        let first_line_parts: Vec<&str> = first_line.split(' ').collect();
        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::MalformedRequest);
        }

        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            "PUT" => HttpRequestMethod::Put,
            "PATCH" => HttpRequestMethod::Patch,
            "DELETE" => HttpRequestMethod::Delete,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnsupportedRequestMethod);
            }
        };

        let protocol = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        if !SUPPORTED_PROTOCOLS.contains(&protocol.as_str()) {
            error!("[ID{}]不支持的HTTP协议版本：{}", id, &protocol);
            return Err(Exception::UnsupportedHttpVersion);
        }

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let target = first_line_parts[1..first_line_parts.len() - 1].join(" ");
        let (path, query_string) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (target, String::new()),
        };

        // 2. 解析请求头
        let mut headers = HashMap::new();
        for line in request_lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_lowercase(), value.trim().to_string());
            }
        }

        // 3. 解析 Cookie 头 (e.g., "Cookie: a=1; b=2")
        let mut cookies = HashMap::new();
        if let Some(raw) = headers.get("cookie") {
            for pair in raw.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    cookies.insert(decode(name), decode(value));
                }
            }
        }

        let query = form_urlencoded::parse(query_string.as_bytes())
            .into_owned()
            .collect();

        Ok(Self {
            method,
            path,
            query_string,
            protocol,
            headers,
            query: RequestBag::new(query),
            cookies: RequestBag::new(cookies),
            locale: FALLBACK_LOCALE.to_string(),
            default_locale: FALLBACK_LOCALE.to_string(),
            locale_array: BTreeMap::from([(FALLBACK_LOCALE.to_string(), String::new())]),
        })
    }

    /// 按配置设置默认语言与可用语言表，当前语言重置为默认语言。
    ///
    /// `default_locale` 为空时使用 `en`；没有 `[locale]` 表时，可用语言只有默认语言。
    pub fn configure_locale(&mut self, config: &Config) -> &mut Self {
        self.default_locale = match config.default_locale() {
            "" => FALLBACK_LOCALE.to_string(),
            locale => locale.to_string(),
        };
        self.locale = self.default_locale.clone();
        self.locale_array = if config.locales().is_empty() {
            BTreeMap::from([(self.locale.clone(), String::new())])
        } else {
            config.locales().clone()
        };
        self
    }
}

fn decode(s: &str) -> String {
    form_urlencoded::parse(format!("x={}", s).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

impl Request {
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// 大小写不敏感地获取请求头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// 解码后的查询参数
    pub fn query(&self) -> &RequestBag {
        &self.query
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.find(name)
    }

    pub fn cookies(&self) -> &RequestBag {
        &self.cookies
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn locale_array(&self) -> &BTreeMap<String, String> {
        &self.locale_array
    }

    /// 切换当前语言，空串恢复为默认语言
    pub fn set_locale(&mut self, locale: &str) -> &mut Self {
        self.locale = match locale {
            "" => self.default_locale.clone(),
            locale => locale.to_string(),
        };
        debug!("请求语言切换为 {}", self.locale);
        self
    }

    /// 客户端是否期望 JSON
    pub fn accepts_json(&self) -> bool {
        self.header("accept")
            .map_or(false, |a| a.contains("application/json"))
    }
}
