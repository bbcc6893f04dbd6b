// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 响应头集合
//!
//! `HeaderSet` 保存经过校验的响应头：
//! - 查找时大小写不敏感，存储时保留调用者的拼写；
//! - 发送顺序即插入顺序；
//! - 名称与值拼接后的每个字节都必须合法，否则整个构造失败。

use log::{debug, warn};

use crate::{exception::Exception, param::DEFAULT_HEADERS};

/// 经过校验、按插入顺序排列的响应头集合。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    /// 构造空集合
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// 构造只包含默认响应头的集合
    pub fn with_defaults() -> Self {
        Self {
            entries: DEFAULT_HEADERS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    /// 在默认响应头之上应用调用者的覆盖值，键冲突时调用者优先。
    pub fn from_overrides<I, K, V>(overrides: I) -> Result<Self, Exception>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut headers = Self::with_defaults();
        headers.merge(overrides)?;
        Ok(headers)
    }

    /// 设置一个响应头。
    ///
    /// 已存在的同名头（忽略大小写）保留原位置，名称拼写与值替换为新的；否则追加到末尾。
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<(), Exception> {
        let name = name.into();
        let value = value.into();
        validate(&name, &value)?;

        match self.position(&name) {
            Some(index) => {
                debug!("替换响应头 {}", name);
                self.entries[index] = (name, value);
            }
            None => self.entries.push((name, value)),
        }
        Ok(())
    }

    /// 依次应用覆盖值。任意一项非法时返回错误，此前已应用的项保持不变。
    pub fn merge<I, K, V>(&mut self, overrides: I) -> Result<(), Exception>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in overrides {
            self.set(name, value)?;
        }
        Ok(())
    }

    /// 大小写不敏感地查找响应头的值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// 按插入顺序遍历 `(名称, 值)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// 允许的字节：水平制表符、可打印 ASCII、以及 0x80–0xff 高位字节。
///
/// CR 与 LF 会被拒绝，否则调用者可以向响应中注入额外的头部行。
pub fn is_allowed_header_byte(b: u8) -> bool {
    matches!(b, 0x09 | 0x20..=0x7e | 0x80..=0xff)
}

fn validate(name: &str, value: &str) -> Result<(), Exception> {
    if name.is_empty() {
        warn!("拒绝名称为空的响应头");
        return Err(Exception::InvalidHeader("header name is empty".to_string()));
    }
    let bad = name
        .bytes()
        .chain(value.bytes())
        .find(|b| !is_allowed_header_byte(*b));
    if let Some(b) = bad {
        warn!("响应头 {} 中包含非法字节 0x{:02x}", name.escape_debug(), b);
        return Err(Exception::InvalidHeader(format!(
            "invalid byte 0x{:02x} in header name or value",
            b
        )));
    }
    Ok(())
}
