// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板模块
//!
//! - `TemplateFunctions`：函数名到具体可调用对象的显式映射，未注册的名称返回 `UndefinedFunction`；
//! - `TemplateContext`：显式传入渲染过程的数据，不向模板隐式注入变量；
//! - `Template`：读取 `<root>/templates/<name>.html` 并替换占位符。
//!
//! 占位符只有两种：`{{ key }}` 输出上下文中的值（HTML 转义），
//! `{{ func(arg, ...) }}` 调用已注册的函数（原样输出）。参数可以是带引号的字面量、
//! 上下文中的键，或 JSON 字面量。

use std::{collections::HashMap, fmt, fs, path::PathBuf};

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;

use crate::exception::Exception;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*(\(([^)]*)\))?\s*\}\}").unwrap();
}

pub type TemplateFn = Box<dyn Fn(&[Value]) -> Result<String, Exception> + Send + Sync>;

/// 模板可调用的函数表
#[derive(Default)]
pub struct TemplateFunctions {
    functions: HashMap<String, TemplateFn>,
}

impl TemplateFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册函数，同名函数会被替换
    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> Result<String, Exception> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Box::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<String, Exception> {
        match self.functions.get(name) {
            Some(function) => function(args),
            None => {
                warn!("模板调用了未注册的函数 {}", name);
                Err(Exception::UndefinedFunction(name.to_string()))
            }
        }
    }
}

impl fmt::Debug for TemplateFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("TemplateFunctions")
            .field("functions", &names)
            .finish()
    }
}

/// 渲染上下文
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<&mut Self, Exception> {
        self.values.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

#[derive(Debug)]
pub struct Template {
    root: PathBuf,
    functions: TemplateFunctions,
}

impl Template {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            functions: TemplateFunctions::new(),
        }
    }

    pub fn register_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> Result<String, Exception> + Send + Sync + 'static,
    {
        self.functions.register(name, function);
    }

    pub fn functions(&self) -> &TemplateFunctions {
        &self.functions
    }

    /// 渲染 `<root>/templates/<name>.html`
    pub fn render(&self, name: &str, context: &TemplateContext) -> Result<String, Exception> {
        let relative = format!("/templates/{}.html", name);
        let path = self.root.join("templates").join(format!("{}.html", name));
        if !path.is_file() {
            warn!("模板文件 {} 不存在", path.display());
            return Err(Exception::TemplateNotFound(relative));
        }
        let source =
            fs::read_to_string(&path).map_err(|_| Exception::TemplateNotFound(relative))?;
        debug!("渲染模板 {}", path.display());
        self.render_str(&source, context)
    }

    pub fn render_str(&self, source: &str, context: &TemplateContext) -> Result<String, Exception> {
        let mut output = String::with_capacity(source.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(source) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            output.push_str(&source[last..whole.start]);
            output.push_str(&self.expand(&caps, context)?);
            last = whole.end;
        }
        output.push_str(&source[last..]);
        Ok(output)
    }

    fn expand(&self, caps: &Captures, context: &TemplateContext) -> Result<String, Exception> {
        let name = &caps[1];
        match caps.get(3) {
            Some(raw_args) => {
                let args: Vec<Value> = raw_args
                    .as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(|a| resolve_arg(a, context))
                    .collect();
                self.functions.call(name, &args)
            }
            None => Ok(context.get(name).map(|v| escape_html(&display(v))).unwrap_or_default()),
        }
    }
}

fn resolve_arg(arg: &str, context: &TemplateContext) -> Value {
    let quoted = (arg.starts_with('"') && arg.ends_with('"'))
        || (arg.starts_with('\'') && arg.ends_with('\''));
    if quoted && arg.len() >= 2 {
        return Value::String(arg[1..arg.len() - 1].to_string());
    }
    if let Some(v) = context.get(arg) {
        return v.clone();
    }
    serde_json::from_str(arg).unwrap_or(Value::Null)
}

/// 字符串原样输出，其余值输出 JSON 文本
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
