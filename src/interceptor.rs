// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 错误拦截模块
//!
//! 所有未被处理的失败都经由 `ErrorInterceptor` 渲染为一个 500 响应：
//! - **RuntimeError**：应用主动报告的运行时错误；
//! - **UncaughtException**：请求处理函数返回、但没有被处理的错误值；
//! - **FatalShutdown**：致命错误（例如 panic），仅渲染 [`FATAL_MASK`] 范围内的级别。
//!
//! 拦截器是按请求构造的普通值，调试开关随请求刷新，不存在跨请求共享的可变状态。
//! 唯一的进程级注册是 [`install_panic_hook`]，它在启动时安装一次，之后只读；
//! panic 的详细信息保存在线程局部槽位中，由同一线程上的拦截器取走。
//!
//! 调试模式下页面包含消息、文件、行号（异常还包含调用链）；生产模式下只输出固定的通用页面。

use std::{
    any::Any,
    cell::RefCell,
    error::Error,
    fmt,
    panic::{self, AssertUnwindSafe, Location},
    sync::Once,
};

use log::{debug, error};

use crate::{
    config::Config,
    param::{E_ERROR, FATAL_MASK},
    response::{no_headers, Response, ResponseBuilder},
    transmit::{SendOutcome, Transmitter, Transport},
};

/// 失败的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    RuntimeError { code: u32 },
    UncaughtException,
    FatalShutdown { kind: u32 },
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSource::RuntimeError { code } => write!(f, "RuntimeError({})", code),
            ErrorSource::UncaughtException => write!(f, "UncaughtException"),
            ErrorSource::FatalShutdown { kind } => write!(f, "FatalShutdown({})", kind),
        }
    }
}

/// 一次被拦截的失败，构造后立即被渲染，随后丢弃。
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    source: ErrorSource,
    message: String,
    file: String,
    line: u32,
    trace: Option<String>,
}

impl ErrorEvent {
    /// 在调用处报告一个运行时错误
    #[track_caller]
    pub fn runtime(code: u32, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            source: ErrorSource::RuntimeError { code },
            message: message.into(),
            file: location.file().to_string(),
            line: location.line(),
            trace: None,
        }
    }

    /// 由未处理的错误值构造，调用链由 `source()` 逐级展开
    #[track_caller]
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        Self::from_error_at(err, Location::caller())
    }

    /// 同 `from_error`，位置由调用者给出
    pub fn from_error_at(err: &(dyn Error + 'static), location: &Location<'_>) -> Self {
        Self::exception(err.to_string(), location.file(), location.line(), error_chain(err))
    }

    /// 显式给出位置与调用链的异常
    pub fn exception(
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        trace: impl Into<String>,
    ) -> Self {
        Self {
            source: ErrorSource::UncaughtException,
            message: message.into(),
            file: file.into(),
            line,
            trace: Some(trace.into()),
        }
    }

    pub fn fatal(
        kind: u32,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            source: ErrorSource::FatalShutdown { kind },
            message: message.into(),
            file: file.into(),
            line,
            trace: None,
        }
    }

    pub fn source(&self) -> ErrorSource {
        self.source
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    /// 关闭阶段的错误只有命中致命掩码时才需要渲染
    pub fn is_renderable(&self) -> bool {
        match self.source {
            ErrorSource::FatalShutdown { kind } => kind & FATAL_MASK != 0,
            _ => true,
        }
    }
}

fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut lines = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        lines.push(format!("#{} {}", lines.len(), e));
        current = e.source();
    }
    lines.join("\n")
}

/// 拦截器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorState {
    /// 已就绪，调试开关仍为默认值（关闭）
    Armed,
    /// 调试开关已根据运行环境确定
    DebugConfigured,
}

/// 处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 正常响应已发送
    Sent(SendOutcome),
    /// 失败已被渲染为错误页面，当前请求到此结束
    Rendered,
    /// 非致命的关闭阶段错误，未做任何输出
    Ignored,
    /// 底层传输写入失败，无法继续输出
    Aborted,
}

/// 按请求构造的错误拦截器
#[derive(Debug, Clone)]
pub struct ErrorInterceptor {
    id: u128,
    state: InterceptorState,
    debug: bool,
}

impl ErrorInterceptor {
    /// 为一次请求构造拦截器，调试模式默认关闭
    pub fn arm(id: u128) -> Self {
        debug!("[ID{}]错误拦截器已就绪", id);
        Self {
            id,
            state: InterceptorState::Armed,
            debug: false,
        }
    }

    /// 根据是否为生产环境设置调试开关，可重复调用
    pub fn configure(&mut self, is_prod: bool) -> &mut Self {
        self.debug = !is_prod;
        self.state = InterceptorState::DebugConfigured;
        debug!("[ID{}]调试模式：{}", self.id, self.debug);
        self
    }

    /// `environment != "prod"` 时开启调试模式
    pub fn configure_from(&mut self, config: &Config) -> &mut Self {
        self.configure(config.is_prod())
    }

    pub fn state(&self) -> InterceptorState {
        self.state
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// 渲染错误页面 HTML。调试模式下原样插入事件内容，不做转义。
    pub fn render(&self, event: &ErrorEvent) -> String {
        let block = if self.debug {
            let trace = match event.source {
                ErrorSource::UncaughtException => event.trace().unwrap_or(""),
                _ => "",
            };
            format!(
                "<p><strong>Message:</strong> {}</p><p><strong>File:</strong> {}</p><p><strong>Line:</strong> {}</p><pre>{}</pre>",
                event.message, event.file, event.line, trace
            )
        } else {
            GENERIC_BLOCK.to_string()
        };
        format!("{}{}{}", PAGE_HEAD, block, PAGE_TAIL)
    }

    /// 渲染并发送错误页面。
    ///
    /// 未命中致命掩码的关闭阶段错误返回 `Ignored`；其余情况以 500 响应发送，返回 `Rendered`。
    pub fn handle(
        &self,
        event: &ErrorEvent,
        builder: &ResponseBuilder,
        transport: &mut dyn Transport,
    ) -> Disposition {
        let id = self.id;
        if !event.is_renderable() {
            debug!("[ID{}]忽略非致命的关闭阶段错误：{}", id, event.message);
            return Disposition::Ignored;
        }
        error!(
            "[ID{}]{}: {} ({}:{})",
            id, event.source, event.message, event.file, event.line
        );

        let html = self.render(event);
        let mut response = match builder.build(html, 500, no_headers()) {
            Ok(r) => r,
            Err(e) => {
                error!("[ID{}]无法构造错误页面：{}", id, e);
                return Disposition::Aborted;
            }
        };
        match Transmitter::new(id).send(&mut response, transport) {
            Ok(_) => Disposition::Rendered,
            Err(e) => {
                error!("[ID{}]发送错误页面失败：{}", id, e);
                Disposition::Aborted
            }
        }
    }

    /// 在拦截器保护下执行请求处理函数并发送其结果。
    ///
    /// - 返回 `Ok(response)`：正常发送；
    /// - 返回 `Err(e)`：作为 UncaughtException 渲染，文件与行号为 `run` 的调用处；
    /// - 发生 panic：作为 FatalShutdown（`E_ERROR`）渲染，位置取自 panic 钩子。
    #[track_caller]
    pub fn run<F>(
        &self,
        builder: &ResponseBuilder,
        transport: &mut dyn Transport,
        handler: F,
    ) -> Disposition
    where
        F: FnOnce() -> Result<Response, Box<dyn Error>>,
    {
        let caller = Location::caller();
        match panic::catch_unwind(AssertUnwindSafe(handler)) {
            Ok(Ok(mut response)) => match Transmitter::new(self.id).send(&mut response, transport) {
                Ok(outcome) => Disposition::Sent(outcome),
                Err(_) => Disposition::Aborted,
            },
            Ok(Err(err)) => {
                let event = ErrorEvent::from_error_at(err.as_ref(), caller);
                self.handle(&event, builder, transport)
            }
            Err(payload) => {
                let event = take_last_panic().unwrap_or_else(|| {
                    ErrorEvent::fatal(E_ERROR, panic_message(payload.as_ref()), "unknown", 0)
                });
                self.handle(&event, builder, transport)
            }
        }
    }
}

const GENERIC_BLOCK: &str = "<h1>Oops, something went wrong</h1><p>We're sorry, but an unexpected error occurred. Please try again later.</p>";

const PAGE_HEAD: &str = "<html lang='en'><head><title>Exception</title><link rel=\"stylesheet\" href=\"https://cdnjs.cloudflare.com/ajax/libs/materialize/1.0.0/css/materialize.min.css\"><style>body {background-color: #f5f5f5;}.exception {margin: 20px auto;max-width: 90%;padding: 20px;}.exception h1 {color: #c0392b;font-size: 2.5rem;margin-top: 0;margin-bottom: 0.5rem;}.exception p:first-child {margin: 10px 0;font-size: 1.2rem;font-weight: 400;line-height: 1.5;}.exception pre {background-color: #eee;border: 1px solid #ddd;border-radius: 4px;font-size: 12px;padding: 10px;white-space: pre-wrap;}</style></head><body><div class=\"exception\">";

const PAGE_TAIL: &str = "</div></body></html>";

thread_local! {
    static LAST_PANIC: RefCell<Option<ErrorEvent>> = RefCell::new(None);
}

static PANIC_HOOK: Once = Once::new();

/// 安装进程级 panic 钩子，重复调用无副作用。
///
/// 钩子把 panic 的消息与位置记录到当前线程的槽位中，代替默认的 stderr 输出。
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        panic::set_hook(Box::new(|info| {
            let message = panic_message(info.payload());
            let (file, line) = info
                .location()
                .map(|l| (l.file().to_string(), l.line()))
                .unwrap_or_else(|| ("unknown".to_string(), 0));
            error!("panic: {} ({}:{})", message, file, line);
            let event = ErrorEvent::fatal(E_ERROR, message, file, line);
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(event));
        }));
    });
}

/// 取走当前线程最近一次 panic 的记录
pub fn take_last_panic() -> Option<ErrorEvent> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exception::Exception,
        param::{E_NOTICE, E_PARSE, E_WARNING},
        transmit::WireTransport,
    };

    fn debug_interceptor() -> ErrorInterceptor {
        let mut interceptor = ErrorInterceptor::arm(0);
        interceptor.configure(false);
        interceptor
    }

    fn prod_interceptor() -> ErrorInterceptor {
        let mut interceptor = ErrorInterceptor::arm(0);
        interceptor.configure(true);
        interceptor
    }

    fn sent(transport: WireTransport<Vec<u8>>) -> String {
        String::from_utf8(transport.into_inner()).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let mut interceptor = ErrorInterceptor::arm(1);
        assert_eq!(interceptor.state(), InterceptorState::Armed);
        assert!(!interceptor.is_debug());

        interceptor.configure(false);
        assert_eq!(interceptor.state(), InterceptorState::DebugConfigured);
        assert!(interceptor.is_debug());

        interceptor.configure(true);
        assert!(!interceptor.is_debug());
    }

    #[test]
    fn test_configure_from_config() {
        let mut interceptor = ErrorInterceptor::arm(0);
        let prod = Config::from_toml_str("environment = \"prod\"").unwrap();
        let staging = Config::from_toml_str("environment = \"staging\"").unwrap();

        interceptor.configure_from(&prod);
        assert!(!interceptor.is_debug());
        interceptor.configure_from(&staging);
        assert!(interceptor.is_debug());
    }

    #[test]
    fn test_debug_page_shows_details() {
        let event = ErrorEvent::exception("Oops", "src/a.rs", 10, "#0 main");
        let html = debug_interceptor().render(&event);
        assert!(html.contains("Oops"));
        assert!(html.contains("src/a.rs"));
        assert!(html.contains("10"));
        assert!(html.contains("<pre>#0 main</pre>"));
    }

    #[test]
    fn test_prod_page_hides_details() {
        let event = ErrorEvent::exception("Oops", "src/a.rs", 10, "#0 secret-trace");
        let html = prod_interceptor().render(&event);
        assert!(html.contains("Oops, something went wrong"));
        assert!(!html.contains("Oops</p>"));
        assert!(!html.contains("src/a.rs"));
        assert!(!html.contains("secret-trace"));
        assert!(!html.contains("Line:"));
    }

    #[test]
    fn test_prod_page_is_fixed() {
        let interceptor = prod_interceptor();
        let a = interceptor.render(&ErrorEvent::runtime(2, "first"));
        let b = interceptor.render(&ErrorEvent::fatal(E_ERROR, "second", "b.rs", 3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_trace_only_for_exceptions() {
        let event = ErrorEvent::runtime(E_WARNING, "division by zero");
        let html = debug_interceptor().render(&event);
        assert!(html.contains("division by zero"));
        assert!(html.contains("<pre></pre>"));
        assert!(event.file().ends_with("interceptor.rs"));
    }

    #[test]
    fn test_debug_page_is_not_escaped() {
        let event = ErrorEvent::runtime(1, "<b>raw</b>");
        assert!(debug_interceptor().render(&event).contains("<b>raw</b>"));
    }

    #[test]
    fn test_handle_sends_500() {
        let mut transport = WireTransport::new(Vec::new());
        let disposition = debug_interceptor().handle(
            &ErrorEvent::runtime(1, "boom"),
            &ResponseBuilder::with_protocol("HTTP/1.1"),
            &mut transport,
        );
        assert_eq!(disposition, Disposition::Rendered);
        let text = sent(transport);
        assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn test_shutdown_mask() {
        let interceptor = debug_interceptor();
        let builder = ResponseBuilder::new();

        for kind in [E_WARNING, E_NOTICE] {
            let mut transport = WireTransport::new(Vec::new());
            let event = ErrorEvent::fatal(kind, "minor", "x.rs", 1);
            assert_eq!(interceptor.handle(&event, &builder, &mut transport), Disposition::Ignored);
            assert!(transport.get_ref().is_empty());
        }

        let mut transport = WireTransport::new(Vec::new());
        let event = ErrorEvent::fatal(E_PARSE, "syntax error", "x.rs", 1);
        assert_eq!(interceptor.handle(&event, &builder, &mut transport), Disposition::Rendered);
        assert!(sent(transport).contains("syntax error"));
    }

    #[test]
    fn test_run_sends_normal_response() {
        let builder = ResponseBuilder::new();
        let mut transport = WireTransport::new(Vec::new());
        let disposition = prod_interceptor().run(&builder, &mut transport, || {
            Ok(builder.build("fine", 200, no_headers())?)
        });
        assert_eq!(disposition, Disposition::Sent(SendOutcome::Complete));
        assert!(sent(transport).ends_with("fine"));
    }

    #[test]
    fn test_run_renders_returned_error() {
        let builder = ResponseBuilder::new();
        let mut transport = WireTransport::new(Vec::new());
        let disposition = debug_interceptor().run(&builder, &mut transport, || {
            Ok(builder.build("", 999, no_headers())?)
        });
        assert_eq!(disposition, Disposition::Rendered);
        let text = sent(transport);
        assert!(text.starts_with("HTTP/1.0 500 Internal Server Error"));
        assert!(text.contains(&Exception::UnknownStatusCode(999).to_string()));
        assert!(text.contains("<pre>#0 Status 999 not found.</pre>"));
    }

    #[test]
    fn test_run_renders_panic() {
        install_panic_hook();
        let builder = ResponseBuilder::new();
        let mut transport = WireTransport::new(Vec::new());
        let disposition = debug_interceptor().run(&builder, &mut transport, || {
            panic!("handler exploded");
        });
        assert_eq!(disposition, Disposition::Rendered);
        let text = sent(transport);
        assert!(text.contains("handler exploded"));
        assert!(text.contains("interceptor.rs"));
        assert!(take_last_panic().is_none());
    }

    #[test]
    fn test_run_panic_in_prod_is_generic() {
        install_panic_hook();
        let builder = ResponseBuilder::new();
        let mut transport = WireTransport::new(Vec::new());
        prod_interceptor().run(&builder, &mut transport, || panic!("secret detail"));
        let text = sent(transport);
        assert!(text.contains("Oops, something went wrong"));
        assert!(!text.contains("secret detail"));
    }

    #[test]
    fn test_from_error_at_uses_given_location() {
        let location = Location::caller();
        let err = Exception::UndefinedFunction("missing".to_string());
        let event = ErrorEvent::from_error_at(&err, location);
        assert_eq!(event.file(), location.file());
        assert_eq!(event.line(), location.line());
    }

    #[test]
    fn test_error_chain_in_trace() {
        #[derive(Debug)]
        struct Outer(Exception);
        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "controller failed")
            }
        }
        impl Error for Outer {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(Exception::TemplateNotFound("home".to_string()));
        let event = ErrorEvent::from_error(&err);
        assert_eq!(event.source(), ErrorSource::UncaughtException);
        assert_eq!(
            event.trace(),
            Some("#0 controller failed\n#1 Template file home not found")
        );
    }
}
