// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 响应发送模块
//!
//! `Transmitter` 把一个 `Response` 写入底层传输：
//! - 状态行与响应头只发送一次（headers-sent 锁）：传输已发送过头部，
//!   或该 `Response` 已经发送过，都视为锁已持有；
//! - 状态码处于 300–308 时，发送完头部后立即结束，不发送响应体；
//! - 其余情况原样发送响应体。
//!
//! `send` 只应对同一个 `Response` 调用一次。重复调用不会再次发送头部，
//! 但会再次发送响应体。

use std::io::{self, Write};

use log::{debug, error};

use crate::{param::CRLF, response::Response};

/// 单次 HTTP 交换所使用的底层传输。
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// 当前交换是否已经发送过状态行与响应头
    fn headers_sent(&self) -> bool;
    /// 写入完整的头部块（状态行、响应头、空行）
    fn write_head(&mut self, head: &[u8]) -> io::Result<()>;
    /// 写入响应体
    fn write_body(&mut self, body: &[u8]) -> io::Result<()>;
}

/// 基于任意 `io::Write` 的传输，自行维护 headers-sent 锁。
#[derive(Debug)]
pub struct WireTransport<W: Write> {
    writer: W,
    headers_sent: bool,
}

impl<W: Write> WireTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            headers_sent: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Transport for WireTransport<W> {
    fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn write_head(&mut self, head: &[u8]) -> io::Result<()> {
        self.writer.write_all(head)?;
        self.headers_sent = true;
        Ok(())
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.writer.write_all(body)?;
        self.writer.flush()
    }
}

/// `send` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// 头部与响应体均已发送
    Complete,
    /// 重定向：头部已发送，响应体被省略，当前处理流程应就此结束
    Redirected,
    /// 头部此前已发送，本次只发送了响应体
    BodyOnly,
}

pub struct Transmitter {
    id: u128,
}

impl Transmitter {
    /// `id` 仅用于日志追踪
    pub fn new(id: u128) -> Self {
        Self { id }
    }

    pub fn send(
        &self,
        response: &mut Response,
        transport: &mut dyn Transport,
    ) -> io::Result<SendOutcome> {
        let id = self.id;
        if response.is_sent() || transport.headers_sent() {
            debug!("[ID{}]头部已发送，跳过状态行与响应头", id);
            transport.write_body(response.content()).map_err(|e| {
                error!("[ID{}]发送响应体失败: {}", id, e);
                e
            })?;
            return Ok(SendOutcome::BodyOnly);
        }

        let head = compose_head(response);
        transport.write_head(head.as_bytes()).map_err(|e| {
            error!("[ID{}]发送响应头失败: {}", id, e);
            e
        })?;
        response.sent = true;

        if response.is_redirect() {
            debug!(
                "[ID{}]重定向 {} -> {}",
                id,
                response.status_code(),
                response.headers().get("Location").unwrap_or("")
            );
            return Ok(SendOutcome::Redirected);
        }

        transport.write_body(response.content()).map_err(|e| {
            error!("[ID{}]发送响应体失败: {}", id, e);
            e
        })?;
        debug!("[ID{}]响应发送完成，响应体 {} bytes", id, response.content().len());
        Ok(SendOutcome::Complete)
    }
}

/// 状态行：`<protocol> <code> <reason>`
pub fn status_line(response: &Response) -> String {
    format!(
        "{} {} {}",
        response.protocol(),
        response.status_code(),
        response.status_text()
    )
}

/// 响应头行（不含状态行）。
///
/// `Content-Type` 替换此前已出现的同名行，其余响应头一律追加，
/// 随后每条 Cookie 追加一行 `Set-Cookie`。
pub fn header_lines(response: &Response) -> Vec<String> {
    let mut lines: Vec<String> = Vec::with_capacity(response.headers().len() + response.cookies().len());
    for (name, value) in response.headers().iter() {
        let line = format!("{}: {}", name, value);
        if name.eq_ignore_ascii_case("Content-Type") {
            if let Some(previous) = lines.iter().position(|l| is_content_type_line(l)) {
                lines[previous] = line;
                continue;
            }
        }
        lines.push(line);
    }
    for cookie in response.cookies().iter() {
        lines.push(format!("Set-Cookie: {}", cookie.to_header_value()));
    }
    lines
}

fn is_content_type_line(line: &str) -> bool {
    line.split_once(':')
        .map_or(false, |(name, _)| name.eq_ignore_ascii_case("Content-Type"))
}

/// 线上格式的头部块：状态行在前，随后是响应头行与空行
pub fn compose_head(response: &Response) -> String {
    let mut head = status_line(response);
    head.push_str(CRLF);
    for line in header_lines(response) {
        head.push_str(&line);
        head.push_str(CRLF);
    }
    head.push_str(CRLF);
    head
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cookie::Cookie, response::no_headers, response::ResponseBuilder};
    use mockall::Sequence;

    fn sent_text(transport: &WireTransport<Vec<u8>>) -> String {
        String::from_utf8_lossy(transport.get_ref()).to_string()
    }

    #[test]
    fn test_send_complete() {
        let mut response = ResponseBuilder::with_protocol("HTTP/1.1")
            .build("<p>hi</p>", 200, [("X-Extra", "1")])
            .unwrap();
        let mut transport = WireTransport::new(Vec::new());

        let outcome = Transmitter::new(0).send(&mut response, &mut transport).unwrap();

        assert_eq!(outcome, SendOutcome::Complete);
        assert!(response.is_sent());
        let text = sent_text(&transport);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/html; charset=UTF-8\r\n"));
        assert!(text.contains("Cache-Control: no-cache, no-store, must-revalidate\r\n"));
        assert!(text.contains("Pragma: no-cache\r\n"));
        assert!(text.contains("Expires: 0\r\n"));
        assert!(text.contains("X-Extra: 1\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>hi</p>"));
    }

    #[test]
    fn test_header_order_and_cookies() {
        let mut response = Response::new("", 200, [("X-A", "a")]).unwrap();
        response
            .set_cookie(Cookie::new("first", "1"))
            .unwrap()
            .set_cookie(Cookie::new("second", "2"))
            .unwrap();
        let lines = header_lines(&response);
        assert_eq!(lines[0], "Content-Type: text/html; charset=UTF-8");
        assert_eq!(lines[4], "X-A: a");
        assert!(lines[5].starts_with("Set-Cookie: first=1;"));
        assert!(lines[6].starts_with("Set-Cookie: second=2;"));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_redirect_sends_no_body() {
        let mut response = ResponseBuilder::new().redirect("/home", 302).unwrap();
        response.set_content("should not appear");
        let mut transport = WireTransport::new(Vec::new());

        let outcome = Transmitter::new(0).send(&mut response, &mut transport).unwrap();

        assert_eq!(outcome, SendOutcome::Redirected);
        let text = sent_text(&transport);
        assert!(text.starts_with("HTTP/1.0 302 Found\r\n"));
        assert!(text.contains("Location: /home\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
        assert!(!text.contains("should not appear"));
    }

    #[test]
    fn test_second_send_only_repeats_body() {
        let mut response = Response::new("body", 200, no_headers()).unwrap();
        let mut transport = WireTransport::new(Vec::new());
        let transmitter = Transmitter::new(0);

        assert_eq!(
            transmitter.send(&mut response, &mut transport).unwrap(),
            SendOutcome::Complete
        );
        assert_eq!(
            transmitter.send(&mut response, &mut transport).unwrap(),
            SendOutcome::BodyOnly
        );

        let text = sent_text(&transport);
        assert_eq!(text.matches("HTTP/1.0 200 OK").count(), 1);
        assert_eq!(text.matches("Content-Type:").count(), 1);
        // 单次使用约定：第二次调用会再次写出响应体
        assert!(text.ends_with("bodybody"));
    }

    #[test]
    fn test_sent_response_keeps_lock_on_new_transport() {
        let mut response = Response::new("body", 200, no_headers()).unwrap();
        let transmitter = Transmitter::new(0);

        let mut first = WireTransport::new(Vec::new());
        transmitter.send(&mut response, &mut first).unwrap();
        assert!(response.is_sent());

        let mut second = WireTransport::new(Vec::new());
        assert_eq!(
            transmitter.send(&mut response, &mut second).unwrap(),
            SendOutcome::BodyOnly
        );
        assert_eq!(sent_text(&second), "body");
        assert!(!second.headers_sent());
    }

    #[test]
    fn test_sent_response_never_writes_head() {
        let mut response = Response::new("again", 200, no_headers()).unwrap();
        response.sent = true;
        let mut transport = MockTransport::new();
        transport.expect_headers_sent().never();
        transport.expect_write_head().never();
        transport
            .expect_write_body()
            .withf(|body: &[u8]| body == b"again")
            .times(1)
            .returning(|_| Ok(()));

        let outcome = Transmitter::new(0).send(&mut response, &mut transport).unwrap();
        assert_eq!(outcome, SendOutcome::BodyOnly);
    }

    #[test]
    fn test_head_written_before_body() {
        let mut response = Response::new("payload", 404, no_headers()).unwrap();
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_headers_sent()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(false);
        transport
            .expect_write_head()
            .withf(|head: &[u8]| head.starts_with(b"HTTP/1.0 404 Not Found\r\n"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        transport
            .expect_write_body()
            .withf(|body: &[u8]| body == b"payload")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let outcome = Transmitter::new(7).send(&mut response, &mut transport).unwrap();
        assert_eq!(outcome, SendOutcome::Complete);
    }

    #[test]
    fn test_locked_transport_skips_head() {
        let mut response = Response::new("late", 200, no_headers()).unwrap();
        let mut transport = MockTransport::new();
        transport.expect_headers_sent().return_const(true);
        transport.expect_write_head().never();
        transport
            .expect_write_body()
            .withf(|body: &[u8]| body == b"late")
            .times(1)
            .returning(|_| Ok(()));

        let outcome = Transmitter::new(0).send(&mut response, &mut transport).unwrap();
        assert_eq!(outcome, SendOutcome::BodyOnly);
        assert!(!response.is_sent());
    }

    #[test]
    fn test_write_error_propagates() {
        let mut response = Response::new("x", 200, no_headers()).unwrap();
        let mut transport = MockTransport::new();
        transport.expect_headers_sent().return_const(false);
        transport
            .expect_write_head()
            .returning(|_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")));
        transport.expect_write_body().never();

        let result = Transmitter::new(0).send(&mut response, &mut transport);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert!(!response.is_sent());
    }
}
