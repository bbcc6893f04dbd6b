// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde::Serialize;
use serde_json::Value;

use crate::{
    exception::Exception,
    request::Request,
    response::{no_headers, Response, ResponseBuilder},
    template::{escape_html, Template, TemplateContext},
};

/// 单次请求的控制器上下文，把模板渲染与响应构造串在一起。
///
/// 返回的 `Response` 尚未发送，由调用方交给拦截器或 `Transmitter`。
pub struct Controller<'a> {
    request: &'a Request,
    template: &'a mut Template,
    builder: ResponseBuilder,
}

impl<'a> Controller<'a> {
    pub fn new(request: &'a Request, template: &'a mut Template) -> Self {
        Self {
            request,
            template,
            builder: ResponseBuilder::for_request(request),
        }
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn builder(&self) -> &ResponseBuilder {
        &self.builder
    }

    /// 渲染视图为 HTML 字符串
    pub fn render_view(&mut self, view: &str, context: &TemplateContext) -> Result<String, Exception> {
        self.add_functions_to_template();
        self.template.render(view, context)
    }

    /// 渲染视图并包装为 200 HTML 响应
    pub fn render(&mut self, view: &str, context: &TemplateContext) -> Result<Response, Exception> {
        let content = self.render_view(view, context)?;
        self.builder.build(content, 200, no_headers())
    }

    pub fn redirect(&self, url: &str, status_code: u16) -> Result<Response, Exception> {
        self.builder.redirect(url, status_code)
    }

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
        self.builder.json(data, status_code, overrides)
    }

    fn add_functions_to_template(&mut self) {
        let path = self.request.path().to_string();
        self.template
            .register_function("request_path", move |_| Ok(escape_html(&path)));
        self.template.register_function("show_array", |args| {
            Ok(match args.first() {
                Some(v @ Value::Array(_)) | Some(v @ Value::Object(_)) => {
                    let pretty = serde_json::to_string_pretty(v)?;
                    format!("<pre>{}</pre>", escape_html(&pretty))
                }
                _ => String::new(),
            })
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn request() -> Request {
        Request::try_from(b"GET /profile HTTP/1.1\r\nHost: x\r\n\r\n", 0).unwrap()
    }

    #[test]
    fn test_render_uses_request_protocol() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("templates")).unwrap();
        fs::write(
            dir.path().join("templates/profile.html"),
            "<h1>{{ name }}</h1>{{ request_path() }}{{ show_array(tags) }}",
        )
        .unwrap();
        let mut template = Template::new(dir.path());
        let request = request();
        let mut ctx = TemplateContext::new();
        ctx.insert("name", "Ada").unwrap();
        ctx.insert("tags", &vec!["x"]).unwrap();

        let response = Controller::new(&request, &mut template)
            .render("profile", &ctx)
            .unwrap();

        assert_eq!(response.protocol(), "HTTP/1.1");
        assert_eq!(response.status_code(), 200);
        let body = String::from_utf8(response.content().to_vec()).unwrap();
        assert!(body.starts_with("<h1>Ada</h1>/profile<pre>"));
        assert!(body.contains("&quot;x&quot;"));
    }

    #[test]
    fn test_show_array_ignores_scalars() {
        let request = request();
        let mut template = Template::new(".");
        let mut controller = Controller::new(&request, &mut template);
        controller.add_functions_to_template();
        let out = controller
            .template
            .functions()
            .call("show_array", &[json!("text")])
            .unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn test_redirect_and_json() {
        let request = request();
        let mut template = Template::new(".");
        let controller = Controller::new(&request, &mut template);

        let redirect = controller.redirect("/login", 301).unwrap();
        assert_eq!(redirect.headers().get("Location"), Some("/login"));
        assert_eq!(
            controller.redirect("/login", 200),
            Err(Exception::InvalidRedirectStatus(200))
        );

        let json = controller.json(&json!({"ok": true}), 200, no_headers()).unwrap();
        assert_eq!(json.content().as_ref(), b"{\"ok\":true}");
        assert_eq!(json.protocol(), "HTTP/1.1");
    }
}
