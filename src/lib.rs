pub mod config;
pub mod controller;
pub mod cookie;
pub mod exception;
pub mod header;
pub mod interceptor;
pub mod param;
pub mod request;
pub mod response;
pub mod template;
pub mod transmit;

pub use config::Config;
pub use controller::Controller;
pub use cookie::{Cookie, CookieJar};
pub use exception::Exception;
pub use header::HeaderSet;
pub use interceptor::{Disposition, ErrorEvent, ErrorInterceptor, ErrorSource};
pub use param::reason_phrase;
pub use request::Request;
pub use response::{Response, ResponseBuilder};
pub use template::{Template, TemplateContext, TemplateFunctions};
pub use transmit::{SendOutcome, Transmitter, Transport, WireTransport};
