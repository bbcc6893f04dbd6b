// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # webframe 演示服务器
//!
//! 基于 Tokio 运行时的多线程服务器，演示响应层与错误拦截层的完整链路：
//! - 每个连接构造独立的 `ErrorInterceptor`，调试开关按请求从配置刷新；
//! - 请求处理函数在拦截器保护下执行，返回的错误与 panic 都被渲染为 500 页面；
//! - 响应先写入内存传输，再一次性写回 Socket；
//! - 后台管理控制台（CLI 指令交互）。

use std::{
    error::Error,
    net::{Ipv4Addr, SocketAddrV4},
    sync::{Arc, Mutex},
    time::Instant,
};

use log::{debug, error, info, warn};
use serde_json::json;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

use webframe::{
    interceptor::install_panic_hook,
    param::SERVER_NAME,
    response::no_headers,
    Config, Controller, Disposition, ErrorInterceptor, Request, Response, ResponseBuilder,
    Template, TemplateContext, WireTransport,
};

fn main() {
    // 1. 初始化日志系统：log4rs 通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
    }

    // 2. 配置加载：config.local.toml 优先于 config.toml
    let config = match Config::load("config") {
        Ok(c) => c,
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };
    info!("配置文件已载入，运行环境：{}", config.environment());

    // 3. 进程级 panic 钩子，只在启动时安装一次
    install_panic_hook();

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(r) => r,
        Err(e) => {
            error!("无法构建 Tokio 运行时：{}", e);
            return;
        }
    };
    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, port);
    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("服务端在{}上监听Socket连接", socket);

    let config = Arc::new(config);
    let shutdown_flag = Arc::new(Mutex::new(false));
    let active_connection = Arc::new(Mutex::new(0u32));

    // 后台管理控制台
    tokio::spawn({
        let shutdown_flag = Arc::clone(&shutdown_flag);
        let active_connection = Arc::clone(&active_connection);
        async move {
            let mut reader = BufReader::new(tokio::io::stdin());
            let mut input = String::new();
            loop {
                input.clear();
                match reader.read_line(&mut input).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                match input.trim() {
                    "stop" => {
                        if let Ok(mut flag) = shutdown_flag.lock() {
                            *flag = true;
                        }
                        println!("停机指令已激活，服务器将在处理完下一个请求后关闭...");
                        break;
                    }
                    "status" => {
                        let active_count = active_connection.lock().map(|c| *c).unwrap_or(0);
                        println!("当前活跃连接数: {}", active_count);
                    }
                    "help" => {
                        println!("stop   - 发出停机信号");
                        println!("status - 查看当前服务器运行状态");
                        println!("help   - 显示此帮助信息");
                    }
                    cmd => println!("无效的命令：{}", cmd),
                }
            }
        }
    });

    let mut id: u128 = 0;
    loop {
        if shutdown_flag.lock().map(|f| *f).unwrap_or(false) {
            info!("主循环接收到停机指令，正在退出...");
            break;
        }

        let (mut stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!("接受连接失败：{}", e);
                continue;
            }
        };
        debug!("[ID{}]新的连接：{}", id, addr);

        let config = Arc::clone(&config);
        let active_connection = Arc::clone(&active_connection);
        tokio::spawn(async move {
            if let Ok(mut count) = active_connection.lock() {
                *count += 1;
            }
            handle_connection(&mut stream, id, config).await;
            if let Ok(mut count) = active_connection.lock() {
                *count -= 1;
            }
        });
        id += 1;
    }
}

/// # 连接处理器
///
/// 读取请求、在拦截器保护下生成响应，最后写回客户端。
async fn handle_connection(stream: &mut TcpStream, id: u128, config: Arc<Config>) {
    let mut buffer = vec![0; 4096];
    let n = match stream.read(&mut buffer).await {
        Ok(0) => return,
        Ok(n) => n,
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    };
    let start_time = Instant::now();

    // 拦截器按请求构造，调试开关随配置刷新
    let mut interceptor = ErrorInterceptor::arm(id);
    interceptor.configure_from(&config);
    let mut transport = WireTransport::new(Vec::new());

    let disposition = match Request::try_from(&buffer[..n], id) {
        Ok(mut request) => {
            select_locale(&mut request, &config);
            info!(
                "[ID{}] {} {} {} {}",
                id,
                request.protocol(),
                request.method(),
                request.path(),
                request.user_agent()
            );
            let builder = ResponseBuilder::for_request(&request);
            interceptor.run(&builder, &mut transport, || dispatch(&request, &config))
        }
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}", id, e);
            let builder = ResponseBuilder::new();
            interceptor.run(&builder, &mut transport, || {
                let html = format!("<h1>400 Bad Request</h1><p>{}</p>", e);
                Ok(builder.build(html, 400, [("Connection", "close")])?)
            })
        }
    };

    debug!(
        "[ID{}]处理结果 {:?}，服务端用时{}ms",
        id,
        disposition,
        start_time.elapsed().as_millis()
    );
    if disposition == Disposition::Aborted {
        return;
    }

    let bytes = transport.into_inner();
    if let Err(e) = stream.write_all(&bytes).await {
        error!("[ID{}]写回响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}

/// 默认语言来自配置；查询参数 `lang` 命中可用语言表时切换
fn select_locale(request: &mut Request, config: &Config) {
    request.configure_locale(config);
    let lang = request.query().get_filtered("lang", 16);
    if request.locale_array().contains_key(&lang) {
        request.set_locale(&lang);
    }
}

/// 演示用的请求分发
fn dispatch(request: &Request, config: &Config) -> Result<Response, Box<dyn Error>> {
    let mut template = Template::new(config.root());
    let mut controller = Controller::new(request, &mut template);

    let mut response = match request.path() {
        "/" => {
            let mut ctx = TemplateContext::new();
            ctx.insert("title", SERVER_NAME)?;
            ctx.insert("locale", request.locale())?;
            ctx.insert("environment", config.environment())?;
            controller.render("index", &ctx)?
        }
        "/status" => controller.json(
            &json!({
                "server": SERVER_NAME,
                "environment": config.environment(),
                "locale": request.locale(),
                "query": request.query(),
            }),
            200,
            no_headers(),
        )?,
        "/home" => controller.redirect("/", 302)?,
        _ if request.accepts_json() => controller.json(
            &json!({ "error": "Not Found", "path": request.path() }),
            404,
            no_headers(),
        )?,
        _ => controller
            .builder()
            .build("<h1>404 Not Found</h1>", 404, no_headers())?,
    };
    response.merge_headers([("Server", SERVER_NAME), ("Connection", "close")])?;
    Ok(response)
}
