use std::sync::Arc;

use tokio::net::TcpStream;

use hearth::config::Config;
use hearth::http::request::Request;
use hearth::http::response::{self, StatusCode};
use hearth::http::writer::ResponseWriter;
use hearth::proxy::ProxyHandler;
use hearth::server::Server;

const WELCOME_PAGE: &str = r#"<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>The request was parsed and answered over a bare TCP stream.</p>
  </body>
</html>"#;

const BAD_REQUEST_PAGE: &str = r#"<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>This route always reports a client error.</p>
  </body>
</html>"#;

const INTERNAL_ERROR_PAGE: &str = r#"<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>This route always reports a server error.</p>
  </body>
</html>"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let proxy = Arc::new(ProxyHandler::new(&cfg.upstream)?);

    let server = Server::serve(
        &cfg.listen_addr,
        move |writer: ResponseWriter<TcpStream>, request: Request| {
            let proxy = Arc::clone(&proxy);
            async move { route(proxy, writer, request).await }
        },
    )
    .await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    server.close().await;

    Ok(())
}

async fn route(
    proxy: Arc<ProxyHandler>,
    writer: ResponseWriter<TcpStream>,
    request: Request,
) -> anyhow::Result<()> {
    tracing::debug!(method = %request.method, target = %request.target, "handling request");

    if let Some(path) = request.target.strip_prefix("/upstream/") {
        let target = format!("/{path}");
        return proxy.forward(writer, &target).await;
    }

    match request.target.as_str() {
        "/yourproblem" => page(writer, StatusCode::BadRequest, BAD_REQUEST_PAGE).await,
        "/myproblem" => page(writer, StatusCode::InternalServerError, INTERNAL_ERROR_PAGE).await,
        _ => page(writer, StatusCode::Ok, WELCOME_PAGE).await,
    }
}

async fn page(
    mut writer: ResponseWriter<TcpStream>,
    status: StatusCode,
    body: &str,
) -> anyhow::Result<()> {
    let mut headers = response::default_headers(body.len());
    headers.replace("Content-Type", "text/html");

    writer.write_status_line(status).await?;
    writer.write_headers(&headers).await?;
    writer.write_body(body.as_bytes()).await?;
    Ok(())
}
