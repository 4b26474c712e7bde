use std::sync::Arc;

use actix_web::{dev::Server, middleware, web, App, HttpServer};
use thiserror::Error;

use crate::config::Cli;
use crate::log::{LogError, RecordLog};
use crate::routes;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("log: {0}")]
    Log(#[from] LogError),

    #[error("http: {0}")]
    Io(#[from] std::io::Error),
}

/// Binds the log endpoints to `addr`. The returned server has not been
/// awaited yet.
pub fn new_http_server(
    addr: &str,
    log: Arc<dyn RecordLog>,
    max_body_bytes: usize,
    workers: Option<usize>,
) -> Result<Server, ServerError> {
    let log = web::Data::from(log);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(log.clone())
            .app_data(web::PayloadConfig::new(max_body_bytes))
            .configure(routes::configure)
            .default_service(web::to(routes::not_found))
    });
    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    let server = server.bind(addr)?.run();
    tracing::info!(addr, "listening");
    Ok(server)
}

pub async fn run(cli: Cli) -> Result<(), ServerError> {
    let log = cli.open_log()?;
    new_http_server(&cli.addr, log, cli.max_body_bytes, cli.workers)?.await?;
    tracing::info!("server stopped");
    Ok(())
}
