//! Application routes served by the `minihttpd` binary.
//!
//! These handlers only use the public registration surface of
//! [`HttpServer`]; none of them are needed by the server itself.

use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use log::info;

use crate::parser::{HttpRequest, Method};
use crate::server::{Error, HttpResponse, HttpServer, Params, StatusCode};

/// Register every application route on the server.
///
/// The file routes are only registered when the server has a resource
/// directory configured.
pub fn register(server: &mut HttpServer) -> Result<(), Error> {
    server
        .add_route("/", Method::GET, root)?
        .add_route("/echo/<to_echo>", Method::GET, echo)?
        .add_route("/user-agent", Method::GET, user_agent)?;

    if let Some(directory) = server.resource_directory().map(Path::to_path_buf) {
        let directory = Arc::new(directory);

        let dir = directory.clone();
        server.add_route("/files/<file_name>", Method::GET, move |req, params| {
            get_file(dir.clone(), req, params)
        })?;

        let dir = directory;
        server.add_route("/files/<file_name>", Method::POST, move |req, params| {
            post_file(dir.clone(), req, params)
        })?;
    }

    Ok(())
}

async fn root(_req: HttpRequest, _params: Params) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::new(StatusCode::Ok))
}

async fn echo(req: HttpRequest, params: Params) -> Result<HttpResponse, Error> {
    let to_echo = params.get("to_echo").cloned().unwrap_or_default();
    let response = HttpResponse::new(StatusCode::Ok).with_content_type("text/plain");

    if accepts_gzip(&req) {
        let compressed = gzip(to_echo.as_bytes())?;
        return Ok(response
            .with_header("Content-Encoding", "gzip")
            .with_body_bytes(compressed));
    }

    Ok(response.with_body_string(to_echo))
}

async fn user_agent(req: HttpRequest, _params: Params) -> Result<HttpResponse, Error> {
    let Some(agent) = req.get_header("User-Agent") else {
        return Ok(HttpResponse::new(StatusCode::BadRequest));
    };

    Ok(HttpResponse::new(StatusCode::Ok)
        .with_content_type("text/plain")
        .with_body_string(agent))
}

async fn get_file(directory: Arc<PathBuf>, _req: HttpRequest, params: Params) -> Result<HttpResponse, Error> {
    let Some(path) = resolve(&directory, &params) else {
        return Ok(HttpResponse::new(StatusCode::Forbidden));
    };

    match tokio::fs::read(&path).await {
        Ok(contents) => Ok(HttpResponse::new(StatusCode::Ok)
            .with_content_type("application/octet-stream")
            .with_body_bytes(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Ok(HttpResponse::new(StatusCode::NotFound))
        }
        Err(e) => Err(e.into()),
    }
}

async fn post_file(directory: Arc<PathBuf>, req: HttpRequest, params: Params) -> Result<HttpResponse, Error> {
    let Some(path) = resolve(&directory, &params) else {
        return Ok(HttpResponse::new(StatusCode::Forbidden));
    };

    tokio::fs::write(&path, &req.body).await?;
    info!("Stored {len} bytes in {path}", len = req.body.len(), path = path.display());

    Ok(HttpResponse::new(StatusCode::Created))
}

/// Join the captured file name onto the directory. Only a single plain
/// path component is accepted.
fn resolve(directory: &Path, params: &Params) -> Option<PathBuf> {
    let name = Path::new(params.get("file_name")?);
    let mut components = name.components();

    match (components.next(), components.next()) {
        (Some(Component::Normal(file)), None) => Some(directory.join(file)),
        _ => None,
    }
}

fn accepts_gzip(req: &HttpRequest) -> bool {
    req.get_header("Accept-Encoding").is_some_and(|encodings| {
        encodings
            .split(',')
            .any(|encoding| encoding.trim().eq_ignore_ascii_case("gzip"))
    })
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
