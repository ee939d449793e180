//! Fetch command - issue a request through the active worker

use crate::cli::args::FetchArgs;
use crate::cli::Environment;
use crate::error::{StreamsError, StreamsResult};
use crate::http::{Request, RequestMode, Response};
use std::io::Write;
use tokio::fs;
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, env: &Environment) -> StreamsResult<()> {
    let request = build_request(&args, env)?;
    let registry = env.registry().await?;

    debug!("Fetching {} {}", request.method, request.url);
    let response = registry.fetch(request).await?;

    if args.include {
        print_head(&response);
    }

    match args.output {
        Some(path) => fs::write(&path, &response.body)
            .await
            .map_err(|e| StreamsError::io(format!("writing {}", path.display()), e))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&response.body)
                .and_then(|_| stdout.flush())
                .map_err(|e| StreamsError::io("writing response body", e))?;
        }
    }
    Ok(())
}

fn build_request(args: &FetchArgs, env: &Environment) -> StreamsResult<Request> {
    let mut request = Request::resolve(&args.url, &env.origin()?)?;
    request.method = args.method.to_ascii_uppercase();
    if args.no_cors {
        request = request.with_mode(RequestMode::NoCors);
    }
    for (name, value) in &args.headers {
        request = request.with_header(name.clone(), value.clone());
    }
    if let Some(ref data) = args.data {
        request = request.with_body(data.clone().into_bytes());
    }
    Ok(request)
}

fn print_head(response: &Response) {
    println!(
        "{} {} ({})",
        response.status, response.status_text, response.kind
    );
    for (name, value) in &response.headers {
        println!("{}: {}", name, value);
    }
    println!();
}
