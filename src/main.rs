// Category CLI / HTTP Server: Site Inliner
//
// `site-inliner serve` accepts multipart uploads and answers with the
// flattened document; `site-inliner bundle` does the same for local files.

use anyhow::Result;
use env_logger::Env;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    site_inliner::cli::run_from_env().await
}
