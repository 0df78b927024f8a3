//! List local Docker images over the daemon's Unix socket
//!
//! Run this example with:
//! ```
//! cargo run -p napping --example docker_unixsocket
//! ```

use napping::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let session = Session::new(napping::SessionConfig::new().log(true))?;

    // Socket path and API route share one URL; the split is found on disk.
    let mut images: Vec<serde_json::Value> = Vec::new();
    let response = session
        .get(
            "unix:///var/run/docker.sock/v1.43/images/json",
            None,
            &mut images,
            (),
            None,
        )
        .await?;

    println!("Status: {}", response.status());
    for image in &images {
        println!("{}", image["RepoTags"]);
    }

    Ok(())
}
