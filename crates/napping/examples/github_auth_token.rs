//! Create a GitHub authorization using HTTP Basic auth over HTTPS
//!
//! Run this example with:
//! ```
//! GITHUB_USER=octocat GITHUB_PASSWORD=... cargo run -p napping --example github_auth_token
//! ```

use napping::{Opts, Session, SessionConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize)]
struct NewAuthorization {
    scopes: Vec<String>,
    note: String,
}

#[allow(dead_code)]
#[derive(Debug, Default, Deserialize)]
struct Authorization {
    id: u64,
    url: String,
    scopes: Vec<String>,
    token: String,
    app: HashMap<String, String>,
    note: String,
    note_url: Option<String>,
    updated_at: String,
    created_at: String,
}

#[derive(Debug, Default, Deserialize)]
struct GithubError {
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let username = std::env::var("GITHUB_USER")?;
    let password = std::env::var("GITHUB_PASSWORD")?;

    // Credentials on the session apply to every request; only safe over HTTPS.
    let defaults = Opts::new().basic_auth(username, password);
    let session = Session::new(SessionConfig::new().defaults(defaults).log(true))?;

    let payload = NewAuthorization {
        scopes: vec!["public_repo".to_string()],
        note: "testing napping".to_string(),
    };
    let mut authorization = Authorization::default();
    let mut error = GithubError::default();

    let response = session
        .post(
            "https://api.github.com/authorizations",
            &payload,
            &mut authorization,
            &mut error,
            Some(Opts::new().expected_status(201)),
        )
        .await;

    match response {
        Ok(response) => {
            println!("Status: {}", response.status());
            println!("{:#?}", authorization);
        }
        Err(err) => {
            println!("Request failed: {}", err.sanitized_message());
            println!("GitHub said: {}", error.message);
        }
    }

    Ok(())
}
