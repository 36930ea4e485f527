use anyhow::{Error, Result};
use log::{info, warn};
use rand::prelude::*;
use ring::{digest, hmac};
use std::{env, net::SocketAddr};
use tokio::fs;
use warp::Filter;

use ypg_quiz::{
    controllers::QuizController,
    filters,
    models::Config,
    routes,
    store::{QuizCatalog, SubmissionLedger},
};

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let bind_addr = env::var("BIND").unwrap_or_else(|_err| "127.0.0.1:3030".into());
    let bind_addr: SocketAddr = bind_addr.parse()?;

    let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_err| "http://localhost:3000".into());

    let secret_key = env::var("SECRET_KEY")
        .map_err(|err| Error::new(err))
        .and_then(|env| {
            let mut secret_key = [0u8; digest::SHA256_OUTPUT_LEN];
            hex::decode_to_slice(env, &mut secret_key)?;
            Ok(secret_key)
        })
        .or_else(|_err| -> Result<_> {
            let mut secret_key = [0u8; digest::SHA256_OUTPUT_LEN];
            rand::rngs::OsRng.fill(&mut secret_key);

            warn!("No secret key was specified, generated a new secret key. Receipts will not survive a restart.");
            warn!("Rerun with SECRET_KEY={}", hex::encode(secret_key));

            Ok(secret_key)
        })?;

    let secret_key = hmac::Key::new(hmac::HMAC_SHA256, secret_key.as_ref());

    let admin_token = env::var("ADMIN_TOKEN").ok().filter(|token| !token.is_empty());
    if admin_token.is_none() {
        warn!("ADMIN_TOKEN is not set, admin endpoints are disabled");
    }

    let config_path = env::var("QUIZ_CONFIG").unwrap_or_else(|_err| "quiz.toml".into());
    let config = fs::read_to_string(&config_path).await?;
    let config: Config = toml::de::from_str(&config)?;
    let catalog = QuizCatalog::new(config.quiz.iter())?;
    info!("loaded {} quizzes from {}", config.quiz.len(), config_path);

    let submissions_path = env::var("SUBMISSIONS").unwrap_or_else(|_err| "submissions.csv".into());
    let ledger = SubmissionLedger::open(submissions_path)?;

    let quiz_controller = QuizController::new(secret_key, catalog, ledger);

    let cors = warp::cors()
        .allow_origin(cors_origin.as_str())
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_headers(vec!["Authorization", "Content-Type", "X-Admin-Token"]);

    let server = routes::routes(quiz_controller, admin_token)
        .with(cors)
        .recover(filters::handle_rejection)
        .with(warp::log("ypg_quiz"));

    info!("listening on {}", bind_addr);
    warp::serve(server).run(bind_addr).await;

    Ok(())
}
