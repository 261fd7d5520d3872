use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::{utils, OutputFormat};
use crate::config::config;

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[arg(long, help = "Subject uid the token is issued for")]
    pub uid: String,

    #[arg(long, help = "Email carried in the token claims")]
    pub email: String,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true, help = "Signing secret (defaults to the server configuration)")]
    pub secret: Option<String>,

    #[arg(long, help = "Lifetime in hours (defaults to the server configuration)")]
    pub expiry_hours: Option<u64>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config().security;
    let secret = args.secret.unwrap_or_else(|| security.jwt_secret.clone());
    let expiry_hours = args.expiry_hours.unwrap_or(security.jwt_expiry_hours);

    let claims = Claims::new(&args.uid, &args.email, expiry_hours);
    let token = generate_jwt(&claims, &secret)?;

    match output_format {
        OutputFormat::Json => utils::output_success(
            &output_format,
            "Token generated",
            Some(json!({ "token": token, "sub": claims.sub, "exp": claims.exp })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
