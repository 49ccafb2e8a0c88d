use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use sealbox_core::Envelope;
use sealbox_service::{EnvelopeVersion, SealboxService, ServiceConfig};

#[derive(Parser)]
#[command(name = "sealbox")]
#[command(about = "Password-protected secret envelopes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a message into an envelope
    Encrypt {
        /// Message text; read from stdin when omitted
        message: Option<String>,

        /// Expire the secret after this many seconds
        #[arg(long)]
        expires_in: Option<i64>,

        /// Seal with the legacy CBC+HMAC profile instead of the default
        #[arg(long)]
        legacy: bool,
    },

    /// Decrypt an envelope and print the message
    Decrypt {
        /// Envelope text; read from stdin when omitted
        envelope: Option<String>,
    },

    /// Show envelope structure without decrypting
    Inspect {
        envelope: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Encrypt {
            message,
            expires_in,
            legacy,
        } => encrypt_command(message, expires_in, legacy).await,
        Commands::Decrypt { envelope } => decrypt_command(envelope).await,
        Commands::Inspect { envelope } => inspect_command(&envelope),
    }
}

async fn encrypt_command(
    message: Option<String>,
    expires_in: Option<i64>,
    legacy: bool,
) -> Result<()> {
    let message = read_arg_or_stdin(message)?;
    let expiry = expires_in
        .map(|secs| {
            if secs <= 0 {
                return Err(anyhow!("--expires-in must be positive"));
            }
            Ok(chrono::Utc::now() + chrono::Duration::seconds(secs))
        })
        .transpose()?;

    let version = if legacy {
        EnvelopeVersion::V1CbcHmac
    } else {
        EnvelopeVersion::CURRENT
    };
    let service = SealboxService::new(ServiceConfig {
        version,
        ..ServiceConfig::default()
    });

    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        return Err(anyhow!("passwords do not match"));
    }

    let envelope = service.encrypt(&message, &password, expiry).await?;
    service.shutdown();
    println!("{envelope}");
    Ok(())
}

async fn decrypt_command(envelope: Option<String>) -> Result<()> {
    let envelope = read_arg_or_stdin(envelope)?;
    let service = SealboxService::with_defaults();
    let password = rpassword::prompt_password("Password: ")?;

    let payload = service.decrypt(envelope.trim(), &password).await?;
    service.shutdown();
    println!("{}", payload.message());
    Ok(())
}

fn inspect_command(text: &str) -> Result<()> {
    let envelope = Envelope::decode(text)?;
    println!("version:    {:?}", envelope.version);
    println!("salt:       {} bytes", envelope.salt.len());
    println!("nonce:      {} bytes", envelope.nonce.len());
    println!("ciphertext: {} bytes", envelope.ciphertext.len());
    println!("tag:        {} bytes", envelope.tag.len());
    Ok(())
}

fn read_arg_or_stdin(arg: Option<String>) -> Result<String> {
    match arg {
        Some(value) => Ok(value),
        None => {
            let input = std::io::read_to_string(std::io::stdin())?;
            Ok(input.trim_end_matches('\n').to_string())
        }
    }
}
