use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mecopilot::advisor::MechanicAdvisor;
use mecopilot::config::Config;
use mecopilot::models::{MediaInput, MediaKind, VehicleInfo};
use mecopilot::proxy::{self, ProxyState};
use mecopilot::session::Session;
use mecopilot::vin::NhtsaVinClient;
use mecopilot::Error;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "mecopilot")]
#[command(
    about = "AI mechanic copilot: structured repair reports from symptoms, photos and engine sounds"
)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Diagnose a vehicle problem and print the report as JSON.
    Diagnose {
        /// Free-form symptom description.
        #[arg(value_name = "TEXT", default_value = "")]
        text: String,

        /// Photo of the affected part.
        #[arg(long, value_name = "PATH", conflicts_with = "audio")]
        image: Option<PathBuf>,

        /// Engine sound recording.
        #[arg(long, value_name = "PATH")]
        audio: Option<PathBuf>,

        /// VIN used to describe the vehicle in the request.
        #[arg(long)]
        vin: Option<String>,

        /// Gemini API key. Overrides GEMINI_API_KEY.
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Run the same-origin proxy for web builds.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn load_media(path: &Path, expected: MediaKind) -> mecopilot::Result<MediaInput> {
    let media = MediaInput::from_path(path)?;
    if media.kind() != expected {
        return Err(Error::UnsupportedMedia(format!(
            "{} is {}, expected {:?}",
            path.display(),
            media.mime_type,
            expected
        )));
    }
    Ok(media)
}

async fn diagnose(
    config: Config,
    text: String,
    media: Option<MediaInput>,
    vin: Option<String>,
    api_key: Option<String>,
) -> mecopilot::Result<String> {
    let advisor = MechanicAdvisor::from_config(&config);
    let credential = api_key.or_else(|| config.gemini_api_key.clone());
    let session = Session::new(advisor, credential).with_vin_lookup(Box::new(
        NhtsaVinClient::new(
            reqwest::Client::new(),
            &config.nhtsa_base_url,
            config.request_timeout,
        ),
    ));

    let vehicle: Option<VehicleInfo> = match vin {
        Some(vin) => match session.decode_vin(&vin).await {
            Ok(Some(vehicle)) => {
                info!("Decoded VIN {} as {}", vin, vehicle.describe());
                Some(vehicle)
            }
            Ok(None) => {
                warn!("VIN {} not found, continuing without vehicle details", vin);
                None
            }
            Err(e) => {
                warn!("VIN lookup failed, continuing without vehicle details: {}", e);
                None
            }
        },
        None => None,
    };

    let report = session.submit(&text, media, vehicle.as_ref()).await?;
    serde_json::to_string_pretty(&report)
        .map_err(|e| Error::MalformedResponse(format!("failed to render report: {}", e)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mecopilot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match args.command {
        Command::Diagnose {
            text,
            image,
            audio,
            vin,
            api_key,
        } => {
            let media = match (image, audio) {
                (Some(path), _) => Some(load_media(&path, MediaKind::Image)),
                (None, Some(path)) => Some(load_media(&path, MediaKind::Audio)),
                (None, None) => None,
            }
            .transpose()
            .context("Failed to load attachment")?;

            info!("Starting diagnosis on {} platform", config.platform);
            match diagnose(config, text, media, vin, api_key).await {
                Ok(report) => {
                    println!("{}", report);
                    Ok(())
                }
                Err(e) => {
                    error!("Diagnosis failed: {}", e);
                    eprintln!("{}", e.user_message());
                    std::process::exit(1);
                }
            }
        }
        Command::Serve { port } => {
            let port = port.unwrap_or(config.port);
            if let Err(e) = proxy::serve(ProxyState::from_config(&config), port).await {
                error!("Proxy server failed: {}", e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diagnose_with_audio() {
        let args = CliArgs::try_parse_from([
            "mecopilot",
            "diagnose",
            "knocking when cold",
            "--audio",
            "engine.webm",
        ])
        .unwrap();

        match args.command {
            Command::Diagnose { text, audio, image, .. } => {
                assert_eq!(text, "knocking when cold");
                assert_eq!(audio, Some(PathBuf::from("engine.webm")));
                assert!(image.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_image_and_audio_conflict() {
        let err = CliArgs::try_parse_from([
            "mecopilot",
            "diagnose",
            "--image",
            "a.jpg",
            "--audio",
            "b.webm",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_parse_serve_port() {
        let args = CliArgs::try_parse_from(["mecopilot", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(args.command, Command::Serve { port: Some(8080) }));
    }

    #[test]
    fn test_load_media_rejects_wrong_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).unwrap();

        assert!(load_media(&path, MediaKind::Image).is_ok());
        assert!(matches!(
            load_media(&path, MediaKind::Audio),
            Err(Error::UnsupportedMedia(_))
        ));
    }
}
