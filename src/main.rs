use clap::{Args, Parser, Subcommand};
use qirust_studio::decode::{DefaultDecoder, ImageSource};
use qirust_studio::export;
use qirust_studio::payload::{ContentType, WifiSecurity};
use qirust_studio::settings::{Color, ErrorLevel, LogoSizeMode, Settings, Viewport};
use qirust_studio::symbol::QrSymbolSource;
use qirust_studio::trigger::{Trigger, TriggerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "qirust-studio")]
#[command(about = "Compose a styled QR code and save it as PNG")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    content: Option<Content>,

    #[command(flatten)]
    style: StyleArgs,

    /// Settings JSON to start from; other flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory (default: generated)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Output file name (default: qrcode-TIMESTAMP.png)
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Subcommand)]
enum Content {
    /// Encode a URL
    Url { url: Option<String> },
    /// Encode free text
    Text { text: Option<String> },
    /// Encode a mailto: link
    Email {
        address: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    /// Encode a tel: link
    Phone { number: Option<String> },
    /// Encode Wi-Fi credentials
    Wifi {
        ssid: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
        /// WPA, WEP or nopass
        #[arg(short, long)]
        security: Option<WifiSecurity>,
    },
}

#[derive(Args)]
struct StyleArgs {
    /// Foreground color (#rrggbb)
    #[arg(long)]
    fg: Option<Color>,

    /// Background color (#rrggbb)
    #[arg(long)]
    bg: Option<Color>,

    /// Output size in pixels (128-512, step 32)
    #[arg(long)]
    size: Option<u32>,

    /// Error correction level: L, M, Q or H
    #[arg(short, long)]
    level: Option<ErrorLevel>,

    /// Background image file
    #[arg(long)]
    background_image: Option<PathBuf>,

    /// Background image opacity in percent (10-100, step 5)
    #[arg(long)]
    opacity: Option<u8>,

    /// Logo image file
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Manual logo size in percent (10-30, step 2); auto-fit when omitted
    #[arg(long)]
    logo_size: Option<u32>,

    /// Render for a narrow viewport (caps the size at 280)
    #[arg(long)]
    narrow: bool,
}

fn apply_content(settings: &mut Settings, content: Content) {
    let spec = &mut settings.content;
    match content {
        Content::Url { url } => {
            spec.kind = ContentType::Url;
            spec.url = url.unwrap_or_default();
        }
        Content::Text { text } => {
            spec.kind = ContentType::Text;
            spec.text = text.unwrap_or_default();
        }
        Content::Email { address, subject, body } => {
            spec.kind = ContentType::Email;
            spec.email.address = address.unwrap_or_default();
            spec.email.subject = subject.unwrap_or_default();
            spec.email.body = body.unwrap_or_default();
        }
        Content::Phone { number } => {
            spec.kind = ContentType::Phone;
            spec.phone = number.unwrap_or_default();
        }
        Content::Wifi { ssid, password, security } => {
            spec.kind = ContentType::Wifi;
            spec.wifi.ssid = ssid.unwrap_or_default();
            spec.wifi.password = password.unwrap_or_default();
            if let Some(security) = security {
                spec.wifi.security = security;
            }
        }
    }
}

fn apply_style(settings: &mut Settings, args: StyleArgs) {
    if let Some(fg) = args.fg {
        settings.style.foreground = fg;
    }
    if let Some(bg) = args.bg {
        settings.style.background_color = bg;
    }
    if let Some(size) = args.size {
        settings.style.set_size(size);
    }
    if let Some(level) = args.level {
        settings.style.error_level = level;
    }
    if let Some(path) = args.background_image {
        settings.set_background_image(ImageSource::from_path(path));
    }
    if let Some(opacity) = args.opacity {
        settings.style.set_background_opacity(opacity);
    }
    if let Some(path) = args.logo {
        settings.set_logo(ImageSource::from_path(path));
    }
    if let Some(percentage) = args.logo_size {
        settings.logo.mode = LogoSizeMode::Manual;
        settings.logo.set_percentage(percentage);
    }
    if args.narrow {
        settings.viewport = Viewport::narrow();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qirust_studio=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::default(),
    };
    if let Some(content) = cli.content {
        apply_content(&mut settings, content);
    }
    apply_style(&mut settings, cli.style);

    let trigger = Trigger::spawn(
        settings,
        Arc::new(QrSymbolSource),
        Arc::new(DefaultDecoder),
        TriggerConfig::default(),
    );
    let frame = trigger.settled().await?;
    for warning in &frame.warnings {
        warn!("{warning}");
    }

    let path = export::save_png(&frame.result, cli.dir.as_deref(), cli.output.as_deref())?;
    println!("{}", path.display());
    Ok(())
}
