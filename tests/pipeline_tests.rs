//! Integration tests for the settings -> symbol -> composite -> PNG pipeline

use image::{ImageFormat, Rgba, RgbaImage};
use qirust_studio::decode::{DefaultDecoder, ImageSource};
use qirust_studio::payload::{ContentType, WifiSecurity};
use qirust_studio::settings::{BackgroundMode, Color, ErrorLevel, LogoSizeMode};
use qirust_studio::symbol::QrSymbolSource;
use qirust_studio::{export, Settings, Trigger, TriggerConfig};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

fn png_bytes(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, pixel);
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn spawn(settings: Settings) -> Trigger {
    Trigger::spawn(
        settings,
        Arc::new(QrSymbolSource),
        Arc::new(DefaultDecoder),
        TriggerConfig {
            debounce: Duration::from_millis(10),
        },
    )
}

#[tokio::test]
async fn test_wifi_card_with_background_and_logo() {
    let dir = tempfile::tempdir().unwrap();
    let background_path = dir.path().join("bg.png");
    std::fs::write(&background_path, png_bytes(640, 360, Rgba([250, 200, 0, 255]))).unwrap();

    let mut settings = Settings::default();
    settings.content.kind = ContentType::Wifi;
    settings.content.wifi.ssid = "Net".to_string();
    settings.content.wifi.password = "pass123".to_string();
    settings.content.wifi.security = WifiSecurity::Wpa;
    settings.style.error_level = ErrorLevel::H;
    settings.style.set_size(320);
    settings.set_background_image(ImageSource::from_path(&background_path));
    settings.set_logo(ImageSource::from_bytes(png_bytes(40, 40, Rgba([0, 0, 255, 255]))));
    settings.logo.mode = LogoSizeMode::Manual;
    settings.logo.set_percentage(20);

    let trigger = spawn(settings);
    let frame = trigger.settled().await.unwrap();
    assert_eq!(frame.payload, "WIFI:T:WPA;S:Net;P:pass123;;");
    assert!(frame.warnings.is_empty(), "{:?}", frame.warnings);

    let img = frame.result.image();
    assert_eq!(img.dimensions(), (320, 320));
    assert_eq!(img.get_pixel(0, 0), &Rgba([250, 200, 0, 255]));
    assert_eq!(img.get_pixel(160, 160), &Rgba([0, 0, 255, 255]));

    let path = export::save_png(&frame.result, Some(dir.path()), Some("wifi")).unwrap();
    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (320, 320));
}

#[tokio::test]
async fn test_settings_file_drives_composite() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("settings.json");
    std::fs::write(
        &config,
        r##"{
            "content": { "kind": "phone", "phone": "555-1234" },
            "style": { "background_color": "#102030", "size": 192 },
            "viewport": { "width": 480 }
        }"##,
    )
    .unwrap();

    let settings = Settings::from_json_file(&config).unwrap();
    let trigger = spawn(settings);
    let frame = trigger.settled().await.unwrap();
    assert_eq!(frame.payload, "tel:555-1234");
    assert_eq!(frame.result.size(), 192);
    assert_eq!(frame.result.image().get_pixel(0, 0), &Rgba([0x10, 0x20, 0x30, 255]));
}

#[tokio::test]
async fn test_edits_replace_the_frame() {
    let trigger = spawn(Settings::default());
    let first = trigger.settled().await.unwrap();

    trigger.update(|s| {
        s.style.background_color = Color::rgb(0, 0, 0);
        s.style.foreground = Color::WHITE;
        s.style.background_mode = BackgroundMode::Solid;
    });
    let second = trigger.settled().await.unwrap();

    assert!(second.token > first.token);
    assert_eq!(second.result.image().get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    assert_eq!(first.result.image().get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    assert!(trigger.export_png().is_ok());
}
