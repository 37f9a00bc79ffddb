use anyhow::Result;
use cast_mailer::{SendRequest, SenderConfig, SmtpSender};

// SMTP_HOST=smtp.example.eu SMTP_ACCOUNT=me@example.eu SMTP_PASSWORD=... \
//     cargo run --example send_once -- ada@askian.net gran@example.com
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let to = args.next().unwrap_or_else(|| "askian@askian.net".to_owned());
    let reply_to = args.next().unwrap_or_else(|| "gran@example.com".to_owned());

    let sender = SmtpSender::new(SenderConfig::from_env()?);
    let request = SendRequest::new(
        to,
        reply_to,
        "Gran",
        "Hello from the family album",
        "Found the photos from the seaside.\n.\nMore soon!",
    );

    match sender.send(&request).await {
        Ok(()) => println!("sent to {}", request.to()),
        Err(err) => {
            eprintln!("HTTP {}: {err}", err.http_status());
            return Err(err.into());
        }
    }
    Ok(())
}
