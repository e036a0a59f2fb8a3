use clap::Parser;
use sentry_export::utils::logger;
use sentry_export::{DanfeCli, GenerateDanfe};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = DanfeCli::parse();

    logger::init_cli_logger(args.verbose);
    tracing::info!("🚀 Starting DANFE generation");

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    let use_case = GenerateDanfe::from_config(&config)?;
    match use_case.execute_from_file(&args.xml) {
        Ok(outcome) => {
            tracing::info!(
                "✅ DANFE for {} saved to {} ({} pages)",
                outcome.access_key,
                outcome.file_path.display(),
                outcome.pages
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    }

    Ok(())
}
