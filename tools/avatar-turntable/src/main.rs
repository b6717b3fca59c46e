//! To run the program, please execute the following commands in your terminal:
//!
//! 1.  **Set the environment variable for your API key:**
//!     ```bash
//!     export GEMINI_API_KEY="YOUR_GEMINI_API_KEY"
//!     ```
//!     Veo needs a key from a paid Google Cloud project.
//! 2.  **Run the tool with one to four reference images:**
//!     ```bash
//!     cargo r -p avatar-turntable -- --full body.png --front front.png --back back.png
//!     ```
//!     The turntable video is saved to `turntable.mp4`. Set `RUST_LOG=debug` to see
//!     every poll of the operation.

use avatar_turntable::cli::Args;
use avatar_turntable::narration::Narration;
use avatar_turntable::session::{Session, NO_IMAGES_MESSAGE};
use avatar_turntable::veo::VeoClient;
use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use color_eyre::Section;

const BILLING_NOTE: &str =
    "Veo requires a paid API key, see https://ai.google.dev/gemini-api/docs/billing";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();

    // --- 1. Setup ---
    let args = Args::parse();
    let settings = args.settings();
    let api_key = args.api_key().map(str::to_string);
    let mut session = Session::new(api_key.is_some());

    // --- 2. Load References ---
    for (view, path) in args.images() {
        eprintln!("Loading {} from {}...", view.label(), path.display());
        if let Err(message) = session.upload(view, &path).await {
            return Err(eyre!(message));
        }
    }

    // --- 3. Generate Video ---
    let client = VeoClient::new(api_key.unwrap_or_default(), args.api_base.as_str());
    if !session.can_generate() {
        return Err(eyre!(NO_IMAGES_MESSAGE));
    }
    eprintln!(
        "--- Generating 3D turntable from {} reference image(s) ---",
        session.image_count()
    );

    let generation = session.generate(&client, &settings, |elapsed| {
        log::debug!("Operation still running after {}s", elapsed.as_secs())
    });
    let narration = Narration::default().run(|elapsed, message| {
        eprintln!("[{:>4}s] {}", elapsed.as_secs(), message)
    });
    let outcome = tokio::select! {
        outcome = generation => outcome,
        never = narration => match never {},
    };

    let video_uri = match outcome {
        Ok(uri) => uri,
        Err(message) if !session.api_key_set() => return Err(eyre!(message)).note(BILLING_NOTE),
        Err(message) => return Err(eyre!(message)),
    };
    eprintln!("--- Status: {} ---", session.status());
    println!("{}", video_uri);

    // --- 4. Download Video ---
    if args.no_download {
        return Ok(());
    }
    client
        .download(&video_uri, &args.output)
        .await
        .wrap_err("Failed to download the generated video")?;
    eprintln!("Saved turntable video to {}", args.output.display());

    Ok(())
}
