// src/main.rs

use jobx::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("jobx error: {err:?}");
        std::process::exit(1);
    }

    match run(args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("jobx error: {err:?}");
            std::process::exit(1);
        }
    }
}
