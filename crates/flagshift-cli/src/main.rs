use flagshift_cli::{cli, commands, exit_code, init_logging, LogFormat, EXIT_FAILURE};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let matches = cli::command().get_matches();

    let format = matches
        .get_one::<String>("log-format")
        .and_then(|f| LogFormat::parse(f))
        .unwrap_or(LogFormat::Text);
    if let Err(e) = init_logging(matches.get_count("verbose"), format) {
        eprintln!("warning: {e:#}");
    }

    let cancel = CancellationToken::new();
    commands::cancel_on_ctrl_c(cancel.clone());

    let code = match commands::run(&matches, cancel).await {
        Ok(status) => exit_code(status),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "flagshift failed");
            eprintln!("error: {e:#}");
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
