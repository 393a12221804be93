use anyhow::Context;
use clap::Parser;
use git_rstatus::Cli;
use git_rstatus::app::EXIT_FAILURE;

#[tokio::main]
async fn main() {
  let code = match try_main().await {
    Ok(code) => code,
    Err(e) => {
      eprintln!("Error: {:#}", e);
      EXIT_FAILURE
    }
  };

  std::process::exit(code);
}

async fn try_main() -> anyhow::Result<i32> {
  let cli = Cli::parse();
  let code = git_rstatus::run(cli).await.context("git-rstatus stopped")?;
  Ok(code)
}
