// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use fortynine::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    std::process::exit(fortynine::cli::run(cli).await);
}
