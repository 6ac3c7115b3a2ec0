// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::Result;
use build_hermetic_stub::Options;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[clap(
    max_term_width = 80,
    about = "Creates an assembly file with a single stub function to be \
             later patched"
)]
struct Args {
    /// The name of the stub function
    #[clap(long)]
    name: String,
    /// A header containing patch case ID constants
    #[clap(long)]
    header: String,
    /// A JSON file of hermetic patch alternative metadata
    #[clap(long, value_name = "FILE")]
    metadata_file: PathBuf,
    /// Symbol names to alias to the function (may be repeated)
    #[clap(long, value_name = "SYMBOL")]
    aliases: Vec<String>,
    /// A dependencies file to write to
    #[clap(long, value_name = "FILE")]
    depfile: PathBuf,
    /// The resulting stub file
    #[clap(long, value_name = "FILE")]
    outfile: PathBuf,
    /// Copyright year for the generated file (defaults to the current year)
    #[clap(long)]
    year: Option<i32>,
}

impl From<Args> for Options {
    fn from(args: Args) -> Self {
        Options {
            name: args.name,
            header: args.header,
            metadata_file: args.metadata_file,
            aliases: args.aliases,
            depfile: args.depfile,
            outfile: args.outfile,
            year: args.year,
        }
    }
}

fn main() -> Result<()> {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "warn");
    env_logger::init_from_env(env);

    let args = Args::parse();
    log::debug!("{args:?}");
    build_hermetic_stub::generate(&args.into())
}
