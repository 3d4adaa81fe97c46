mod cli;
mod output;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use rusty_h5::{LoadOptions, Loader};

use cli::CliArgs;

fn main() -> Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    let options = if args.strict_shape {
        LoadOptions::strict()
    } else {
        LoadOptions::default()
    };
    let loader = Loader::new().with_options(options);

    let names = if args.datasets.is_empty() {
        loader
            .list(&args.file)
            .with_context(|| format!("listing datasets in {}", args.file.display()))?
    } else {
        args.datasets.clone()
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.list {
        for name in &names {
            let info = loader
                .inspect(&args.file, name)
                .with_context(|| format!("inspecting dataset '{name}'"))?;
            writeln!(out, "{info}")?;
        }
        return Ok(());
    }

    let mut loaded = Vec::with_capacity(names.len());
    for name in &names {
        let mut dataset = output::load(&loader, &args.file, name, args.load_as)
            .with_context(|| format!("loading dataset '{name}' from {}", args.file.display()))?;
        if args.trim {
            output::trim_padding(&mut dataset);
        }
        loaded.push(dataset);
    }

    output::write_all(&mut out, &loaded, args.format)?;
    out.flush()?;
    Ok(())
}
