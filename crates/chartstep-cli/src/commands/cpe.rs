//! Cpe command - show what earlier steps left in the pipeline environment

use console::style;

use crate::commands::render::load_store;
use crate::config::{StepArgs, StepConfig};
use crate::error::Result;

pub fn run(args: &StepArgs, show_values: bool) -> Result<()> {
    let config = StepConfig::resolve(args)?;
    let store = load_store(&config)?;

    println!(
        "{} {} key(s) in {}",
        style("→").blue().bold(),
        store.len(),
        style(config.cpe_root().display()).cyan()
    );

    for (key, value) in store.iter() {
        if show_values {
            println!("{} = {}", style(key).yellow(), value);
        } else {
            println!("{}", key);
        }
    }

    Ok(())
}
