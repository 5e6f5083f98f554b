use anyhow::Result;
use std::process;

use crate::args::BaseArgs;

pub fn run(base: BaseArgs, key: &str, global: bool, local: bool) -> Result<()> {
    let cfg = if global {
        super::load_global()?
    } else if local {
        match super::local_path() {
            Some(p) => super::load_file(&p),
            None => super::Config::default(),
        }
    } else {
        super::load()?
    };

    let Some(value) = cfg.get_field(key) else {
        tracing::debug!(key, "config key not set");
        process::exit(1);
    };

    let shown = super::display_value(key, value);
    if base.json {
        println!("{}", serde_json::to_string(&shown)?);
    } else {
        println!("{shown}");
    }
    Ok(())
}
